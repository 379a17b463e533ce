//! Conversation synchronization engine
//!
//! `ChatSession` owns the transport gateway handles and every piece of
//! per-conversation state, and applies one event at a time: there are no
//! concurrent writers. History fetches and outbound posts run as spawned
//! tasks that report back through the session's event channel, so push
//! events keep flowing while a fetch is in flight.

pub mod presence;
pub mod receipts;
pub mod scope;
pub mod state;
pub mod viewport;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;

use crate::api;
use crate::api::client::RelayClient;
use crate::error::TransportError;
use crate::models::{ContentType, Message, MessageStatus, PresenceStatus};
use crate::push::{PushEventKind, PushHandle, PushUpdate};

use presence::PresenceTracker;
use receipts::ReadReceiptCoordinator;
use scope::ActiveScope;
use state::SyncState;
use viewport::ViewportAnchor;

pub use viewport::{AnchorState, ScrollCommand};

/// Keystrokes within this window share one typing notification.
const TYPING_DEBOUNCE: Duration = Duration::from_secs(2);

/// Everything the session reacts to, in dispatch order.
pub enum SessionEvent {
    /// Push-channel traffic (events and connection transitions).
    Push(PushUpdate),
    /// A history fetch resolved. `epoch` is the scope epoch it was issued
    /// under; stale results are discarded.
    HistoryLoaded {
        conversation_id: String,
        epoch: u64,
        result: Result<Vec<Message>, TransportError>,
    },
    /// The REST post for an optimistic send resolved.
    SendResolved {
        conversation_id: String,
        client_id: String,
        result: Result<(), TransportError>,
    },
}

/// What changed during one dispatch, for the rendering layer.
#[derive(Debug, Default)]
pub struct SessionUpdate {
    pub timeline_changed: bool,
    pub presence_changed: bool,
    pub connection_changed: bool,
    pub scroll: Option<ScrollCommand>,
}

pub struct ChatSession {
    client: Arc<RelayClient>,
    push: PushHandle,
    local_user: String,
    event_tx: mpsc::UnboundedSender<SessionEvent>,

    scope: ActiveScope,
    sync: SyncState,
    receipts: ReadReceiptCoordinator,
    presence: PresenceTracker,
    anchor: ViewportAnchor,

    connected: bool,
    last_error: Option<String>,
    viewport_overflows: bool,
    last_typing_sent: Option<Instant>,
}

impl ChatSession {
    pub fn new(
        client: Arc<RelayClient>,
        push: PushHandle,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let local_user = client.user_id().to_string();
        Self {
            client,
            push,
            local_user,
            event_tx,
            scope: ActiveScope::new(),
            sync: SyncState::new(),
            receipts: ReadReceiptCoordinator::new(),
            presence: PresenceTracker::new(),
            anchor: ViewportAnchor::new(),
            connected: false,
            last_error: None,
            viewport_overflows: false,
            last_typing_sent: None,
        }
    }

    pub fn local_user(&self) -> &str {
        &self.local_user
    }

    pub fn timeline(&self) -> &SyncState {
        &self.sync
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    pub fn anchor(&self) -> &ViewportAnchor {
        &self.anchor
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn active_conversation(&self) -> Option<&str> {
        self.scope.active()
    }

    /// Most recent recoverable error, cleared on read.
    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Switch the active conversation: leave the old membership, drop all
    /// derived state, join the new one, and kick off its history fetch.
    /// Returns the fetch epoch (used by tests to feed synthetic results).
    pub fn set_active(&mut self, conversation_id: &str) -> u64 {
        if let Some(old) = self.scope.active() {
            self.push.unsubscribe(old);
        }

        self.sync.clear();
        self.presence.clear();
        self.receipts.clear();
        self.anchor.clear();
        self.last_typing_sent = None;

        let epoch = self.scope.set_active(conversation_id);
        self.push.subscribe(conversation_id);

        // Announce ourselves; failure is logged, never surfaced.
        let client = Arc::clone(&self.client);
        let conv = conversation_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = api::post_presence_data(&client, &conv, PresenceStatus::Online).await {
                tracing::warn!("Presence post failed: {:#}", e);
            }
        });

        let client = Arc::clone(&self.client);
        let conv = conversation_id.to_string();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = api::fetch_messages_data(&client, &conv).await;
            let _ = tx.send(SessionEvent::HistoryLoaded {
                conversation_id: conv,
                epoch,
                result,
            });
        });

        epoch
    }

    /// Apply one event. Every mutation of sync state goes through here.
    pub fn handle_event(&mut self, event: SessionEvent) -> SessionUpdate {
        let mut update = SessionUpdate::default();

        match event {
            SessionEvent::Push(PushUpdate::Connected) => {
                self.connected = true;
                update.connection_changed = true;
            }
            SessionEvent::Push(PushUpdate::Disconnected) => {
                self.connected = false;
                update.connection_changed = true;
            }
            SessionEvent::Push(PushUpdate::Event(event)) => {
                if !self.scope.admits(&event.conversation_id) {
                    // Expected churn around scope switches, not an error.
                    tracing::debug!(
                        "Dropping event for non-active conversation {}",
                        event.conversation_id
                    );
                    return update;
                }
                self.apply_push_event(event.kind, &mut update);
            }
            SessionEvent::HistoryLoaded {
                conversation_id,
                epoch,
                result,
            } => {
                if !self.scope.is_current(&conversation_id, epoch) {
                    tracing::debug!("Discarding stale history fetch for {}", conversation_id);
                    return update;
                }
                match result {
                    Ok(messages) => {
                        self.sync.apply_history(messages);
                        update.timeline_changed = true;
                        update.scroll = self.anchor.on_list_changed(
                            &self.sync,
                            &self.local_user,
                            self.viewport_overflows,
                        );
                        self.maybe_acknowledge();
                    }
                    Err(e) => {
                        // Recoverable: the list stays as-is (possibly already
                        // holding buffered push events) and keeps filling.
                        tracing::warn!("History fetch failed: {:#}", e);
                        self.last_error = Some(format!("History fetch failed: {}", e));
                        update.connection_changed = true;
                    }
                }
            }
            SessionEvent::SendResolved {
                conversation_id,
                client_id,
                result,
            } => {
                if !self.scope.admits(&conversation_id) {
                    return update;
                }
                match result {
                    Ok(()) => {
                        self.sync.mark_sent(&client_id);
                        update.timeline_changed = true;
                    }
                    Err(e) => {
                        // No rollback: the optimistic entry stays pending.
                        tracing::warn!("Send failed, message stays pending: {:#}", e);
                        self.last_error = Some(format!("Send failed: {}", e));
                    }
                }
            }
        }

        update
    }

    fn apply_push_event(&mut self, kind: PushEventKind, update: &mut SessionUpdate) {
        match kind {
            PushEventKind::MessageReceived { message, client_id } => {
                let changed =
                    self.sync
                        .apply_push_message(message, client_id.as_deref(), &self.local_user);
                if changed {
                    update.timeline_changed = true;
                    update.scroll = self.anchor.on_list_changed(
                        &self.sync,
                        &self.local_user,
                        self.viewport_overflows,
                    );
                    self.maybe_acknowledge();
                }
            }
            PushEventKind::PresenceUpdated { sender_id, status } => {
                if sender_id != self.local_user {
                    self.presence.apply(&sender_id, status);
                    update.presence_changed = true;
                }
            }
            PushEventKind::ChatRead {
                sender_id,
                last_read_message_id,
            } => {
                if sender_id != self.local_user {
                    self.receipts.apply_remote(&mut self.sync, &last_read_message_id);
                    update.timeline_changed = true;
                }
            }
        }
    }

    /// Compose and send a message: optimistic entry now, REST post and push
    /// action in the background, reconciliation via the echoed client id.
    pub fn send_message(&mut self, content: &str, content_type: ContentType) -> SessionUpdate {
        let mut update = SessionUpdate::default();
        let Some(conversation_id) = self.scope.active().map(String::from) else {
            return update;
        };

        let client_id = uuid::Uuid::new_v4().to_string();
        let message = Message {
            id: client_id.clone(),
            conversation_id: conversation_id.clone(),
            sender_id: self.local_user.clone(),
            content: content.to_string(),
            content_type,
            timestamp: Utc::now(),
            status: MessageStatus::Pending,
        };

        self.sync.append_local(message);
        update.timeline_changed = true;
        update.scroll =
            self.anchor
                .on_list_changed(&self.sync, &self.local_user, self.viewport_overflows);

        self.push
            .send_message(&conversation_id, content, content_type, &client_id);

        let client = Arc::clone(&self.client);
        let tx = self.event_tx.clone();
        let content = content.to_string();
        tokio::spawn(async move {
            let result =
                api::post_message_data(&client, &conversation_id, &content, content_type, &client_id)
                    .await;
            let _ = tx.send(SessionEvent::SendResolved {
                conversation_id,
                client_id,
                result,
            });
        });

        update
    }

    /// The user is typing in the compose box. Debounced to one push frame
    /// per window.
    pub fn typing(&mut self) {
        let Some(conversation_id) = self.scope.active() else {
            return;
        };
        let now = Instant::now();
        let due = self
            .last_typing_sent
            .map(|t| now.duration_since(t) >= TYPING_DEBOUNCE)
            .unwrap_or(true);
        if due {
            self.push.typing(conversation_id);
            self.last_typing_sent = Some(now);
        }
    }

    /// Viewport geometry report from the rendering layer. Drives the
    /// `UserScrolledAway <-> AtBottom` edge and the receipt visibility
    /// condition; never re-anchors the view by itself.
    pub fn viewport_changed(&mut self, overflows: bool, at_bottom: bool) {
        self.viewport_overflows = overflows;
        self.anchor.on_scroll(at_bottom);
        self.maybe_acknowledge();
    }

    /// Periodic housekeeping from the UI tick loop.
    pub fn tick(&mut self) {
        self.presence.expire_typing(Instant::now());
    }

    /// Emit an outbound read receipt when the tail just became fully
    /// visible, and mirror it locally via the prefix rule.
    fn maybe_acknowledge(&mut self) {
        let Some(conversation_id) = self.scope.active().map(String::from) else {
            return;
        };
        let Some(tail_id) =
            self.receipts
                .outbound(&self.sync, &self.local_user, self.anchor.bottom_visible())
        else {
            return;
        };

        self.sync.mark_read_through(&tail_id);

        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            if let Err(e) = api::post_read_receipt_data(&client, &conversation_id, &tail_id).await {
                tracing::warn!("Read receipt post failed: {:#}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::{self, PushCommand, PushEvent};
    use chrono::DateTime;

    fn test_session() -> (ChatSession, mpsc::UnboundedReceiver<SessionEvent>) {
        let (session, rx, _cmds) = test_session_with_commands();
        (session, rx)
    }

    fn test_session_with_commands() -> (
        ChatSession,
        mpsc::UnboundedReceiver<SessionEvent>,
        mpsc::UnboundedReceiver<PushCommand>,
    ) {
        // Unroutable server: spawned posts fail fast and are logged only.
        let client = Arc::new(RelayClient::with_identity(
            "http://127.0.0.1:9".to_string(),
            "user_a".to_string(),
        ));
        let (push_handle, cmd_rx) = push::detached_handle();
        let (tx, rx) = mpsc::unbounded_channel();
        (ChatSession::new(client, push_handle, tx), rx, cmd_rx)
    }

    fn remote_message(conversation: &str, id: &str, ts: i64) -> SessionEvent {
        SessionEvent::Push(PushUpdate::Event(PushEvent {
            conversation_id: conversation.to_string(),
            kind: PushEventKind::MessageReceived {
                message: Message {
                    id: id.to_string(),
                    conversation_id: conversation.to_string(),
                    sender_id: "user_b".to_string(),
                    content: "hello".to_string(),
                    content_type: ContentType::Text,
                    timestamp: DateTime::from_timestamp(ts, 0).unwrap(),
                    status: MessageStatus::Received,
                },
                client_id: None,
            },
        }))
    }

    fn history(msgs: Vec<(&str, i64)>) -> Vec<Message> {
        msgs.into_iter()
            .map(|(id, ts)| Message {
                id: id.to_string(),
                conversation_id: "a".to_string(),
                sender_id: "user_b".to_string(),
                content: String::new(),
                content_type: ContentType::Text,
                timestamp: DateTime::from_timestamp(ts, 0).unwrap(),
                status: MessageStatus::Received,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_scope_isolation() {
        let (mut session, _rx) = test_session();
        session.set_active("a");

        let update = session.handle_event(remote_message("b", "m1", 10));
        assert!(!update.timeline_changed);
        assert!(session.timeline().is_empty());
    }

    #[tokio::test]
    async fn test_event_admitted_for_active_conversation() {
        let (mut session, _rx) = test_session();
        session.set_active("a");

        let update = session.handle_event(remote_message("a", "m1", 10));
        assert!(update.timeline_changed);
        assert_eq!(session.timeline().messages().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_history_after_switch_is_discarded() {
        let (mut session, _rx) = test_session();
        let epoch_a = session.set_active("a");
        let epoch_b = session.set_active("b");

        // A's fetch resolves after the switch: must not touch B's state.
        let update = session.handle_event(SessionEvent::HistoryLoaded {
            conversation_id: "a".to_string(),
            epoch: epoch_a,
            result: Ok(history(vec![("a1", 1), ("a2", 2)])),
        });
        assert!(!update.timeline_changed);
        assert!(session.timeline().is_empty());

        let update = session.handle_event(SessionEvent::HistoryLoaded {
            conversation_id: "b".to_string(),
            epoch: epoch_b,
            result: Ok(history(vec![("b1", 1)])),
        });
        assert!(update.timeline_changed);
        assert_eq!(session.timeline().messages().len(), 1);
    }

    #[tokio::test]
    async fn test_push_buffered_across_pending_fetch() {
        let (mut session, _rx) = test_session();
        let epoch = session.set_active("a");

        // Push lands while the fetch is still pending.
        session.handle_event(remote_message("a", "x", 15));

        session.handle_event(SessionEvent::HistoryLoaded {
            conversation_id: "a".to_string(),
            epoch,
            result: Ok(history(vec![("a1", 10), ("a2", 20)])),
        });

        let ids: Vec<&str> = session
            .timeline()
            .messages()
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a1", "x", "a2"]);
    }

    #[tokio::test]
    async fn test_history_failure_is_recoverable() {
        let (mut session, _rx) = test_session();
        let epoch = session.set_active("a");

        session.handle_event(SessionEvent::HistoryLoaded {
            conversation_id: "a".to_string(),
            epoch,
            result: Err(TransportError::Status {
                status: 500,
                url: "http://127.0.0.1:9/chats/a/messages".to_string(),
                body: String::new(),
            }),
        });
        assert!(session.take_error().is_some());

        // Later push events still populate the list.
        let update = session.handle_event(remote_message("a", "m1", 10));
        assert!(update.timeline_changed);
        assert_eq!(session.timeline().messages().len(), 1);
    }

    #[tokio::test]
    async fn test_optimistic_send_reconciles_with_echo() {
        let (mut session, mut rx) = test_session();
        let epoch = session.set_active("a");
        session.handle_event(SessionEvent::HistoryLoaded {
            conversation_id: "a".to_string(),
            epoch,
            result: Ok(vec![]),
        });

        let update = session.send_message("hi there", ContentType::Text);
        assert!(update.timeline_changed);
        assert_eq!(update.scroll, Some(ScrollCommand::JumpToEnd));
        assert_eq!(
            session.timeline().messages()[0].status,
            MessageStatus::Pending
        );

        // Pull the client id from the spawned-send notification path.
        let client_id = session.timeline().messages()[0].id.clone();

        // Echo comes back with the server id.
        let update = session.handle_event(SessionEvent::Push(PushUpdate::Event(PushEvent {
            conversation_id: "a".to_string(),
            kind: PushEventKind::MessageReceived {
                message: Message {
                    id: "srv-1".to_string(),
                    conversation_id: "a".to_string(),
                    sender_id: "user_a".to_string(),
                    content: "hi there".to_string(),
                    content_type: ContentType::Text,
                    timestamp: Utc::now(),
                    status: MessageStatus::Received,
                },
                client_id: Some(client_id),
            },
        })));
        assert!(update.timeline_changed);
        assert_eq!(session.timeline().messages().len(), 1);
        assert_eq!(session.timeline().messages()[0].id, "srv-1");
        assert_eq!(session.timeline().messages()[0].status, MessageStatus::Sent);

        // The spawned REST post reports back eventually (it fails against
        // the unroutable server); drain without asserting on its result.
        let _ = rx.try_recv();
    }

    #[tokio::test]
    async fn test_presence_tracks_remote_peers_only() {
        let (mut session, _rx) = test_session();
        session.set_active("a");

        let update = session.handle_event(SessionEvent::Push(PushUpdate::Event(PushEvent {
            conversation_id: "a".to_string(),
            kind: PushEventKind::PresenceUpdated {
                sender_id: "user_b".to_string(),
                status: PresenceStatus::Typing,
            },
        })));
        assert!(update.presence_changed);
        assert_eq!(
            session.presence().status_of("user_b"),
            PresenceStatus::Typing
        );

        // Our own echo is ignored.
        let update = session.handle_event(SessionEvent::Push(PushUpdate::Event(PushEvent {
            conversation_id: "a".to_string(),
            kind: PushEventKind::PresenceUpdated {
                sender_id: "user_a".to_string(),
                status: PresenceStatus::Offline,
            },
        })));
        assert!(!update.presence_changed);
    }

    #[tokio::test]
    async fn test_remote_read_receipt_marks_prefix() {
        let (mut session, _rx) = test_session();
        session.set_active("a");
        session.handle_event(remote_message("a", "m1", 1));
        session.handle_event(remote_message("a", "m2", 2));
        session.handle_event(remote_message("a", "m3", 3));

        session.handle_event(SessionEvent::Push(PushUpdate::Event(PushEvent {
            conversation_id: "a".to_string(),
            kind: PushEventKind::ChatRead {
                sender_id: "user_b".to_string(),
                last_read_message_id: "m2".to_string(),
            },
        })));

        let statuses: Vec<MessageStatus> = session
            .timeline()
            .messages()
            .iter()
            .map(|m| m.status)
            .collect();
        assert_eq!(statuses[0], MessageStatus::Read);
        assert_eq!(statuses[1], MessageStatus::Read);
        assert_ne!(statuses[2], MessageStatus::Read);
    }

    #[tokio::test]
    async fn test_typing_debounce_resets_on_conversation_switch() {
        let (mut session, _rx, mut cmds) = test_session_with_commands();

        session.set_active("a");
        session.typing();
        // Second keystroke inside the window: suppressed.
        session.typing();

        // The first keystroke after a switch must go out immediately, not
        // wait out the previous conversation's window.
        session.set_active("b");
        session.typing();

        let mut typed = Vec::new();
        while let Ok(cmd) = cmds.try_recv() {
            if let PushCommand::Typing { conversation_id } = cmd {
                typed.push(conversation_id);
            }
        }
        assert_eq!(typed, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_switching_conversations_clears_state() {
        let (mut session, _rx) = test_session();
        session.set_active("a");
        session.handle_event(remote_message("a", "m1", 1));
        assert!(!session.timeline().is_empty());

        session.set_active("b");
        assert!(session.timeline().is_empty());
        assert_eq!(
            session.presence().status_of("user_b"),
            PresenceStatus::Offline
        );
    }
}
