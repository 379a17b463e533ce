//! Message reconciliation state
//!
//! Single authoritative ordered, deduplicated message list for the active
//! conversation. Push events arriving before the history fetch resolves are
//! inserted directly -- the list itself is the buffer -- and the fetch result
//! is merged around them by id-union. The list is always sorted ascending by
//! timestamp, ties broken by insertion order.

use crate::models::{Message, MessageStatus};

#[derive(Debug, Default)]
pub struct SyncState {
    messages: Vec<Message>,
    history_loaded: bool,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The merged timeline, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether the initial history fetch has been merged.
    pub fn history_loaded(&self) -> bool {
        self.history_loaded
    }

    /// Drop all per-conversation state (scope switch).
    pub fn clear(&mut self) {
        self.messages.clear();
        self.history_loaded = false;
    }

    /// Append a locally composed message before the network call resolves.
    /// The entry carries the client-generated id until the push echo
    /// reconciles it with the server id.
    pub fn append_local(&mut self, message: Message) {
        debug_assert_eq!(message.status, MessageStatus::Pending);
        self.insert_sorted(message);
    }

    /// The REST post for an optimistic entry resolved: bump it to `Sent`.
    pub fn mark_sent(&mut self, client_id: &str) {
        if let Some(msg) = self.messages.iter_mut().find(|m| m.id == client_id) {
            msg.status.advance(MessageStatus::Sent);
        }
    }

    /// Merge the resolved history fetch into the list.
    ///
    /// Union by id: entries already present (buffered push events, optimistic
    /// sends) keep their current status; everything else was persisted before
    /// this session and comes in as `Read`.
    pub fn apply_history(&mut self, fetched: Vec<Message>) {
        for mut msg in fetched {
            if self.contains(&msg.id) {
                continue;
            }
            msg.status.advance(MessageStatus::Read);
            self.messages.push(msg);
        }
        // Stable sort keeps insertion order for equal timestamps.
        self.messages.sort_by_key(|m| m.timestamp);
        self.history_loaded = true;
    }

    /// Apply an incoming `message_received` push event.
    ///
    /// Reconciliation order: an echoed `client_id` upgrades the matching
    /// optimistic placeholder in place (server id, server timestamp, `Sent`);
    /// a known id is a duplicate and is ignored; anything else is inserted in
    /// timestamp order. Returns true when the list changed.
    pub fn apply_push_message(
        &mut self,
        message: Message,
        client_id: Option<&str>,
        local_user: &str,
    ) -> bool {
        if let Some(cid) = client_id {
            if let Some(pos) = self.messages.iter().position(|m| m.id == cid) {
                // The server copy can already be present when the history
                // fetch resolved after the server persisted the send. The
                // placeholder is redundant then; renaming it would duplicate
                // the server id.
                if self.contains(&message.id) {
                    self.messages.remove(pos);
                    return true;
                }
                let mut entry = self.messages.remove(pos);
                entry.id = message.id;
                entry.timestamp = message.timestamp;
                entry.status.advance(MessageStatus::Sent);
                self.insert_sorted(entry);
                return true;
            }
        }

        if self.contains(&message.id) {
            return false;
        }

        let mut entry = message;
        entry.status = if entry.sender_id == local_user {
            MessageStatus::Sent
        } else {
            MessageStatus::Received
        };
        self.insert_sorted(entry);
        true
    }

    /// Prefix rule: mark every message at or before `message_id` as read.
    /// Returns the index of the acknowledged message, or `None` when the id
    /// is unknown (acceptable loss -- the ack is dropped, not retried).
    pub fn mark_read_through(&mut self, message_id: &str) -> Option<usize> {
        let idx = self.messages.iter().position(|m| m.id == message_id)?;
        for msg in &mut self.messages[..=idx] {
            msg.status.advance(MessageStatus::Read);
        }
        Some(idx)
    }

    /// Index of the first message from another participant that is not yet
    /// read locally (the "new messages" anchor position).
    pub fn first_unread(&self, local_user: &str) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| m.sender_id != local_user && m.status != MessageStatus::Read)
    }

    fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// Insert preserving timestamp order; equal timestamps keep insertion
    /// order (new entry goes after the existing run).
    fn insert_sorted(&mut self, message: Message) {
        let pos = self
            .messages
            .partition_point(|m| m.timestamp <= message.timestamp);
        self.messages.insert(pos, message);
    }
}
