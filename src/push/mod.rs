//! Push-channel client for the Relay service
//!
//! Owns the process's single websocket connection. Decodes push traffic into
//! typed [`PushEvent`] values, forwards them over an mpsc channel, and
//! reconnects with exponential backoff on transient failures. Scope filtering
//! happens downstream -- every event is delivered tagged with its
//! conversation id.

pub mod frames;
pub mod socket;

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time;

use crate::error::ProtocolError;
use crate::models::{ContentType, Message, MessageStatus, PresenceStatus};
use frames::{EventEnvelope, Frame};
use socket::RelaySocket;

/// Reconnect backoff cap in seconds (1s doubling up to this).
const BACKOFF_CAP_SECS: u64 = 64;
/// A session alive this long resets the backoff.
const STABLE_SESSION: Duration = Duration::from_secs(60);
/// Client-side heartbeat period.
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);

/// A decoded push event, tagged with the conversation it belongs to.
#[derive(Debug)]
pub struct PushEvent {
    pub conversation_id: String,
    pub kind: PushEventKind,
}

#[derive(Debug)]
pub enum PushEventKind {
    /// A message broadcast by the server. `client_id` is the echoed
    /// correlation id when the message originated from this client.
    MessageReceived {
        message: Message,
        client_id: Option<String>,
    },
    PresenceUpdated {
        sender_id: String,
        status: PresenceStatus,
    },
    ChatRead {
        sender_id: String,
        last_read_message_id: String,
    },
}

/// What the push task reports to its consumer.
#[derive(Debug)]
pub enum PushUpdate {
    Connected,
    Disconnected,
    Event(PushEvent),
}

/// Outbound push actions.
pub(crate) enum PushCommand {
    Subscribe(String),
    Unsubscribe(String),
    Typing {
        conversation_id: String,
    },
    SendMessage {
        conversation_id: String,
        content: String,
        content_type: ContentType,
        client_id: String,
    },
}

/// Handle for issuing push actions from the session/TUI side.
#[derive(Clone)]
pub struct PushHandle {
    cmd_tx: mpsc::UnboundedSender<PushCommand>,
}

impl PushHandle {
    /// Join a conversation's push membership. Idempotent server-side.
    pub fn subscribe(&self, conversation_id: &str) {
        self.send(PushCommand::Subscribe(conversation_id.to_string()));
    }

    /// Leave a conversation's push membership. Idempotent server-side.
    pub fn unsubscribe(&self, conversation_id: &str) {
        self.send(PushCommand::Unsubscribe(conversation_id.to_string()));
    }

    /// Emit a typing notification for the conversation.
    pub fn typing(&self, conversation_id: &str) {
        self.send(PushCommand::Typing {
            conversation_id: conversation_id.to_string(),
        });
    }

    /// Emit the `send_message` push action (the REST post stays authoritative).
    pub fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        content_type: ContentType,
        client_id: &str,
    ) {
        self.send(PushCommand::SendMessage {
            conversation_id: conversation_id.to_string(),
            content: content.to_string(),
            content_type,
            client_id: client_id.to_string(),
        });
    }

    fn send(&self, cmd: PushCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("Push channel task gone -- command dropped");
        }
    }
}

/// Start the push task. Returns a handle for outbound actions; decoded
/// events and connection transitions arrive on `update_tx`.
pub fn start(
    server_url: String,
    user_id: String,
    update_tx: mpsc::UnboundedSender<PushUpdate>,
) -> PushHandle {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let handle = PushHandle { cmd_tx };

    tokio::spawn(run(server_url, user_id, cmd_rx, update_tx));

    handle
}

/// Handle wired to a bare channel instead of a connection task.
#[cfg(test)]
pub(crate) fn detached_handle() -> (PushHandle, mpsc::UnboundedReceiver<PushCommand>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    (PushHandle { cmd_tx }, cmd_rx)
}

/// Connection loop with automatic reconnection.
///
/// On transient errors or server-initiated closes, reconnects with
/// exponential backoff (1s, 2s, 4s, ... capped at 64s); a stable session
/// resets the backoff. Exits when the command channel closes.
async fn run(
    server_url: String,
    user_id: String,
    mut cmd_rx: mpsc::UnboundedReceiver<PushCommand>,
    update_tx: mpsc::UnboundedSender<PushUpdate>,
) {
    let mut backoff = 1u64;
    let mut subscribed: Option<String> = None;

    loop {
        let connected_at = Instant::now();
        match run_session(
            &server_url,
            &user_id,
            &mut cmd_rx,
            &update_tx,
            &mut subscribed,
        )
        .await
        {
            Ok(()) => return,
            Err(e) => {
                if connected_at.elapsed() >= STABLE_SESSION {
                    backoff = 1;
                }
                let _ = update_tx.send(PushUpdate::Disconnected);
                tracing::warn!(
                    "Push channel disconnected: {:#}. Reconnecting in {}s...",
                    e,
                    backoff
                );
                time::sleep(Duration::from_secs(backoff)).await;
                backoff = (backoff * 2).min(BACKOFF_CAP_SECS);
            }
        }
    }
}

/// Run one full push session: connect, handshake, event loop.
///
/// Returns `Ok(())` on clean shutdown (command channel closed), `Err` when
/// the connection should be retried.
async fn run_session(
    server_url: &str,
    user_id: &str,
    cmd_rx: &mut mpsc::UnboundedReceiver<PushCommand>,
    update_tx: &mpsc::UnboundedSender<PushUpdate>,
    subscribed: &mut Option<String>,
) -> Result<()> {
    let mut ws = RelaySocket::connect(server_url, user_id).await?;

    let frame = ws
        .recv_frame()
        .await?
        .context("Connection closed before handshake")?;
    if !frame.starts_with("1::") {
        tracing::warn!("Expected 1:: handshake, got: {}", frame);
    } else {
        tracing::info!("Received handshake frame");
    }

    let _ = update_tx.send(PushUpdate::Connected);

    // Re-establish membership after a reconnect.
    if let Some(id) = subscribed.clone() {
        ws.send_text(&frames::encode_event("join_chat", vec![Value::String(id)]))
            .await?;
    }

    let mut heartbeat = time::interval(HEARTBEAT_PERIOD);
    heartbeat.tick().await; // skip first immediate tick

    loop {
        tokio::select! {
            frame = ws.recv_frame() => {
                match frame {
                    Ok(Some(text)) => handle_frame(&text, update_tx),
                    Ok(None) => anyhow::bail!("WebSocket closed by server"),
                    Err(e) => return Err(e.context("WebSocket recv error")),
                }
            }
            _ = heartbeat.tick() => {
                if let Err(e) = ws.send_text(frames::HEARTBEAT).await {
                    return Err(e.context("Heartbeat send failed"));
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => {
                        let frame = encode_command(cmd, user_id, subscribed);
                        ws.send_text(&frame).await?;
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}

/// Encode an outbound command, updating the tracked subscription.
fn encode_command(cmd: PushCommand, user_id: &str, subscribed: &mut Option<String>) -> String {
    match cmd {
        PushCommand::Subscribe(id) => {
            *subscribed = Some(id.clone());
            frames::encode_event("join_chat", vec![Value::String(id)])
        }
        PushCommand::Unsubscribe(id) => {
            if subscribed.as_deref() == Some(id.as_str()) {
                *subscribed = None;
            }
            frames::encode_event("leave_chat", vec![Value::String(id)])
        }
        PushCommand::Typing { conversation_id } => frames::encode_event(
            "typing",
            vec![serde_json::json!({
                "chat_id": conversation_id,
                "user_id": user_id,
            })],
        ),
        PushCommand::SendMessage {
            conversation_id,
            content,
            content_type,
            client_id,
        } => frames::encode_event(
            "send_message",
            vec![serde_json::json!({
                "chat_id": conversation_id,
                "user_id": user_id,
                "type": content_type.as_str(),
                "content": content,
                "client_id": client_id,
            })],
        ),
    }
}

/// Handle an incoming frame: decode, parse, forward. Malformed traffic is
/// logged and dropped.
fn handle_frame(text: &str, update_tx: &mpsc::UnboundedSender<PushUpdate>) {
    match frames::decode(text) {
        Ok(Frame::Event(envelope)) => match parse_push_event(envelope) {
            Ok(event) => {
                let _ = update_tx.send(PushUpdate::Event(event));
            }
            Err(e) => tracing::warn!("Dropping push event: {:#}", e),
        },
        Ok(Frame::Heartbeat) => tracing::debug!("Heartbeat from server"),
        Ok(Frame::Handshake) | Ok(Frame::Ack) => {}
        Err(e) => tracing::warn!("Dropping push frame: {:#}", e),
    }
}

// -- Event payloads --

#[derive(Debug, Deserialize)]
struct MessageEventPayload {
    chat_id: String,
    id: String,
    user_id: String,
    #[serde(rename = "type")]
    content_type: ContentType,
    #[serde(default)]
    content: String,
    timestamp: DateTime<Utc>,
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PresenceEventPayload {
    chat_id: String,
    user_id: String,
    status: PresenceStatus,
}

#[derive(Debug, Deserialize)]
struct ChatReadPayload {
    chat_id: String,
    user_id: String,
    last_read_message_id: String,
}

/// Parse one event envelope into a typed push event.
fn parse_push_event(envelope: EventEnvelope) -> Result<PushEvent, ProtocolError> {
    let payload = envelope
        .args
        .into_iter()
        .next()
        .ok_or(ProtocolError::MissingPayload)?;

    match envelope.name.as_str() {
        "message_received" => {
            let wire: MessageEventPayload = serde_json::from_value(payload)?;
            let message = Message {
                id: wire.id,
                conversation_id: wire.chat_id.clone(),
                sender_id: wire.user_id,
                content: wire.content,
                content_type: wire.content_type,
                timestamp: wire.timestamp,
                // The sync layer bumps this to Sent for self-authored echoes.
                status: MessageStatus::Received,
            };
            Ok(PushEvent {
                conversation_id: wire.chat_id,
                kind: PushEventKind::MessageReceived {
                    message,
                    client_id: wire.client_id,
                },
            })
        }
        "presence_updated" => {
            let wire: PresenceEventPayload = serde_json::from_value(payload)?;
            Ok(PushEvent {
                conversation_id: wire.chat_id,
                kind: PushEventKind::PresenceUpdated {
                    sender_id: wire.user_id,
                    status: wire.status,
                },
            })
        }
        "chat_read" => {
            let wire: ChatReadPayload = serde_json::from_value(payload)?;
            Ok(PushEvent {
                conversation_id: wire.chat_id,
                kind: PushEventKind::ChatRead {
                    sender_id: wire.user_id,
                    last_read_message_id: wire.last_read_message_id,
                },
            })
        }
        other => Err(ProtocolError::UnknownEvent(other.to_string())),
    }
}
