//! Relay chat REST operations
//!
//! Request/response half of the transport: conversation listing/creation,
//! history fetch, and the outbound posts (message, presence, read receipt).
//! The authoritative copy of a posted message arrives later on the push
//! channel; these calls never return server-assigned ids.

use anyhow::{Context, Result};
use serde::Deserialize;

use super::client::RelayClient;
use crate::error::TransportError;
use crate::models::{
    parse_timestamp, ContentType, Conversation, Message, MessageStatus, PresenceStatus,
};

// -- Response types for the Relay REST API --

#[derive(Debug, Deserialize)]
struct CreateChatResponse {
    chat_id: String,
}

#[derive(Debug, Deserialize)]
struct WireConversation {
    chat_id: Option<String>,
    name: Option<String>,
    #[serde(default)]
    participants: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: Option<String>,
    user_id: Option<String>,
    content: Option<String>,
    #[serde(rename = "type")]
    content_type: Option<String>,
    timestamp: Option<String>,
    status: Option<String>,
}

impl WireMessage {
    /// Convert to the domain model. Entries without a usable id, sender, or
    /// timestamp are dropped by the caller.
    fn into_message(self, conversation_id: &str) -> Option<Message> {
        let id = self.id.filter(|s| !s.is_empty())?;
        let sender_id = self.user_id.filter(|s| !s.is_empty())?;
        let timestamp = parse_timestamp(self.timestamp.as_deref()?)?;
        let raw_type = self.content_type.as_deref().unwrap_or("text");
        let content_type = match ContentType::from_wire(raw_type) {
            Some(ct) => ct,
            None => {
                tracing::debug!("Skipping message {} with unknown type '{}'", id, raw_type);
                return None;
            }
        };
        let status = match self.status.as_deref() {
            Some("read") => MessageStatus::Read,
            Some("sent") => MessageStatus::Sent,
            _ => MessageStatus::Received,
        };

        Some(Message {
            id,
            conversation_id: conversation_id.to_string(),
            sender_id,
            content: self.content.unwrap_or_default(),
            content_type,
            timestamp,
            status,
        })
    }
}

fn conversation_from_wire(wire: WireConversation) -> Option<Conversation> {
    let id = wire.chat_id.filter(|s| !s.is_empty())?;
    let display_name = wire
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| id.clone());
    Some(Conversation::new(id, display_name, wire.participants))
}

// ---------------------------------------------------------------------------
// Data-returning operations (used by the sync engine and the TUI)
// ---------------------------------------------------------------------------

/// Create a new conversation; returns its id.
pub async fn create_chat_data(client: &RelayClient) -> Result<String, TransportError> {
    let body = serde_json::json!({ "participants": [client.user_id()] });
    let resp = client.post("/chats", &body).await?;
    let created: CreateChatResponse = resp.json().await?;
    Ok(created.chat_id)
}

/// List conversations visible to this user.
pub async fn list_chats_data(client: &RelayClient) -> Result<Vec<Conversation>, TransportError> {
    let resp = client.get("/chats").await?;
    let wires: Vec<WireConversation> = resp.json().await?;
    Ok(wires.into_iter().filter_map(conversation_from_wire).collect())
}

/// Fetch detail for one conversation.
pub async fn fetch_chat_data(
    client: &RelayClient,
    chat_id: &str,
) -> Result<Option<Conversation>, TransportError> {
    let resp = client.get(&format!("/chats/{}", chat_id)).await?;
    let wire: WireConversation = resp.json().await?;
    Ok(conversation_from_wire(wire))
}

/// Fetch persisted history for a conversation, oldest first.
///
/// Returns everything the server has at call time; no span or completeness
/// guarantee beyond that. Unusable entries are skipped.
pub async fn fetch_messages_data(
    client: &RelayClient,
    chat_id: &str,
) -> Result<Vec<Message>, TransportError> {
    let resp = client.get(&format!("/chats/{}/messages", chat_id)).await?;
    let wires: Vec<WireMessage> = resp.json().await?;

    let mut messages: Vec<Message> = wires
        .into_iter()
        .filter_map(|w| w.into_message(chat_id))
        .collect();
    messages.sort_by_key(|m| m.timestamp);
    Ok(messages)
}

/// Post a message. The server-assigned id is not returned; the push channel
/// echoes the message back with `client_id` for optimistic reconciliation.
pub async fn post_message_data(
    client: &RelayClient,
    chat_id: &str,
    content: &str,
    content_type: ContentType,
    client_id: &str,
) -> Result<(), TransportError> {
    let body = serde_json::json!({
        "user_id": client.user_id(),
        "type": content_type.as_str(),
        "content": content,
        "client_id": client_id,
    });
    client
        .post(&format!("/chats/{}/messages", chat_id), &body)
        .await?;
    Ok(())
}

/// Post a presence update for the active conversation. Fire-and-forget at the
/// call sites: callers log failures instead of surfacing them.
pub async fn post_presence_data(
    client: &RelayClient,
    chat_id: &str,
    status: PresenceStatus,
) -> Result<(), TransportError> {
    let body = serde_json::json!({
        "user_id": client.user_id(),
        "status": status.as_str(),
    });
    client
        .post(&format!("/chats/{}/presence", chat_id), &body)
        .await?;
    Ok(())
}

/// Acknowledge everything up to `last_read_message_id` as read.
pub async fn post_read_receipt_data(
    client: &RelayClient,
    chat_id: &str,
    last_read_message_id: &str,
) -> Result<(), TransportError> {
    let body = serde_json::json!({
        "user_id": client.user_id(),
        "last_read_message_id": last_read_message_id,
    });
    client
        .post(&format!("/chats/{}/read", chat_id), &body)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI commands (print to stdout)
// ---------------------------------------------------------------------------

/// Create a conversation and print its id.
pub async fn create_chat() -> Result<()> {
    let client = RelayClient::new()?;
    let chat_id = create_chat_data(&client)
        .await
        .context("Failed to create conversation")?;
    println!("Created conversation: {}", chat_id);
    Ok(())
}

/// List conversations (prints to stdout).
pub async fn list_chats() -> Result<()> {
    let client = RelayClient::new()?;
    let chats = list_chats_data(&client)
        .await
        .context("Failed to list conversations")?;

    println!("\nConversations:");
    println!("{:-<60}", "");

    if chats.is_empty() {
        println!("  (no conversations found)");
        return Ok(());
    }

    for chat in &chats {
        println!("{}", chat.display_name);
        println!("  ID: {}", chat.id);
        if !chat.participant_ids.is_empty() {
            println!("  Participants: {}", chat.participant_ids.join(", "));
        }
        println!();
    }

    Ok(())
}

/// Read messages from a conversation (prints to stdout).
pub async fn read_messages(chat_id: &str) -> Result<()> {
    let client = RelayClient::new()?;

    if let Some(conv) = fetch_chat_data(&client, chat_id)
        .await
        .context("Failed to fetch conversation")?
    {
        println!("{}", conv.display_name);
        println!("{:-<60}", "");
    }

    let msgs = fetch_messages_data(&client, chat_id)
        .await
        .context("Failed to fetch messages")?;

    if msgs.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    for msg in &msgs {
        println!(
            "[{}] {}: {}",
            msg.timestamp.format("%Y-%m-%d %H:%M:%S"),
            msg.sender_id,
            msg.content
        );
    }

    Ok(())
}

/// Send a text message to a conversation.
pub async fn send_message(chat_id: &str, message: &str) -> Result<()> {
    let client = RelayClient::new()?;
    let client_id = uuid::Uuid::new_v4().to_string();
    post_message_data(&client, chat_id, message, ContentType::Text, &client_id)
        .await
        .context("Failed to send message")?;
    println!("Message sent.");
    Ok(())
}

/// Set presence in a conversation.
pub async fn set_presence(chat_id: &str, status: &str) -> Result<()> {
    let status: PresenceStatus = status.parse().map_err(anyhow::Error::msg)?;
    let client = RelayClient::new()?;
    post_presence_data(&client, chat_id, status)
        .await
        .context("Failed to post presence")?;
    println!("Presence set to: {}", status.as_str());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_message_conversion() {
        let wire = WireMessage {
            id: Some("m1".into()),
            user_id: Some("user_a".into()),
            content: Some("hello".into()),
            content_type: Some("text".into()),
            timestamp: Some("2024-05-01T10:00:00Z".into()),
            status: None,
        };
        let msg = wire.into_message("c1").expect("usable message");
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.conversation_id, "c1");
        assert_eq!(msg.status, MessageStatus::Received);
        assert_eq!(msg.content_type, ContentType::Text);
    }

    #[test]
    fn test_wire_message_without_id_is_dropped() {
        let wire = WireMessage {
            id: None,
            user_id: Some("user_a".into()),
            content: Some("hello".into()),
            content_type: Some("text".into()),
            timestamp: Some("2024-05-01T10:00:00Z".into()),
            status: None,
        };
        assert!(wire.into_message("c1").is_none());
    }

    #[test]
    fn test_wire_message_unknown_type_is_dropped() {
        let wire = WireMessage {
            id: Some("m1".into()),
            user_id: Some("user_a".into()),
            content: Some("spin".into()),
            content_type: Some("hologram".into()),
            timestamp: Some("2024-05-01T10:00:00Z".into()),
            status: None,
        };
        assert!(wire.into_message("c1").is_none());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("2024-05-01T10:00:00Z").is_some());
        assert!(parse_timestamp("yesterday-ish").is_none());
    }
}
