//! Message-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message body content type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Audio,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
            ContentType::Audio => "audio",
        }
    }

    /// Parse the wire name; `None` for anything outside the known set.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "text" => Some(ContentType::Text),
            "image" => Some(ContentType::Image),
            "audio" => Some(ContentType::Audio),
            _ => None,
        }
    }
}

/// Parse a server timestamp (RFC 3339) into UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Delivery/read state of a message.
///
/// Variant order matters: a status only ever advances along
/// `Pending -> Sent -> Received -> Read` (see [`MessageStatus::advance`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Local optimistic entry, send not yet confirmed by the server.
    Pending,
    Sent,
    Received,
    Read,
}

impl MessageStatus {
    /// Move forward to `target` if it is later in the lifecycle.
    /// A regression request is a no-op.
    pub fn advance(&mut self, target: MessageStatus) {
        if target > *self {
            *self = target;
        }
    }
}

/// Chat message
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: String,
    pub content_type: ContentType,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_advances_forward() {
        let mut status = MessageStatus::Pending;
        status.advance(MessageStatus::Sent);
        assert_eq!(status, MessageStatus::Sent);
        status.advance(MessageStatus::Read);
        assert_eq!(status, MessageStatus::Read);
    }

    #[test]
    fn test_status_never_regresses() {
        let mut status = MessageStatus::Read;
        status.advance(MessageStatus::Received);
        assert_eq!(status, MessageStatus::Read);
        status.advance(MessageStatus::Pending);
        assert_eq!(status, MessageStatus::Read);
    }

    #[test]
    fn test_content_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&ContentType::Audio).unwrap(),
            "\"audio\""
        );
        let parsed: ContentType = serde_json::from_str("\"image\"").unwrap();
        assert_eq!(parsed, ContentType::Image);
    }
}
