//! Socket.IO v1 text-frame codec for the push channel
//!
//! Frame shapes:
//!   `1::`                     handshake
//!   `2::`                     heartbeat (both directions)
//!   `5:ACK_ID:ENDPOINT:JSON`  event (`ACK_ID` optional)
//!   `6:ACK_ID::`              ack
//!
//! The JSON body of an event frame is `{"name": ..., "args": [...]}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;

/// Heartbeat frame, sent every 30s and echoed by the server.
pub const HEARTBEAT: &str = "2::";

/// Event envelope inside a `5:` frame.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// A decoded push-channel frame.
#[derive(Debug)]
pub enum Frame {
    Handshake,
    Heartbeat,
    Event(EventEnvelope),
    Ack,
}

/// Decode one text frame.
pub fn decode(frame: &str) -> Result<Frame, ProtocolError> {
    if frame.starts_with("1::") {
        return Ok(Frame::Handshake);
    }
    if frame.starts_with("2::") {
        return Ok(Frame::Heartbeat);
    }
    if frame.starts_with("6:") {
        return Ok(Frame::Ack);
    }
    if let Some(rest) = frame.strip_prefix("5:") {
        // 5:ACK_ID:ENDPOINT:JSON -- the payload starts after the `::` separator.
        let json_str = rest
            .find("::")
            .map(|pos| &rest[pos + 2..])
            .filter(|s| s.starts_with('{'))
            .ok_or_else(|| ProtocolError::UnknownFrame(frame.to_string()))?;
        let envelope: EventEnvelope = serde_json::from_str(json_str)?;
        return Ok(Frame::Event(envelope));
    }
    Err(ProtocolError::UnknownFrame(frame.to_string()))
}

/// Encode an event frame (no ack id, default endpoint).
pub fn encode_event(name: &str, args: Vec<Value>) -> String {
    let envelope = EventEnvelope {
        name: name.to_string(),
        args,
    };
    // EventEnvelope serialization cannot fail: strings and Values only.
    format!(
        "5:::{}",
        serde_json::to_string(&envelope).unwrap_or_default()
    )
}

/// Extract the ack ID from a `5:ACK_ID::` event frame, if the server asked
/// for one. Without acks the server retries the event indefinitely.
pub fn event_ack_id(frame: &str) -> Option<u64> {
    let rest = frame.strip_prefix("5:")?;
    let colon_pos = rest.find(':')?;
    let id_part = &rest[..colon_pos];
    if id_part.is_empty() {
        return None;
    }
    id_part.parse().ok()
}

/// Encode an ack frame for the given event ack ID.
pub fn encode_ack(ack_id: u64) -> String {
    format!("6:{}::", ack_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_handshake_and_heartbeat() {
        assert!(matches!(decode("1::").unwrap(), Frame::Handshake));
        assert!(matches!(decode("2::").unwrap(), Frame::Heartbeat));
    }

    #[test]
    fn test_decode_event() {
        let frame = r#"5:::{"name":"message_received","args":[{"chat_id":"c1"}]}"#;
        match decode(frame).unwrap() {
            Frame::Event(env) => {
                assert_eq!(env.name, "message_received");
                assert_eq!(env.args.len(), 1);
                assert_eq!(env.args[0]["chat_id"], "c1");
            }
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_event_with_ack_id() {
        let frame = r#"5:42::{"name":"chat_read","args":[]}"#;
        assert!(matches!(decode(frame).unwrap(), Frame::Event(_)));
        assert_eq!(event_ack_id(frame), Some(42));
        assert_eq!(encode_ack(42), "6:42::");
    }

    #[test]
    fn test_event_without_ack_id() {
        assert_eq!(event_ack_id(r#"5:::{"name":"x","args":[]}"#), None);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let frame = encode_event("join_chat", vec![serde_json::json!("c1")]);
        match decode(&frame).unwrap() {
            Frame::Event(env) => {
                assert_eq!(env.name, "join_chat");
                assert_eq!(env.args, vec![serde_json::json!("c1")]);
            }
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_frames_are_protocol_errors() {
        assert!(decode("9::bogus").is_err());
        assert!(decode("5:::not-json").is_err());
        assert!(decode(r#"5:::{"args":[]}"#).is_err()); // missing name
    }
}
