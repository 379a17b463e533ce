//! Read-receipt coordination
//!
//! Outbound: acknowledge the conversation as read exactly once per "tail
//! became newly fully visible" transition -- not on every viewport signal.
//! Inbound: apply the prefix rule via [`SyncState::mark_read_through`].

use super::state::SyncState;

#[derive(Debug, Default)]
pub struct ReadReceiptCoordinator {
    /// Tail id we last acknowledged; suppresses re-fires for the same tail.
    last_acknowledged: Option<String>,
}

impl ReadReceiptCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset on scope switch.
    pub fn clear(&mut self) {
        self.last_acknowledged = None;
    }

    /// Decide whether to emit an outbound read receipt.
    ///
    /// Fires only when the tail message is from another participant, is not
    /// already read, the viewport reports the bottom visible, and this tail
    /// has not been acknowledged yet. Returns the message id to acknowledge.
    pub fn outbound(
        &mut self,
        state: &SyncState,
        local_user: &str,
        bottom_visible: bool,
    ) -> Option<String> {
        if !bottom_visible {
            return None;
        }
        let last = state.last()?;
        if last.sender_id == local_user {
            return None;
        }
        if last.status == crate::models::MessageStatus::Read {
            return None;
        }
        if self.last_acknowledged.as_deref() == Some(last.id.as_str()) {
            return None;
        }
        self.last_acknowledged = Some(last.id.clone());
        Some(last.id.clone())
    }

    /// Apply an inbound acknowledgement from another participant. Unknown
    /// ids (receipt raced ahead of its message) are dropped, not retried.
    pub fn apply_remote(&self, state: &mut SyncState, last_read_message_id: &str) {
        if state.mark_read_through(last_read_message_id).is_none() {
            tracing::debug!(
                "Read receipt for unknown message {} -- dropped",
                last_read_message_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, Message, MessageStatus};
    use chrono::DateTime;

    fn push(state: &mut SyncState, id: &str, sender: &str, ts: i64) {
        let msg = Message {
            id: id.to_string(),
            conversation_id: "c1".to_string(),
            sender_id: sender.to_string(),
            content: String::new(),
            content_type: ContentType::Text,
            timestamp: DateTime::from_timestamp(ts, 0).unwrap(),
            status: MessageStatus::Received,
        };
        state.apply_push_message(msg, None, "user_a");
    }

    #[test]
    fn test_outbound_fires_once_per_tail() {
        let mut state = SyncState::new();
        let mut coord = ReadReceiptCoordinator::new();
        push(&mut state, "m1", "user_b", 1);

        assert_eq!(
            coord.outbound(&state, "user_a", true),
            Some("m1".to_string())
        );
        // Same tail, repeated viewport signals: no re-fire.
        assert_eq!(coord.outbound(&state, "user_a", true), None);
        assert_eq!(coord.outbound(&state, "user_a", true), None);
    }

    #[test]
    fn test_outbound_rearms_on_new_tail() {
        let mut state = SyncState::new();
        let mut coord = ReadReceiptCoordinator::new();
        push(&mut state, "m1", "user_b", 1);
        assert!(coord.outbound(&state, "user_a", true).is_some());

        push(&mut state, "m2", "user_b", 2);
        assert_eq!(
            coord.outbound(&state, "user_a", true),
            Some("m2".to_string())
        );
    }

    #[test]
    fn test_outbound_requires_bottom_visible() {
        let mut state = SyncState::new();
        let mut coord = ReadReceiptCoordinator::new();
        push(&mut state, "m1", "user_b", 1);

        assert_eq!(coord.outbound(&state, "user_a", false), None);
        // Becomes visible later: fires then.
        assert!(coord.outbound(&state, "user_a", true).is_some());
    }

    #[test]
    fn test_outbound_skips_own_and_read_tail() {
        let mut state = SyncState::new();
        let mut coord = ReadReceiptCoordinator::new();

        push(&mut state, "m1", "user_a", 1); // own message
        assert_eq!(coord.outbound(&state, "user_a", true), None);

        push(&mut state, "m2", "user_b", 2);
        state.mark_read_through("m2");
        assert_eq!(coord.outbound(&state, "user_a", true), None);
    }

    #[test]
    fn test_inbound_applies_prefix_rule() {
        let mut state = SyncState::new();
        let coord = ReadReceiptCoordinator::new();
        push(&mut state, "m1", "user_a", 1);
        push(&mut state, "m2", "user_a", 2);
        push(&mut state, "m3", "user_a", 3);

        coord.apply_remote(&mut state, "m2");
        assert_eq!(state.messages()[0].status, MessageStatus::Read);
        assert_eq!(state.messages()[1].status, MessageStatus::Read);
        assert_eq!(state.messages()[2].status, MessageStatus::Received);
    }

    #[test]
    fn test_inbound_unknown_id_is_silent() {
        let mut state = SyncState::new();
        let coord = ReadReceiptCoordinator::new();
        push(&mut state, "m1", "user_a", 1);
        coord.apply_remote(&mut state, "nope");
        assert_eq!(state.messages()[0].status, MessageStatus::Received);
    }
}
