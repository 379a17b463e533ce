//! Viewport anchoring policy
//!
//! Decides where the message view should sit when the timeline changes, and
//! exposes the bottom-visibility signal the read-receipt coordinator keys
//! off. Re-evaluation happens only when the list tail changes; scroll frames
//! merely drive the `UserScrolledAway <-> AtBottom` edge.

use super::state::SyncState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorState {
    /// Following the newest message.
    AtBottom,
    /// Holding position at the first unread message, with the "new messages"
    /// affordance shown.
    AnchoredToUnread,
    /// The user scrolled up on their own; do not yank the view around.
    UserScrolledAway,
}

/// What the rendering layer should do with the scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollCommand {
    JumpToEnd,
    SmoothToEnd,
    /// Position the view at this message index.
    JumpToFirstUnread(usize),
}

#[derive(Debug)]
pub struct ViewportAnchor {
    state: AnchorState,
    last_tail: Option<String>,
    show_unread_affordance: bool,
}

impl Default for ViewportAnchor {
    fn default() -> Self {
        Self {
            state: AnchorState::AtBottom,
            last_tail: None,
            show_unread_affordance: false,
        }
    }
}

impl ViewportAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset on scope switch.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn state(&self) -> AnchorState {
        self.state
    }

    /// Whether the bottom of the timeline is considered visible. This is the
    /// condition the read-receipt coordinator consumes.
    pub fn bottom_visible(&self) -> bool {
        self.state == AnchorState::AtBottom
    }

    /// Whether to surface the "new messages" affordance.
    pub fn unread_affordance(&self) -> bool {
        self.show_unread_affordance
    }

    /// Re-evaluate after the message list changed. `overflows` is whether the
    /// rendered content exceeds the viewport. Returns a scroll command when
    /// the view should move.
    pub fn on_list_changed(
        &mut self,
        sync: &SyncState,
        local_user: &str,
        overflows: bool,
    ) -> Option<ScrollCommand> {
        let tail = sync.last().map(|m| m.id.clone());
        if tail == self.last_tail {
            return None;
        }
        self.last_tail = tail;

        let last_is_own = sync
            .last()
            .map(|m| m.sender_id == local_user)
            .unwrap_or(false);

        if last_is_own {
            // A message we just sent always snaps the view to the end.
            self.state = AnchorState::AtBottom;
            self.show_unread_affordance = false;
            return Some(ScrollCommand::JumpToEnd);
        }

        match sync.first_unread(local_user) {
            Some(idx) if overflows => {
                self.state = AnchorState::AnchoredToUnread;
                self.show_unread_affordance = true;
                Some(ScrollCommand::JumpToFirstUnread(idx))
            }
            None if overflows => {
                self.state = AnchorState::AtBottom;
                self.show_unread_affordance = false;
                Some(ScrollCommand::SmoothToEnd)
            }
            // Content fits: everything is visible, nothing to reposition.
            _ => {
                self.state = AnchorState::AtBottom;
                self.show_unread_affordance = false;
                None
            }
        }
    }

    /// Scroll-frame edge: only the bottom boundary matters here.
    pub fn on_scroll(&mut self, at_bottom: bool) {
        if at_bottom {
            self.state = AnchorState::AtBottom;
            self.show_unread_affordance = false;
        } else if self.state == AnchorState::AtBottom {
            self.state = AnchorState::UserScrolledAway;
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
    fn test_own_message_forces_bottom() {
        let mut sync = SyncState::new();
        let mut anchor = ViewportAnchor::new();
        anchor.on_scroll(false); // user had scrolled away

        push(&mut sync, "m1", "user_a", 1);
        let cmd = anchor.on_list_changed(&sync, "user_a", true);
        assert_eq!(cmd, Some(ScrollCommand::JumpToEnd));
        assert_eq!(anchor.state(), AnchorState::AtBottom);
    }

    #[test]
    fn test_unread_with_overflow_anchors_to_first_unread() {
        let mut sync = SyncState::new();
        let mut anchor = ViewportAnchor::new();
        sync.apply_history(vec![]);
        push(&mut sync, "m1", "user_b", 1);
        push(&mut sync, "m2", "user_b", 2);

        let cmd = anchor.on_list_changed(&sync, "user_a", true);
        assert_eq!(cmd, Some(ScrollCommand::JumpToFirstUnread(0)));
        assert_eq!(anchor.state(), AnchorState::AnchoredToUnread);
        assert!(anchor.unread_affordance());
        // Anchoring alone must not trigger receipts.
        assert!(!anchor.bottom_visible());
    }

    #[test]
    fn test_no_unread_with_overflow_scrolls_to_end() {
        let mut sync = SyncState::new();
        let mut anchor = ViewportAnchor::new();
        push(&mut sync, "m1", "user_b", 1);
        sync.mark_read_through("m1");

        let cmd = anchor.on_list_changed(&sync, "user_a", true);
        assert_eq!(cmd, Some(ScrollCommand::SmoothToEnd));
        assert!(anchor.bottom_visible());
    }

    #[test]
    fn test_content_that_fits_stays_at_bottom() {
        let mut sync = SyncState::new();
        let mut anchor = ViewportAnchor::new();
        push(&mut sync, "m1", "user_b", 1);

        let cmd = anchor.on_list_changed(&sync, "user_a", false);
        assert_eq!(cmd, None);
        assert!(anchor.bottom_visible());
        assert!(!anchor.unread_affordance());
    }

    #[test]
    fn test_unchanged_tail_does_not_reevaluate() {
        let mut sync = SyncState::new();
        let mut anchor = ViewportAnchor::new();
        push(&mut sync, "m1", "user_b", 1);

        assert!(anchor.on_list_changed(&sync, "user_a", true).is_some());
        // Status-only change, same tail: no new command.
        sync.mark_read_through("m1");
        assert!(anchor.on_list_changed(&sync, "user_a", true).is_none());
    }

    #[test]
    fn test_scroll_away_and_back_edges() {
        let mut anchor = ViewportAnchor::new();
        assert_eq!(anchor.state(), AnchorState::AtBottom);

        anchor.on_scroll(false);
        assert_eq!(anchor.state(), AnchorState::UserScrolledAway);
        assert!(!anchor.bottom_visible());

        anchor.on_scroll(true);
        assert_eq!(anchor.state(), AnchorState::AtBottom);
        assert!(anchor.bottom_visible());
    }

    #[test]
    fn test_scrolling_to_bottom_clears_unread_anchor() {
        let mut sync = SyncState::new();
        let mut anchor = ViewportAnchor::new();
        push(&mut sync, "m1", "user_b", 1);
        anchor.on_list_changed(&sync, "user_a", true);
        assert!(anchor.unread_affordance());

        anchor.on_scroll(true);
        assert_eq!(anchor.state(), AnchorState::AtBottom);
        assert!(!anchor.unread_affordance());
    }
}
