//! Active-conversation scope guard
//!
//! Tracks which conversation is active and gates every push event and every
//! resolved history fetch on it. Events tagged with any other conversation
//! are dropped silently; that drop is the sole defense against
//! cross-conversation leakage when the transport delivers stale traffic.

/// Owner of the single active conversation id.
///
/// The epoch increments on every scope change. History fetches carry the
/// epoch they were issued under, so a fetch that resolves after the user has
/// switched away is recognized as stale and ignored.
#[derive(Debug, Default)]
pub struct ActiveScope {
    active: Option<String>,
    epoch: u64,
}

impl ActiveScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The currently active conversation, if any.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Switch the active conversation. Returns the new epoch to tag the
    /// history fetch with.
    pub fn set_active(&mut self, conversation_id: &str) -> u64 {
        self.active = Some(conversation_id.to_string());
        self.epoch += 1;
        self.epoch
    }

    /// Deactivate entirely (no conversation selected).
    pub fn clear(&mut self) {
        self.active = None;
        self.epoch += 1;
    }

    /// Whether an event tagged with this conversation may be applied.
    pub fn admits(&self, conversation_id: &str) -> bool {
        self.active.as_deref() == Some(conversation_id)
    }

    /// Whether a fetch result issued under `epoch` for `conversation_id` is
    /// still current.
    pub fn is_current(&self, conversation_id: &str, epoch: u64) -> bool {
        self.epoch == epoch && self.admits(conversation_id)
    }
}
