//! Peer presence tracking
//!
//! Last-delivered-wins per participant: whatever presence event arrived most
//! recently sets the state, with no timestamp or sequence comparison (the
//! transport guarantees no causal order). The wire has no "stopped typing"
//! event, so `Typing` decays back to `Online` after a short idle window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::PresenceStatus;

/// How long a typing indication stays up without a refresh.
const TYPING_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Default)]
pub struct PresenceTracker {
    participants: HashMap<String, (PresenceStatus, Instant)>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset on scope switch.
    pub fn clear(&mut self) {
        self.participants.clear();
    }

    /// Apply a presence event, unconditionally overwriting the prior state.
    pub fn apply(&mut self, sender_id: &str, status: PresenceStatus) {
        self.apply_at(sender_id, status, Instant::now());
    }

    pub fn apply_at(&mut self, sender_id: &str, status: PresenceStatus, now: Instant) {
        self.participants
            .insert(sender_id.to_string(), (status, now));
    }

    /// Current state for a participant; unknown participants are offline.
    pub fn status_of(&self, sender_id: &str) -> PresenceStatus {
        self.participants
            .get(sender_id)
            .map(|(status, _)| *status)
            .unwrap_or(PresenceStatus::Offline)
    }

    /// Participants currently marked typing, for the indicator line.
    pub fn typing_peers(&self) -> Vec<&str> {
        let mut peers: Vec<&str> = self
            .participants
            .iter()
            .filter(|(_, (status, _))| *status == PresenceStatus::Typing)
            .map(|(id, _)| id.as_str())
            .collect();
        peers.sort_unstable();
        peers
    }

    /// Any participant (other than the local user) online or typing.
    pub fn any_peer_online(&self, local_user: &str) -> bool {
        self.participants
            .iter()
            .any(|(id, (status, _))| id != local_user && *status != PresenceStatus::Offline)
    }

    /// Decay stale typing states back to online. Called from the tick loop.
    pub fn expire_typing(&mut self, now: Instant) {
        for (status, since) in self.participants.values_mut() {
            if *status == PresenceStatus::Typing && now.duration_since(*since) >= TYPING_TTL {
                *status = PresenceStatus::Online;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_participant_is_offline() {
        let tracker = PresenceTracker::new();
        assert_eq!(tracker.status_of("user_b"), PresenceStatus::Offline);
    }

    #[test]
    fn test_last_delivered_wins() {
        let mut tracker = PresenceTracker::new();
        tracker.apply("user_b", PresenceStatus::Online);
        tracker.apply("user_b", PresenceStatus::Typing);
        assert_eq!(tracker.status_of("user_b"), PresenceStatus::Typing);

        // Even a "stale" offline overwrites: no causal ordering on the wire.
        tracker.apply("user_b", PresenceStatus::Offline);
        assert_eq!(tracker.status_of("user_b"), PresenceStatus::Offline);
    }

    #[test]
    fn test_participants_are_independent() {
        let mut tracker = PresenceTracker::new();
        tracker.apply("user_b", PresenceStatus::Online);
        tracker.apply("user_c", PresenceStatus::Typing);
        assert_eq!(tracker.status_of("user_b"), PresenceStatus::Online);
        assert_eq!(tracker.typing_peers(), vec!["user_c"]);
    }

    #[test]
    fn test_typing_decays_to_online() {
        let mut tracker = PresenceTracker::new();
        let start = Instant::now();
        tracker.apply_at("user_b", PresenceStatus::Typing, start);

        tracker.expire_typing(start + Duration::from_secs(1));
        assert_eq!(tracker.status_of("user_b"), PresenceStatus::Typing);

        tracker.expire_typing(start + TYPING_TTL);
        assert_eq!(tracker.status_of("user_b"), PresenceStatus::Online);
    }

    #[test]
    fn test_typing_refresh_extends_ttl() {
        let mut tracker = PresenceTracker::new();
        let start = Instant::now();
        tracker.apply_at("user_b", PresenceStatus::Typing, start);
        tracker.apply_at("user_b", PresenceStatus::Typing, start + Duration::from_secs(2));

        tracker.expire_typing(start + Duration::from_secs(4));
        assert_eq!(tracker.status_of("user_b"), PresenceStatus::Typing);
    }

    #[test]
    fn test_clear_forgets_everyone() {
        let mut tracker = PresenceTracker::new();
        tracker.apply("user_b", PresenceStatus::Online);
        tracker.clear();
        assert!(!tracker.any_peer_online("user_a"));
    }
}
