//! Participant presence models

use serde::{Deserialize, Serialize};

/// Presence state of a remote participant. Exactly one is active at a time;
/// participants start out `Offline` until their first presence event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Typing,
    Offline,
}

impl PresenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresenceStatus::Online => "online",
            PresenceStatus::Typing => "typing",
            PresenceStatus::Offline => "offline",
        }
    }
}

impl std::str::FromStr for PresenceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(PresenceStatus::Online),
            "typing" => Ok(PresenceStatus::Typing),
            "offline" => Ok(PresenceStatus::Offline),
            other => Err(format!(
                "Unknown status: {}. Use: online, typing, offline",
                other
            )),
        }
    }
}
