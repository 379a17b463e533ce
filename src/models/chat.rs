//! Conversation-related models

use serde::{Deserialize, Serialize};

/// Fixed palette for conversation color tags (sidebar accent).
const COLOR_PALETTE: [&str; 8] = [
    "#e06c75", "#98c379", "#e5c07b", "#61afef", "#c678dd", "#56b6c2", "#d19a66", "#abb2bf",
];

/// Chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub display_name: String,
    /// Cosmetic accent color, assigned client-side from a fixed palette.
    pub color_tag: String,
    pub participant_ids: Vec<String>,
}

impl Conversation {
    /// Build a conversation with a palette color derived from its id, so the
    /// same conversation gets the same accent across listings.
    pub fn new(id: String, display_name: String, participant_ids: Vec<String>) -> Self {
        let color_tag = color_for_id(&id).to_string();
        Self {
            id,
            display_name,
            color_tag,
            participant_ids,
        }
    }
}

/// Pick a palette color deterministically from a conversation id.
pub fn color_for_id(id: &str) -> &'static str {
    let sum: usize = id.bytes().map(|b| b as usize).sum();
    COLOR_PALETTE[sum % COLOR_PALETTE.len()]
}
