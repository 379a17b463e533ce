//! REST client module for the Relay chat service

mod chat;
pub mod client;

use anyhow::Result;

pub use chat::{
    create_chat_data, fetch_chat_data, fetch_messages_data, list_chats_data, post_message_data,
    post_presence_data, post_read_receipt_data,
};

/// Create a new conversation
pub async fn create_chat() -> Result<()> {
    chat::create_chat().await
}

/// List conversations
pub async fn list_chats() -> Result<()> {
    chat::list_chats().await
}

/// Read messages from a conversation
pub async fn read_messages(chat_id: &str) -> Result<()> {
    chat::read_messages(chat_id).await
}

/// Send a text message to a conversation
pub async fn send_message(to: &str, message: &str) -> Result<()> {
    chat::send_message(to, message).await
}

/// Set presence in a conversation
pub async fn set_presence(chat_id: &str, status: &str) -> Result<()> {
    chat::set_presence(chat_id, status).await
}
