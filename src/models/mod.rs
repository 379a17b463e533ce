//! Data models for Relay entities

mod chat;
mod message;
mod user;

pub use chat::*;
pub use message::*;
pub use user::*;
