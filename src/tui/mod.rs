//! TUI module for the Relay client
//!
//! Terminal user interface using Ratatui.

mod app;
mod compose;
mod messages;
mod sidebar;
mod ui;

pub use app::run;
