//! Relay CLI - Lightweight client for the Relay chat service
//!
//! A terminal-based chat client: REST for history and sends, a websocket
//! push channel for live updates, and a Ratatui interface on top.

mod api;
mod config;
mod error;
mod models;
mod push;
mod sync;
mod tui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Lightweight CLI client for the Relay chat service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the local user identity and server URL
    Whoami,

    /// Create a new conversation
    Create,

    /// List conversations
    Chats,

    /// Read messages from a conversation
    Read {
        /// Conversation ID (from `chats` output)
        chat_id: String,
    },

    /// Send a message
    Send {
        /// Conversation ID (from `chats` output)
        #[arg(short, long)]
        to: String,

        /// Message content
        message: String,
    },

    /// Set presence in a conversation
    Presence {
        /// Conversation ID
        chat_id: String,

        /// New status: online, typing, offline
        #[arg(short, long)]
        set: String,
    },

    /// Launch the terminal user interface
    Tui,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Whoami => {
            let mut config = config::Config::load()?;
            let user_id = config.ensure_user_id()?;
            println!("User ID: {}", user_id);
            println!("Server:  {}", config.server_url());
        }
        Commands::Create => {
            api::create_chat().await?;
        }
        Commands::Chats => {
            tracing::info!("Fetching conversations...");
            api::list_chats().await?;
        }
        Commands::Read { chat_id } => {
            api::read_messages(&chat_id).await?;
        }
        Commands::Send { to, message } => {
            tracing::info!("Sending message...");
            api::send_message(&to, &message).await?;
        }
        Commands::Presence { chat_id, set } => {
            api::set_presence(&chat_id, &set).await?;
        }
        Commands::Tui => {
            tui::run().await?;
        }
    }

    Ok(())
}
