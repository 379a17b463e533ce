//! TUI application state and main event loop
//!
//! One `tokio::select!` loop multiplexes terminal input, session events
//! (push traffic, resolved fetches and sends), list refreshes, and the
//! housekeeping tick. All sync state lives in [`ChatSession`]; this module
//! only routes events and holds view state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::DefaultTerminal;
use tokio::sync::mpsc;
use tokio::time;

use crate::api;
use crate::api::client::RelayClient;
use crate::error::TransportError;
use crate::models::{ContentType, Conversation};
use crate::push;
use crate::sync::{ChatSession, SessionEvent};

use super::compose::ComposeState;
use super::messages::MessagesState;
use super::sidebar::SidebarState;
use super::ui;

/// Housekeeping tick (typing decay, status expiry).
const TICK_PERIOD: Duration = Duration::from_millis(250);

/// How long a status-bar message stays up.
const STATUS_TTL: Duration = Duration::from_secs(5);

/// Active pane in the TUI.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Sidebar,
    Messages,
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Sidebar => "sidebar",
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Messages,
            Pane::Messages => Pane::Compose,
            Pane::Compose => Pane::Sidebar,
        }
    }
}

/// Results of view-level background work (not part of the sync engine).
enum UiEvent {
    Conversations(Result<Vec<Conversation>, TransportError>),
    Created(Result<String, TransportError>),
}

/// A transient status-bar message.
struct StatusMessage {
    text: String,
    is_error: bool,
    shown_at: Instant,
}

/// Application state.
pub struct App {
    pub should_exit: bool,
    pub session: ChatSession,
    pub sidebar: SidebarState,
    pub messages: MessagesState,
    pub compose: ComposeState,
    pub active_pane: Pane,
    status: Option<StatusMessage>,
    client: Arc<RelayClient>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
}

impl App {
    pub fn status_line(&self) -> Option<(&str, bool)> {
        self.status
            .as_ref()
            .map(|s| (s.text.as_str(), s.is_error))
    }

    fn set_status(&mut self, text: String, is_error: bool) {
        self.status = Some(StatusMessage {
            text,
            is_error,
            shown_at: Instant::now(),
        });
    }

    fn refresh_conversations(&self) {
        let client = Arc::clone(&self.client);
        let tx = self.ui_tx.clone();
        tokio::spawn(async move {
            let result = api::list_chats_data(&client).await;
            let _ = tx.send(UiEvent::Conversations(result));
        });
    }

    fn create_conversation(&self) {
        let client = Arc::clone(&self.client);
        let tx = self.ui_tx.clone();
        tokio::spawn(async move {
            let result = api::create_chat_data(&client).await;
            let _ = tx.send(UiEvent::Created(result));
        });
    }

    fn activate_selected(&mut self) {
        let Some(conv) = self.sidebar.selected_conversation().cloned() else {
            return;
        };
        self.sidebar.active_id = Some(conv.id.clone());
        self.messages.reset(conv.display_name.clone());
        self.compose.clear();
        self.session.set_active(&conv.id);
        self.active_pane = Pane::Compose;
    }

    fn send_current(&mut self) {
        let Some(text) = self.compose.take() else {
            return;
        };
        if self.session.active_conversation().is_none() {
            self.set_status("No active conversation".to_string(), true);
            return;
        }
        let update = self.session.send_message(&text, ContentType::Text);
        if let Some(cmd) = update.scroll {
            self.messages.queue_scroll(cmd);
        }
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        let update = self.session.handle_event(event);
        if let Some(cmd) = update.scroll {
            self.messages.queue_scroll(cmd);
        }
    }

    fn handle_ui_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Conversations(Ok(conversations)) => {
                self.sidebar.update_conversations(conversations);
                // First listing with nothing active: join the top conversation.
                if self.sidebar.active_id.is_none() && !self.sidebar.conversations.is_empty() {
                    self.sidebar.selected = 0;
                    self.activate_selected();
                }
            }
            UiEvent::Conversations(Err(e)) => {
                self.sidebar.loading = false;
                self.set_status(format!("Listing failed: {}", e), true);
            }
            UiEvent::Created(Ok(id)) => {
                self.set_status(format!("Created conversation {}", id), false);
                self.refresh_conversations();
            }
            UiEvent::Created(Err(e)) => {
                self.set_status(format!("Create failed: {}", e), true);
            }
        }
    }

    fn handle_terminal_event(&mut self, event: Event) {
        let Event::Key(key) = event else {
            return;
        };
        if key.kind != KeyEventKind::Press {
            return;
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return;
        }
        if key.code == KeyCode::Tab {
            self.active_pane = self.active_pane.next();
            return;
        }

        match self.active_pane {
            Pane::Sidebar => self.handle_sidebar_key(key),
            Pane::Messages => self.handle_messages_key(key),
            Pane::Compose => self.handle_compose_key(key),
        }
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Up | KeyCode::Char('k') => self.sidebar.move_up(),
            KeyCode::Down | KeyCode::Char('j') => self.sidebar.move_down(),
            KeyCode::Enter => self.activate_selected(),
            KeyCode::Char('r') => {
                self.refresh_conversations();
                self.set_status("Refreshing...".to_string(), false);
            }
            KeyCode::Char('n') => self.create_conversation(),
            _ => {}
        }
    }

    fn handle_messages_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_exit = true,
            KeyCode::Up | KeyCode::Char('k') => self.messages.scroll_up(1),
            KeyCode::Down | KeyCode::Char('j') => self.messages.scroll_down(1),
            KeyCode::PageUp => self.messages.scroll_up(10),
            KeyCode::PageDown => self.messages.scroll_down(10),
            KeyCode::End | KeyCode::Char('G') => self.messages.scroll_to_bottom(),
            _ => {}
        }
    }

    fn handle_compose_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.active_pane = Pane::Sidebar,
            KeyCode::Enter => self.send_current(),
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.compose.clear();
            }
            KeyCode::Char(c) => {
                self.compose.insert_char(c);
                self.session.typing();
            }
            _ => {}
        }
    }

    /// Post-frame bookkeeping: report viewport geometry to the session and
    /// surface any error it recorded.
    fn after_draw(&mut self) {
        if self.session.active_conversation().is_some() {
            self.session
                .viewport_changed(self.messages.overflows, self.messages.at_bottom);
        }
        if let Some(err) = self.session.take_error() {
            self.set_status(err, true);
        }
    }

    fn tick(&mut self) {
        self.session.tick();
        if let Some(status) = &self.status {
            if status.shown_at.elapsed() >= STATUS_TTL {
                self.status = None;
            }
        }
    }
}

/// Run the TUI application with terminal restore on exit.
pub async fn run() -> Result<()> {
    let client = Arc::new(RelayClient::new()?);
    let mut terminal = ratatui::init();
    let result = run_app(&mut terminal, client).await;
    ratatui::restore();
    result
}

async fn run_app(terminal: &mut DefaultTerminal, client: Arc<RelayClient>) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let (push_tx, mut push_rx) = mpsc::unbounded_channel();
    let (ui_tx, mut ui_rx) = mpsc::unbounded_channel::<UiEvent>();

    let push_handle = push::start(
        client.base_url().to_string(),
        client.user_id().to_string(),
        push_tx,
    );

    // Wrap push traffic into session events so there is one dispatch queue.
    let forward_tx = event_tx.clone();
    tokio::spawn(async move {
        while let Some(update) = push_rx.recv().await {
            if forward_tx.send(SessionEvent::Push(update)).is_err() {
                break;
            }
        }
    });

    let session = ChatSession::new(Arc::clone(&client), push_handle, event_tx);

    let mut app = App {
        should_exit: false,
        session,
        sidebar: SidebarState::default(),
        messages: MessagesState::default(),
        compose: ComposeState::default(),
        active_pane: Pane::default(),
        status: None,
        client,
        ui_tx,
    };
    app.refresh_conversations();

    let mut terminal_events = EventStream::new();
    let mut ticker = time::interval(TICK_PERIOD);

    loop {
        terminal.draw(|frame| ui::render(frame, &mut app))?;
        app.after_draw();

        if app.should_exit {
            return Ok(());
        }

        tokio::select! {
            maybe_event = terminal_events.next() => match maybe_event {
                Some(Ok(event)) => app.handle_terminal_event(event),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            },
            Some(event) = event_rx.recv() => app.handle_session_event(event),
            Some(event) = ui_rx.recv() => app.handle_ui_event(event),
            _ = ticker.tick() => app.tick(),
        }
    }
}
