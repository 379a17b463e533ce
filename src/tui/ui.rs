//! Frame layout and chrome rendering for the TUI

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
    Frame,
};

use super::app::{App, Pane};
use super::compose;
use super::messages;
use super::sidebar;

/// Connection indicator symbol and color.
fn connection_indicator(connected: bool) -> (&'static str, Color) {
    if connected {
        ("*", Color::Green)
    } else {
        ("o", Color::Red)
    }
}

/// Main render function.
pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    let [sidebar_area, content_area] =
        Layout::horizontal([Constraint::Length(28), Constraint::Fill(1)]).areas(main_area);

    sidebar::render(
        sidebar_area,
        frame.buffer_mut(),
        &app.sidebar,
        app.active_pane == Pane::Sidebar,
    );

    let [messages_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(content_area);

    messages::render(
        messages_area,
        frame.buffer_mut(),
        &mut app.messages,
        &app.session,
        app.active_pane == Pane::Messages,
    );

    compose::render(
        compose_area,
        frame,
        &app.compose,
        &app.messages.header,
        app.active_pane == Pane::Compose,
    );

    render_status(status_area, frame.buffer_mut(), app);
}

/// Header bar: app title left, connection state and user id right.
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = Span::styled(
        " Relay",
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let (symbol, color) = connection_indicator(app.session.is_connected());
    let connection = Span::styled(format!(" {} ", symbol), Style::default().fg(color));
    let user = Span::styled(
        format!("{} ", app.session.local_user()),
        Style::default().fg(Color::Cyan),
    );

    let left_width = " Relay".len();
    let right_width = 3 + app.session.local_user().len() + 1;
    let padding_width = area.width.saturating_sub((left_width + right_width) as u16) as usize;
    let padding = Span::raw(" ".repeat(padding_width));

    let header = Paragraph::new(Line::from(vec![title, padding, connection, user]))
        .style(Style::default().bg(Color::DarkGray));
    header.render(area, buf);
}

/// Status bar: transient message if present, otherwise connection,
/// conversation, pane, and key hints.
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    if let Some((msg, is_error)) = app.status_line() {
        let style = if is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        Paragraph::new(Line::from(Span::styled(format!(" {} ", msg), style)))
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    let (symbol, color) = connection_indicator(app.session.is_connected());
    let state_label = if app.session.is_connected() {
        "connected"
    } else {
        "reconnecting"
    };
    let connection = Span::styled(
        format!(" {} {} ", symbol, state_label),
        Style::default().fg(color),
    );

    let sep_style = Style::default().fg(Color::DarkGray);

    let conversation = if app.messages.header.is_empty() {
        "(none)".to_string()
    } else {
        app.messages.header.clone()
    };
    let conversation = Span::styled(conversation, Style::default().fg(Color::Yellow));

    let pane = Span::styled(
        format!("Tab: {}", app.active_pane.as_str()),
        Style::default().fg(Color::Cyan),
    );

    let hints = Span::styled("n: new | r: refresh | q: quit", Style::default().fg(Color::Gray));

    let line = Line::from(vec![
        connection,
        Span::styled(" | ", sep_style),
        conversation,
        Span::styled(" | ", sep_style),
        pane,
        Span::styled(" | ", sep_style),
        hints,
    ]);

    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
