//! Messages pane: renders the merged timeline with delivery glyphs, the
//! unread divider, and the typing indicator line.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::models::{ContentType, Message, MessageStatus};
use crate::sync::{ChatSession, ScrollCommand};

/// Delivery glyph shown next to the local user's own messages.
fn status_glyph(status: MessageStatus) -> (&'static str, Color) {
    match status {
        MessageStatus::Pending => ("\u{00B7}", Color::DarkGray),
        MessageStatus::Sent => ("\u{2713}", Color::Gray),
        MessageStatus::Received => ("\u{2713}\u{2713}", Color::Gray),
        MessageStatus::Read => ("\u{2713}\u{2713}", Color::Cyan),
    }
}

/// View state for the messages pane.
///
/// The pane reports its geometry (`overflows`, `at_bottom`) back to the
/// session after every frame; the anchoring policy lives in the session, this
/// struct only executes its scroll commands.
#[derive(Default)]
pub struct MessagesState {
    /// Header text (conversation display name).
    pub header: String,
    /// Vertical scroll offset in rendered lines.
    scroll: usize,
    /// Command from the anchoring policy, applied on the next frame.
    pending: Option<ScrollCommand>,
    /// Whether the rendered content exceeded the viewport last frame.
    pub overflows: bool,
    /// Whether the last line was visible last frame.
    pub at_bottom: bool,
}

impl MessagesState {
    /// Reset for a newly activated conversation.
    pub fn reset(&mut self, header: String) {
        self.header = header;
        self.scroll = 0;
        self.pending = None;
        self.overflows = false;
        self.at_bottom = true;
    }

    /// Queue a scroll command from the anchoring policy.
    pub fn queue_scroll(&mut self, cmd: ScrollCommand) {
        self.pending = Some(cmd);
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
        self.at_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: usize) {
        // Clamped against the real maximum during render.
        self.scroll = self.scroll.saturating_add(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.queue_scroll(ScrollCommand::JumpToEnd);
    }
}

/// Render the messages pane and update the state's geometry report.
pub fn render(
    area: Rect,
    buf: &mut Buffer,
    state: &mut MessagesState,
    session: &ChatSession,
    focused: bool,
) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let border_type = if focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    if session.anchor().unread_affordance() && !state.at_bottom {
        block = block.title_bottom(
            Line::from(Span::styled(
                " \u{2193} new messages ",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ))
            .right_aligned(),
        );
    }

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let header_area = Rect::new(inner.x, inner.y, inner.width, 1);
    render_header(header_area, buf, state, session);

    let typing = typing_line(session);
    let typing_rows = if typing.is_some() { 1 } else { 0 };

    let body = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1 + typing_rows),
    );

    if let Some(line) = typing {
        let typing_area = Rect::new(
            inner.x,
            inner.y + inner.height.saturating_sub(1),
            inner.width,
            1,
        );
        Paragraph::new(line).render(typing_area, buf);
    }

    if body.height == 0 {
        return;
    }

    let (lines, starts) = build_timeline_lines(session, body.width as usize);
    let total = lines.len();
    let visible = body.height as usize;
    let max_scroll = total.saturating_sub(visible);

    match state.pending.take() {
        Some(ScrollCommand::JumpToEnd) | Some(ScrollCommand::SmoothToEnd) => {
            state.scroll = max_scroll;
        }
        Some(ScrollCommand::JumpToFirstUnread(idx)) => {
            state.scroll = starts.get(idx).copied().unwrap_or(max_scroll).min(max_scroll);
        }
        None => {
            if state.at_bottom {
                // Stick to the bottom across appends and resizes.
                state.scroll = max_scroll;
            } else {
                state.scroll = state.scroll.min(max_scroll);
            }
        }
    }

    state.overflows = total > visible;
    state.at_bottom = state.scroll >= max_scroll;

    for (row, line_idx) in (state.scroll..total).take(visible).enumerate() {
        let line_area = Rect::new(body.x, body.y + row as u16, body.width, 1);
        Paragraph::new(lines[line_idx].clone()).render(line_area, buf);
    }
}

fn render_header(area: Rect, buf: &mut Buffer, state: &MessagesState, session: &ChatSession) {
    let (dot, dot_color) = if session.presence().any_peer_online(session.local_user()) {
        ("*", Color::Green)
    } else {
        ("o", Color::DarkGray)
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", state.header),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("{} ", dot), Style::default().fg(dot_color)),
    ]);
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn typing_line(session: &ChatSession) -> Option<Line<'static>> {
    let peers = session.presence().typing_peers();
    if peers.is_empty() {
        return None;
    }
    let text = if peers.len() == 1 {
        format!(" {} is typing...", peers[0])
    } else {
        format!(" {} are typing...", peers.join(", "))
    };
    Some(Line::from(Span::styled(
        text,
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )))
}

/// Flatten the timeline into display lines. Returns the lines and the
/// starting line index of each message (for unread anchoring).
fn build_timeline_lines(
    session: &ChatSession,
    width: usize,
) -> (Vec<Line<'static>>, Vec<usize>) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut starts: Vec<usize> = Vec::new();

    let local_user = session.local_user();
    let divider_at = if session.anchor().unread_affordance() {
        session.timeline().first_unread(local_user)
    } else {
        None
    };

    for (idx, msg) in session.timeline().messages().iter().enumerate() {
        // The divider belongs to the message it precedes, so an unread jump
        // lands with the divider visible.
        starts.push(lines.len());
        if divider_at == Some(idx) {
            lines.push(unread_divider(width));
        }
        push_message_lines(&mut lines, msg, local_user, width);
    }

    (lines, starts)
}

fn unread_divider(width: usize) -> Line<'static> {
    let label = " new messages ";
    let dashes = width.saturating_sub(label.len()) / 2;
    let text = format!(
        "{}{}{}",
        "-".repeat(dashes),
        label,
        "-".repeat(width.saturating_sub(dashes + label.len()))
    );
    Line::from(Span::styled(
        text,
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::DIM),
    ))
}

fn push_message_lines(
    lines: &mut Vec<Line<'static>>,
    msg: &Message,
    local_user: &str,
    width: usize,
) {
    let is_own = msg.sender_id == local_user;
    let time = msg.timestamp.format("%H:%M").to_string();

    let sender_style = if is_own {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    };

    let mut meta: Vec<Span<'static>> = vec![
        Span::styled(format!("{} ", time), Style::default().fg(Color::DarkGray)),
        Span::styled(msg.sender_id.clone(), sender_style),
    ];
    if is_own {
        let (glyph, color) = status_glyph(msg.status);
        meta.push(Span::styled(
            format!(" {}", glyph),
            Style::default().fg(color),
        ));
    }
    lines.push(Line::from(meta));

    let body = match msg.content_type {
        ContentType::Text => msg.content.clone(),
        ContentType::Image => format!("[image] {}", msg.content),
        ContentType::Audio => format!("[audio] {}", msg.content),
    };

    let indent = "  ";
    let body_width = width.saturating_sub(indent.len()).max(1);
    for chunk in wrap_text(&body, body_width) {
        lines.push(Line::from(vec![
            Span::raw(indent.to_string()),
            Span::styled(chunk, Style::default().fg(Color::Gray)),
        ]));
    }
}

/// Word-wrap: split by newlines, then break long lines at word boundaries.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let mut result = Vec::new();
    for line in text.lines() {
        if line.chars().count() <= max_width {
            result.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            if current.is_empty() {
                current = word.to_string();
            } else if current.chars().count() + 1 + word.chars().count() <= max_width {
                current.push(' ');
                current.push_str(word);
            } else {
                result.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }
    if result.is_empty() {
        result.push(String::new());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_width() {
        let wrapped = wrap_text("one two three four five", 9);
        assert_eq!(wrapped, vec!["one two", "three", "four five"]);
    }

    #[test]
    fn test_wrap_preserves_explicit_newlines() {
        let wrapped = wrap_text("first\nsecond", 20);
        assert_eq!(wrapped, vec!["first", "second"]);
    }

    #[test]
    fn test_glyph_per_status() {
        assert_eq!(status_glyph(MessageStatus::Pending).0, "\u{00B7}");
        assert_eq!(status_glyph(MessageStatus::Sent).0, "\u{2713}");
        assert_eq!(status_glyph(MessageStatus::Received).0, "\u{2713}\u{2713}");
        assert_eq!(status_glyph(MessageStatus::Read).0, "\u{2713}\u{2713}");
    }
}
