//! Sidebar widget: the conversation list with color tags and unread markers.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::models::Conversation;

/// Sidebar state: owns the conversation list and tracks navigation.
pub struct SidebarState {
    pub conversations: Vec<Conversation>,
    /// Index of the highlighted row.
    pub selected: usize,
    /// Id of the conversation the session is joined to, if any.
    pub active_id: Option<String>,
    /// Whether the initial listing is still in flight.
    pub loading: bool,
}

impl Default for SidebarState {
    fn default() -> Self {
        Self {
            conversations: Vec::new(),
            selected: 0,
            active_id: None,
            loading: true,
        }
    }
}

impl SidebarState {
    /// Replace the list from a listing response.
    pub fn update_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
        self.loading = false;
        self.clamp_selection();
    }

    pub fn selected_conversation(&self) -> Option<&Conversation> {
        self.conversations.get(self.selected)
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.conversations.len() {
            self.selected += 1;
        }
    }

    fn clamp_selection(&mut self) {
        if self.selected >= self.conversations.len() {
            self.selected = self.conversations.len().saturating_sub(1);
        }
    }
}

/// Parse a `#rrggbb` color tag; anything unparseable falls back to gray.
pub fn tag_color(hex: &str) -> Color {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 {
        return Color::Gray;
    }
    match (
        u8::from_str_radix(&hex[0..2], 16),
        u8::from_str_radix(&hex[2..4], 16),
        u8::from_str_radix(&hex[4..6], 16),
    ) {
        (Ok(r), Ok(g), Ok(b)) => Color::Rgb(r, g, b),
        _ => Color::Gray,
    }
}

/// Render the sidebar into the given area.
pub fn render(area: Rect, buf: &mut Buffer, state: &SidebarState, focused: bool) {
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

    let block = Block::default()
        .title(" Conversations ")
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if state.loading && state.conversations.is_empty() {
        let line = Line::from(Span::styled(
            " Loading...",
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(line).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
        return;
    }

    if state.conversations.is_empty() {
        let line = Line::from(Span::styled(
            " (none -- press n)",
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(line).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
        return;
    }

    let height = inner.height as usize;
    let scroll = scroll_offset(state.selected, height, state.conversations.len());

    for (row, idx) in (scroll..state.conversations.len()).take(height).enumerate() {
        let conv = &state.conversations[idx];
        let row_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        render_row(buf, row_area, conv, state, idx == state.selected, focused);
    }
}

/// Keep the selected row visible.
fn scroll_offset(selected: usize, height: usize, total: usize) -> usize {
    if total <= height || selected < height {
        return 0;
    }
    selected
        .saturating_sub(height - 1)
        .min(total.saturating_sub(height))
}

fn render_row(
    buf: &mut Buffer,
    area: Rect,
    conv: &Conversation,
    state: &SidebarState,
    selected: bool,
    pane_focused: bool,
) {
    let width = area.width as usize;
    if width == 0 {
        return;
    }

    let is_active = state.active_id.as_deref() == Some(conv.id.as_str());
    let cursor = if selected && pane_focused {
        "\u{25BA}"
    } else {
        " "
    };

    let name_style = if selected {
        Style::default()
            .fg(Color::White)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else if is_active {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    // cursor + color tag + space + name, truncated to the row width
    let used = 3;
    let max_name = width.saturating_sub(used);
    let name: String = conv.display_name.chars().take(max_name).collect();
    let pad = width.saturating_sub(used + name.chars().count());

    let line = Line::from(vec![
        Span::styled(cursor.to_string(), name_style),
        Span::styled(
            "\u{258C}".to_string(),
            Style::default().fg(tag_color(&conv.color_tag)),
        ),
        Span::styled(" ".to_string(), name_style),
        Span::styled(name, name_style),
        Span::styled(" ".repeat(pad), name_style),
    ]);

    Paragraph::new(line).render(area, buf);
}
