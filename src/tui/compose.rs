//! Compose box: single-line text input for the active conversation.

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};

/// Height of the compose box: borders plus one input line.
pub const COMPOSE_HEIGHT: u16 = 3;

/// State for the compose box.
#[derive(Default)]
pub struct ComposeState {
    /// Current input text.
    input: String,
    /// Cursor position as a character offset into `input`.
    cursor: usize,
}

impl ComposeState {
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Insert a character at the cursor.
    pub fn insert_char(&mut self, c: char) {
        let byte = self.char_to_byte(self.cursor);
        self.input.insert(byte, c);
        self.cursor += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            let end = self.char_to_byte(self.cursor);
            let start = self.char_to_byte(self.cursor - 1);
            self.input.drain(start..end);
            self.cursor -= 1;
        }
    }

    /// Delete the character at the cursor.
    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let start = self.char_to_byte(self.cursor);
            let end = self.char_to_byte(self.cursor + 1);
            self.input.drain(start..end);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.input.chars().count();
    }

    /// Clear all input (Ctrl+U).
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    /// Take the trimmed input for sending, clearing the box. Returns `None`
    /// for empty or whitespace-only input.
    pub fn take(&mut self) -> Option<String> {
        let text = self.input.trim().to_string();
        self.clear();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

/// Render the compose box. Uses `Frame` so the terminal cursor can be placed
/// inside the input when focused.
pub fn render(
    area: Rect,
    frame: &mut Frame,
    state: &ComposeState,
    conversation_name: &str,
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

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let input_area = Rect::new(inner.x, inner.y, inner.width, 1);
    let width = input_area.width as usize;

    if state.input.is_empty() {
        let placeholder = if conversation_name.is_empty() {
            " Select a conversation first".to_string()
        } else {
            format!(" Message {}...", conversation_name)
        };
        let truncated: String = placeholder.chars().take(width).collect();
        Paragraph::new(Line::from(Span::styled(
            truncated,
            Style::default().fg(Color::DarkGray),
        )))
        .render(input_area, frame.buffer_mut());
    } else {
        let (visible, cursor_col) = visible_window(&state.input, state.cursor, width);
        Paragraph::new(Line::from(Span::styled(
            format!(" {}", visible),
            Style::default().fg(Color::White),
        )))
        .render(input_area, frame.buffer_mut());

        if focused {
            frame.set_cursor_position((input_area.x + 1 + cursor_col as u16, input_area.y));
        }
    }

    if focused && state.input.is_empty() {
        frame.set_cursor_position((input_area.x + 1, input_area.y));
    }
}

/// Horizontal scrolling window: the slice of input to show and the cursor
/// column within it (the " " prefix takes one column).
fn visible_window(input: &str, cursor: usize, width: usize) -> (String, usize) {
    let avail = width.saturating_sub(1);
    if avail == 0 {
        return (String::new(), 0);
    }

    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= avail {
        return (input.to_string(), cursor);
    }

    let start = if cursor < avail { 0 } else { cursor - avail + 1 };
    let end = (start + avail).min(chars.len());
    let visible: String = chars[start..end].iter().collect();
    (visible, cursor - start)
}
