use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::store::SavedCommand;

// ── Single-line input ─────────────────────────────────────────────────

/// Editable single-line buffer with a byte-offset cursor on a char boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    pub fn with_value(value: &str) -> Self {
        TextInput {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// Append text and park the cursor after it.
    pub fn append(&mut self, text: &str) {
        self.value.push_str(text);
        self.cursor = self.value.len();
    }

    /// Apply an editing key. Returns `true` if the key was consumed.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        self.cursor = self.cursor.min(self.value.len());
        let word = modifiers.contains(KeyModifiers::ALT);
        let line = modifiers.contains(KeyModifiers::SUPER);

        match code {
            KeyCode::Left if line => self.cursor = 0,
            KeyCode::Left if word => self.cursor = word_start_before(&self.value, self.cursor),
            KeyCode::Left => self.cursor = self.prev_boundary(),
            KeyCode::Right if line => self.cursor = self.value.len(),
            KeyCode::Right if word => self.cursor = next_word_start(&self.value, self.cursor),
            KeyCode::Right => self.cursor = self.next_boundary(),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.len(),

            KeyCode::Backspace if word => self.delete_back_to(word_start_before(&self.value, self.cursor)),
            KeyCode::Backspace if line => self.delete_back_to(0),
            KeyCode::Char('w') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.delete_back_to(word_start_before(&self.value, self.cursor));
            }
            KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => self.delete_back_to(0),
            KeyCode::Backspace => self.delete_back_to(self.prev_boundary()),
            KeyCode::Delete => {
                let end = self.next_boundary();
                self.value.replace_range(self.cursor..end, "");
            }

            KeyCode::Char(c) if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
                self.value.insert(self.cursor, c);
                self.cursor += c.len_utf8();
            }
            _ => return false,
        }
        true
    }

    /// The buffer with a block cursor drawn at the insertion point.
    pub fn with_cursor(&self) -> String {
        let (before, after) = self.value.split_at(self.cursor.min(self.value.len()));
        format!("{before}\u{2588}{after}")
    }

    fn prev_boundary(&self) -> usize {
        self.value[..self.cursor]
            .chars()
            .next_back()
            .map_or(0, |ch| self.cursor - ch.len_utf8())
    }

    fn next_boundary(&self) -> usize {
        self.value[self.cursor..]
            .chars()
            .next()
            .map_or(self.cursor, |ch| self.cursor + ch.len_utf8())
    }

    fn delete_back_to(&mut self, start: usize) {
        self.value.replace_range(start..self.cursor, "");
        self.cursor = start;
    }
}

/// Byte offset where the word ending at or before `pos` starts.
fn word_start_before(s: &str, pos: usize) -> usize {
    let trimmed = s[..pos].trim_end();
    match trimmed.rfind(char::is_whitespace) {
        Some(idx) => idx + trimmed[idx..].chars().next().map_or(1, char::len_utf8),
        None => 0,
    }
}

/// Byte offset of the first character of the next word after `pos`.
fn next_word_start(s: &str, pos: usize) -> usize {
    let after = &s[pos..];
    let Some(gap) = after.find(char::is_whitespace) else {
        return s.len();
    };
    after[gap..]
        .find(|c: char| !c.is_whitespace())
        .map_or(s.len(), |word| pos + gap + word)
}

// ── Add / Edit form ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormField {
    #[default]
    Name,
    Command,
    Note,
}

impl FormField {
    pub const ORDER: [FormField; 3] = [FormField::Name, FormField::Command, FormField::Note];

    pub fn label(self) -> &'static str {
        match self {
            FormField::Name => "Name",
            FormField::Command => "Cmd",
            FormField::Note => "Note",
        }
    }

    fn next(self) -> Self {
        match self {
            FormField::Name => FormField::Command,
            FormField::Command => FormField::Note,
            FormField::Note => FormField::Name,
        }
    }

    fn prev(self) -> Self {
        match self {
            FormField::Name => FormField::Note,
            FormField::Command => FormField::Name,
            FormField::Note => FormField::Command,
        }
    }
}

/// Trimmed contents of a submitted form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormValues {
    pub name: String,
    pub command_line: String,
    pub note: String,
}

/// The three buffers shared by the Add and Edit flows. Exactly one has focus.
#[derive(Debug, Clone, Default)]
pub struct CommandForm {
    name: TextInput,
    command: TextInput,
    note: TextInput,
    focus: FormField,
}

impl CommandForm {
    pub fn blank() -> Self {
        CommandForm::default()
    }

    pub fn prefilled(command: &SavedCommand) -> Self {
        CommandForm {
            name: TextInput::with_value(&command.name),
            command: TextInput::with_value(&command.command_line),
            note: TextInput::with_value(&command.note),
            focus: FormField::Name,
        }
    }

    pub fn focus(&self) -> FormField {
        self.focus
    }

    pub fn field(&self, field: FormField) -> &TextInput {
        match field {
            FormField::Name => &self.name,
            FormField::Command => &self.command,
            FormField::Note => &self.note,
        }
    }

    fn field_mut(&mut self, field: FormField) -> &mut TextInput {
        match field {
            FormField::Name => &mut self.name,
            FormField::Command => &mut self.command,
            FormField::Note => &mut self.note,
        }
    }

    /// Focus movement (Tab/Down forward, BackTab/Up back, both wrapping) or
    /// editing of the focused buffer.
    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        match code {
            KeyCode::Tab | KeyCode::Down => {
                self.focus = self.focus.next();
                true
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus = self.focus.prev();
                true
            }
            _ => {
                self.field_mut(self.focus).handle_key(code, modifiers)
            }
        }
    }

    pub fn values(&self) -> FormValues {
        FormValues {
            name: self.name.value().trim().to_string(),
            command_line: self.command.value().trim().to_string(),
            note: self.note.value().trim().to_string(),
        }
    }
}

// ── Rendering helpers ─────────────────────────────────────────────────

/// Clear and frame a centred `width`×`height` panel; returns the area inside the border.
pub fn render_modal(
    frame: &mut Frame,
    title: &str,
    border_style: Style,
    width: u16,
    height: u16,
) -> Rect {
    let area = frame.area();
    let w = width.min(area.width.saturating_sub(4));
    let h = height.min(area.height.saturating_sub(2));
    let panel = Rect::new(
        area.x + (area.width.saturating_sub(w)) / 2,
        area.y + (area.height.saturating_sub(h)) / 2,
        w,
        h,
    );

    frame.render_widget(Clear, panel);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(panel);
    frame.render_widget(block, panel);
    inner
}

/// One line of `key description` pairs.
pub fn hint_line<'a>(hints: &[(&'a str, &'a str)], key_style: Style, desc_style: Style) -> Line<'a> {
    let spans: Vec<Span<'a>> = hints
        .iter()
        .flat_map(|(key, desc)| {
            [
                Span::styled(*key, key_style),
                Span::styled(*desc, desc_style),
            ]
        })
        .collect();
    Line::from(spans)
}

pub fn render_hints(
    frame: &mut Frame,
    area: Rect,
    hints: &[(&str, &str)],
    key_style: Style,
    desc_style: Style,
) {
    frame.render_widget(Paragraph::new(hint_line(hints, key_style, desc_style)), area);
}

// ── Tests ─────────────────────────────────────────────────────────────
