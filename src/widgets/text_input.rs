use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};
use tui_textarea::{CursorMove, Input, Key, TextArea};

use crate::cache::CacheManager;

use super::text_input_common::{add_to_history, load_history_impl, save_history_impl};

/// Event emitted by TextInput widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextInputEvent {
    None,
    Submit,
    Cancel,
    HistoryChanged,
}

/// Single-line text input wrapping tui-textarea with optional persistent
/// history (Up/Down navigates, consecutive duplicates are collapsed).
pub struct TextInput {
    textarea: TextArea<'static>,
    value: String,
    cursor: usize,
    /// None = no history, Some(id) = persist under this cache file ID
    history_id: Option<String>,
    history: Vec<String>,
    history_index: Option<usize>,
    history_temp: Option<String>,
    history_limit: usize,
    history_loaded: bool,
    /// When true, echo bullets instead of the typed text (passwords)
    masked: bool,
    text_color: Option<Color>,
    background_color: Option<Color>,
    focused: bool,
}

impl TextInput {
    pub fn new() -> Self {
        let mut textarea = TextArea::default();
        textarea.set_cursor_line_style(Style::default());

        Self {
            textarea,
            value: String::new(),
            cursor: 0,
            history_id: None,
            history: Vec::new(),
            history_index: None,
            history_temp: None,
            history_limit: 1000,
            history_loaded: false,
            masked: false,
            text_color: None,
            background_color: None,
            focused: false,
        }
    }

    pub fn with_text_color(mut self, color: Color) -> Self {
        self.text_color = Some(color);
        self.apply_colors_to_textarea();
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self.apply_colors_to_textarea();
        self
    }

    /// Enable history with the given ID
    pub fn with_history(mut self, history_id: String) -> Self {
        self.history_id = Some(history_id);
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Render bullets instead of the typed characters
    pub fn with_masking(mut self) -> Self {
        self.masked = true;
        self.textarea.set_mask_char('\u{2022}');
        self
    }

    fn apply_colors_to_textarea(&mut self) {
        let mut style = Style::default();
        if let Some(text_color) = self.text_color {
            style = style.fg(text_color);
        }
        if let Some(bg_color) = self.background_color {
            style = style.bg(bg_color);
        }
        self.textarea.set_style(style);
        self.textarea.set_cursor_line_style(Style::default());
    }

    fn sync_from_textarea(&mut self) {
        self.value = self.textarea.lines().first().cloned().unwrap_or_default();
        self.cursor = self.textarea.cursor().1;
    }

    fn sync_to_textarea(&mut self) {
        let single_line = self.value.replace(['\n', '\r'], " ");
        self.textarea = TextArea::new(vec![single_line]);
        if self.masked {
            self.textarea.set_mask_char('\u{2022}');
        }
        self.apply_colors_to_textarea();
        // Recreating the TextArea resets the cursor style
        let was_focused = self.focused;
        self.focused = !was_focused;
        self.set_focused(was_focused);
        self.textarea.move_cursor(CursorMove::Jump(
            0,
            self.cursor.min(u16::MAX as usize) as u16,
        ));
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
        if focused {
            self.textarea
                .set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));
        } else {
            // Matching the text style hides the cursor
            let textarea_style = self.textarea.style();
            self.textarea.set_cursor_style(textarea_style);
        }
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: String) {
        self.cursor = value.chars().count();
        self.value = value;
        self.sync_to_textarea();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
        self.history_index = None;
        self.history_temp = None;
        self.sync_to_textarea();
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Load history from cache (lazy loading)
    pub fn load_history(&mut self, cache: &CacheManager) -> Result<()> {
        if self.history_loaded {
            return Ok(());
        }
        if let Some(ref history_id) = self.history_id {
            self.history = load_history_impl(cache, history_id)?;
            self.history_loaded = true;
        }
        Ok(())
    }

    /// Save current value to history
    pub fn save_to_history(&mut self, cache: &CacheManager) -> Result<()> {
        if let Some(history_id) = self.history_id.clone() {
            self.sync_from_textarea();
            if !self.value.is_empty() {
                add_to_history(&mut self.history, self.value.clone());
                save_history_impl(cache, &history_id, &self.history, self.history_limit)?;
            }
        }
        Ok(())
    }

    fn navigate_history_up(&mut self, cache: Option<&CacheManager>) {
        if self.history_id.is_none() {
            return;
        }

        if !self.history_loaded {
            if let Some(cache) = cache {
                if let Err(e) = self.load_history(cache) {
                    eprintln!("Warning: Could not load history: {}", e);
                    return;
                }
            } else {
                return;
            }
        }

        if self.history.is_empty() {
            return;
        }

        if self.history_index.is_none() {
            self.sync_from_textarea();
            self.history_temp = Some(self.value.clone());
        }

        let new_index = match self.history_index {
            Some(idx) if idx > 0 => idx - 1,
            Some(idx) => idx,
            None => self.history.len() - 1,
        };

        self.history_index = Some(new_index);
        if let Some(entry) = self.history.get(new_index).cloned() {
            self.set_value(entry);
            self.history_index = Some(new_index);
        }
    }

    fn navigate_history_down(&mut self) {
        let Some(current_idx) = self.history_index else {
            return;
        };

        if current_idx >= self.history.len().saturating_sub(1) {
            if let Some(temp) = self.history_temp.take() {
                self.set_value(temp);
            }
            self.history_index = None;
            self.history_temp = None;
        } else {
            let new_index = current_idx + 1;
            if let Some(entry) = self.history.get(new_index).cloned() {
                self.set_value(entry);
            }
            self.history_index = Some(new_index);
        }
    }

    /// Handle a key event
    pub fn handle_key(&mut self, event: &KeyEvent, cache: Option<&CacheManager>) -> TextInputEvent {
        let input = key_event_to_input(event);

        match event.code {
            KeyCode::Enter => {
                if let Some(cache) = cache {
                    let _ = self.save_to_history(cache);
                }
                return TextInputEvent::Submit;
            }
            KeyCode::Esc => {
                return TextInputEvent::Cancel;
            }
            KeyCode::Up if self.history_id.is_some() => {
                self.navigate_history_up(cache);
                return TextInputEvent::HistoryChanged;
            }
            KeyCode::Down if self.history_id.is_some() => {
                self.navigate_history_down();
                return TextInputEvent::HistoryChanged;
            }
            _ => {
                if matches!(input.key, Key::Char('\n') | Key::Char('\r')) {
                    return TextInputEvent::None;
                }
                self.textarea.input(input);
                self.sync_from_textarea();
                // Typing leaves history navigation
                if self.history_index.is_some() {
                    self.history_index = None;
                    self.history_temp = None;
                }
            }
        }
        TextInputEvent::None
    }
}

/// Convert crossterm KeyEvent to tui_textarea::Input
fn key_event_to_input(event: &KeyEvent) -> Input {
    let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    let alt = event.modifiers.contains(KeyModifiers::ALT);
    let shift = event.modifiers.contains(KeyModifiers::SHIFT);

    let key = match event.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter => Key::Enter,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Tab | KeyCode::BackTab => Key::Tab,
        KeyCode::Delete => Key::Delete,
        KeyCode::Esc => Key::Esc,
        _ => Key::Null,
    };

    Input {
        key,
        ctrl,
        alt,
        shift,
    }
}

impl Default for TextInput {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for &TextInput {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        self.textarea.render(area, buf);

        // tui-textarea underlines the cursor line; strip that for single-line use
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                let cell = &mut buf[(x, y)];
                let mut style = cell.style();
                style = style.remove_modifier(Modifier::UNDERLINED);
                cell.set_style(style);
            }
        }
    }
}
