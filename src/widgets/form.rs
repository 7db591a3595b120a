use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Paragraph, Widget},
};
use serde_json::json;

use crate::record::Record;

use super::text_input::{TextInput, TextInputEvent};

pub const EVENT_NAMES: &[&str] = &["NAN", "Discount", "Clearance", "Festival Sale"];
pub const EVENT_TYPES: &[&str] = &["NAN", "Online", "In-Store", "Flash Sale"];
const SNAP_OPTIONS: &[&str] = &["No", "Yes"];

/// A fixed-choice field cycled with Left/Right
struct SelectField {
    options: &'static [&'static str],
    idx: usize,
}

impl SelectField {
    fn new(options: &'static [&'static str]) -> Self {
        Self { options, idx: 0 }
    }

    fn next(&mut self) {
        self.idx = (self.idx + 1) % self.options.len();
    }

    fn previous(&mut self) {
        self.idx = (self.idx + self.options.len() - 1) % self.options.len();
    }

    fn value(&self) -> &'static str {
        self.options[self.idx]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormEvent {
    None,
    /// Enter on the submit row with a valid form
    Submit,
    Cancel,
}

/// Fields in focus order. Submit is the trailing pseudo-field.
const FIELD_COUNT: usize = 9;
const SUBMIT_IDX: usize = FIELD_COUNT - 1;

/// Entry form for one feature-engineered item record, mirroring the schema
/// the backend stores: identifiers, SNAP participation, price, and the two
/// promotional event slots.
pub struct ItemForm {
    item_id: TextInput,
    store_id: TextInput,
    sell_price: TextInput,
    snap_active: SelectField,
    event_name_1: SelectField,
    event_type_1: SelectField,
    event_name_2: SelectField,
    event_type_2: SelectField,
    focus: usize,
    pub error: Option<String>,
    pub submitting: bool,
}

impl ItemForm {
    pub fn new(text_color: Color) -> Self {
        let mut form = Self {
            item_id: TextInput::new().with_text_color(text_color),
            store_id: TextInput::new().with_text_color(text_color),
            sell_price: TextInput::new().with_text_color(text_color),
            snap_active: SelectField::new(SNAP_OPTIONS),
            event_name_1: SelectField::new(EVENT_NAMES),
            event_type_1: SelectField::new(EVENT_TYPES),
            event_name_2: SelectField::new(EVENT_NAMES),
            event_type_2: SelectField::new(EVENT_TYPES),
            focus: 0,
            error: None,
            submitting: false,
        };
        form.sync_focus();
        form
    }

    pub fn clear(&mut self) {
        self.item_id.clear();
        self.store_id.clear();
        self.sell_price.clear();
        self.snap_active.idx = 0;
        self.event_name_1.idx = 0;
        self.event_type_1.idx = 0;
        self.event_name_2.idx = 0;
        self.event_type_2.idx = 0;
        self.focus = 0;
        self.error = None;
        self.sync_focus();
    }

    fn sync_focus(&mut self) {
        self.item_id.set_focused(self.focus == 0);
        self.store_id.set_focused(self.focus == 1);
        self.sell_price.set_focused(self.focus == 3);
    }

    fn focus_next(&mut self) {
        self.focus = (self.focus + 1) % FIELD_COUNT;
        self.sync_focus();
    }

    fn focus_previous(&mut self) {
        self.focus = (self.focus + FIELD_COUNT - 1) % FIELD_COUNT;
        self.sync_focus();
    }

    fn text_field_mut(&mut self) -> Option<&mut TextInput> {
        match self.focus {
            0 => Some(&mut self.item_id),
            1 => Some(&mut self.store_id),
            3 => Some(&mut self.sell_price),
            _ => None,
        }
    }

    fn select_field_mut(&mut self) -> Option<&mut SelectField> {
        match self.focus {
            2 => Some(&mut self.snap_active),
            4 => Some(&mut self.event_name_1),
            5 => Some(&mut self.event_type_1),
            6 => Some(&mut self.event_name_2),
            7 => Some(&mut self.event_type_2),
            _ => None,
        }
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> FormEvent {
        if self.submitting {
            return FormEvent::None;
        }

        match event.code {
            KeyCode::Esc => return FormEvent::Cancel,
            KeyCode::Tab | KeyCode::Down => {
                self.focus_next();
                return FormEvent::None;
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.focus_previous();
                return FormEvent::None;
            }
            _ => {}
        }

        if let Some(select) = self.select_field_mut() {
            match event.code {
                KeyCode::Left => select.previous(),
                KeyCode::Right | KeyCode::Char(' ') => select.next(),
                KeyCode::Enter => self.focus_next(),
                _ => {}
            }
            return FormEvent::None;
        }

        if self.focus == SUBMIT_IDX {
            if event.code == KeyCode::Enter {
                match self.validate() {
                    Ok(()) => {
                        self.error = None;
                        return FormEvent::Submit;
                    }
                    Err(message) => self.error = Some(message),
                }
            }
            return FormEvent::None;
        }

        if let Some(input) = self.text_field_mut() {
            match input.handle_key(event, None) {
                TextInputEvent::Submit => self.focus_next(),
                TextInputEvent::Cancel => return FormEvent::Cancel,
                _ => {}
            }
        }
        FormEvent::None
    }

    fn validate(&self) -> Result<(), String> {
        if self.item_id.value().trim().is_empty() {
            return Err("Item ID is required".to_string());
        }
        if self.store_id.value().trim().is_empty() {
            return Err("Store ID is required".to_string());
        }
        let price = self
            .sell_price
            .value()
            .trim()
            .parse::<f64>()
            .map_err(|_| "Sell price must be a number".to_string())?;
        if price < 0.0 {
            return Err("Sell price must not be negative".to_string());
        }
        Ok(())
    }

    /// Build the record the backend expects. Call only after validation.
    pub fn to_record(&self) -> Record {
        let price = self.sell_price.value().trim().parse::<f64>().unwrap_or(0.0);
        let mut record = Record::new();
        record.insert("item_id".to_string(), json!(self.item_id.value().trim()));
        record.insert("store_id".to_string(), json!(self.store_id.value().trim()));
        record.insert(
            "snap_active".to_string(),
            json!(self.snap_active.idx as u64),
        );
        record.insert("sell_price".to_string(), json!(price));
        record.insert("event_name_1".to_string(), json!(self.event_name_1.value()));
        record.insert("event_type_1".to_string(), json!(self.event_type_1.value()));
        record.insert("event_name_2".to_string(), json!(self.event_name_2.value()));
        record.insert("event_type_2".to_string(), json!(self.event_type_2.value()));
        record
    }
}

/// Colors the form pulls from the theme
pub struct ItemFormColors {
    pub border: Color,
    pub label: Color,
    pub focus: Color,
    pub error: Color,
    pub dimmed: Color,
}

pub struct ItemFormWidget<'a> {
    pub form: &'a ItemForm,
    pub colors: ItemFormColors,
}

impl ItemFormWidget<'_> {
    fn label_style(&self, idx: usize) -> Style {
        if self.form.focus == idx {
            Style::default()
                .fg(self.colors.focus)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.colors.label)
        }
    }

    fn render_select(
        &self,
        idx: usize,
        label: &str,
        select: &SelectField,
        area: Rect,
        buf: &mut Buffer,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(16), Constraint::Fill(1)])
            .split(area);
        Paragraph::new(label)
            .style(self.label_style(idx))
            .render(chunks[0], buf);
        let marker = if self.form.focus == idx {
            format!("< {} >", select.value())
        } else {
            select.value().to_string()
        };
        Paragraph::new(marker)
            .style(self.label_style(idx))
            .render(chunks[1], buf);
    }

    fn render_text(
        &self,
        idx: usize,
        label: &str,
        input: &TextInput,
        area: Rect,
        buf: &mut Buffer,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(16), Constraint::Fill(1)])
            .split(area);
        Paragraph::new(label)
            .style(self.label_style(idx))
            .render(chunks[0], buf);
        input.render(chunks[1], buf);
    }
}

impl Widget for &ItemFormWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.colors.border))
            .title("New Item");
        let inner = block.inner(area);
        block.render(area, buf);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // item id
                Constraint::Length(1), // store id
                Constraint::Length(1), // snap
                Constraint::Length(1), // price
                Constraint::Length(1), // event name 1
                Constraint::Length(1), // event type 1
                Constraint::Length(1), // event name 2
                Constraint::Length(1), // event type 2
                Constraint::Length(1), // spacer
                Constraint::Length(1), // submit
                Constraint::Length(1), // error / status
                Constraint::Fill(1),
            ])
            .split(inner);

        self.render_text(0, "Item ID", &self.form.item_id, rows[0], buf);
        self.render_text(1, "Store ID", &self.form.store_id, rows[1], buf);
        self.render_select(2, "SNAP Active", &self.form.snap_active, rows[2], buf);
        self.render_text(3, "Sell Price", &self.form.sell_price, rows[3], buf);
        self.render_select(4, "Event Name 1", &self.form.event_name_1, rows[4], buf);
        self.render_select(5, "Event Type 1", &self.form.event_type_1, rows[5], buf);
        self.render_select(6, "Event Name 2", &self.form.event_name_2, rows[6], buf);
        self.render_select(7, "Event Type 2", &self.form.event_type_2, rows[7], buf);

        let submit_label = if self.form.submitting {
            "[ Submitting... ]"
        } else {
            "[ Submit ]"
        };
        Paragraph::new(submit_label)
            .style(self.label_style(SUBMIT_IDX))
            .render(rows[9], buf);

        if let Some(ref error) = self.form.error {
            Paragraph::new(error.as_str())
                .style(Style::default().fg(self.colors.error))
                .render(rows[10], buf);
        } else {
            Paragraph::new("Tab/Arrows move, Enter submits, Esc returns")
                .style(Style::default().fg(self.colors.dimmed))
                .render(rows[10], buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn type_text(form: &mut ItemForm, text: &str) {
        for c in text.chars() {
            form.handle_key(&key(KeyCode::Char(c)));
        }
    }

    fn fill_valid(form: &mut ItemForm) {
        type_text(form, "FOODS_3_090");
        form.handle_key(&key(KeyCode::Tab));
        type_text(form, "CA_3");
        // snap, price
        form.handle_key(&key(KeyCode::Tab));
        form.handle_key(&key(KeyCode::Right)); // snap -> Yes
        form.handle_key(&key(KeyCode::Tab));
        type_text(form, "4.98");
    }

    #[test]
    fn test_submit_requires_valid_fields() {
        let mut form = ItemForm::new(Color::White);
        form.focus = SUBMIT_IDX;
        assert_eq!(form.handle_key(&key(KeyCode::Enter)), FormEvent::None);
        assert_eq!(form.error.as_deref(), Some("Item ID is required"));
    }

    #[test]
    fn test_valid_form_builds_record() {
        let mut form = ItemForm::new(Color::White);
        fill_valid(&mut form);
        form.focus = SUBMIT_IDX;
        assert_eq!(form.handle_key(&key(KeyCode::Enter)), FormEvent::Submit);

        let record = form.to_record();
        assert_eq!(record["item_id"], json!("FOODS_3_090"));
        assert_eq!(record["store_id"], json!("CA_3"));
        assert_eq!(record["snap_active"], json!(1));
        assert_eq!(record["sell_price"], json!(4.98));
        assert_eq!(record["event_name_1"], json!("NAN"));
        let keys: Vec<&String> = record.keys().collect();
        assert_eq!(keys[0], "item_id");
        assert_eq!(keys[3], "sell_price");
    }

    #[test]
    fn test_price_must_be_numeric() {
        let mut form = ItemForm::new(Color::White);
        fill_valid(&mut form);
        form.focus = 3;
        form.sync_focus();
        type_text(&mut form, "x");
        form.focus = SUBMIT_IDX;
        assert_eq!(form.handle_key(&key(KeyCode::Enter)), FormEvent::None);
        assert_eq!(form.error.as_deref(), Some("Sell price must be a number"));
    }

    #[test]
    fn test_select_cycles_and_wraps() {
        let mut select = SelectField::new(EVENT_NAMES);
        assert_eq!(select.value(), "NAN");
        select.previous();
        assert_eq!(select.value(), "Festival Sale");
        select.next();
        assert_eq!(select.value(), "NAN");
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut form = ItemForm::new(Color::White);
        fill_valid(&mut form);
        form.error = Some("boom".to_string());
        form.clear();
        assert_eq!(form.to_record()["item_id"], json!(""));
        assert_eq!(form.to_record()["snap_active"], json!(0));
        assert!(form.error.is_none());
        assert_eq!(form.focus, 0);
    }
}
