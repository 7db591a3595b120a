use ratatui::widgets::ListState;

use crate::record::{value_text, Record};

/// One per-field equality constraint. The string form of the record's value
/// must equal `value` exactly; an empty value imposes no restriction.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

/// The active filter: a free-text query matched case-insensitively against
/// every field, plus any number of equality constraints. All active
/// constraints must hold at once.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    pub query: String,
    pub fields: Vec<FieldFilter>,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        !self.query.is_empty() || self.fields.iter().any(|f| !f.value.is_empty())
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.fields.clear();
    }

    /// Whether a record passes every active constraint.
    pub fn matches(&self, record: &Record) -> bool {
        if !self.query.is_empty() {
            let needle = self.query.to_lowercase();
            let hit = record
                .values()
                .any(|v| value_text(v).to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        self.fields.iter().all(|f| {
            if f.value.is_empty() {
                return true;
            }
            let text = record.get(&f.field).map(value_text).unwrap_or_default();
            text == f.value
        })
    }

    /// The visible subset, in input order. Pure: never mutates the rows.
    pub fn apply<'a>(&self, rows: &'a [Record]) -> Vec<&'a Record> {
        rows.iter().filter(|r| self.matches(r)).collect()
    }
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum FilterFocus {
    #[default]
    Field,
    Value,
    Add,
    Statements,
    Clear,
    Confirm,
}

/// UI state for the equality-filter modal: pick a column, type the required
/// value, add it to the statement list.
#[derive(Default)]
pub struct FilterModal {
    pub active: bool,
    pub statements: Vec<FieldFilter>,
    pub available_columns: Vec<String>,

    pub new_field_idx: usize,
    pub new_value: String,

    pub focus: FilterFocus,
    pub list_state: ListState,
}

impl FilterModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, columns: Vec<String>, current: &[FieldFilter]) {
        self.active = true;
        self.available_columns = columns;
        self.statements = current.to_vec();
        self.new_field_idx = 0;
        self.new_value.clear();
        self.focus = FilterFocus::Field;
        self.list_state = ListState::default();
    }

    pub fn close(&mut self) {
        self.active = false;
    }

    pub fn next_field(&mut self) {
        if !self.available_columns.is_empty() {
            self.new_field_idx = (self.new_field_idx + 1) % self.available_columns.len();
        }
    }

    pub fn previous_field(&mut self) {
        if !self.available_columns.is_empty() {
            self.new_field_idx =
                (self.new_field_idx + self.available_columns.len() - 1) % self.available_columns.len();
        }
    }

    pub fn add_statement(&mut self) {
        if self.available_columns.is_empty() || self.new_value.is_empty() {
            return;
        }
        let field = self.available_columns[self.new_field_idx].clone();
        // Replace an existing constraint on the same field rather than
        // stacking contradictory equalities.
        self.statements.retain(|s| s.field != field);
        self.statements.push(FieldFilter {
            field,
            value: std::mem::take(&mut self.new_value),
        });
        self.focus = FilterFocus::Field;
    }

    pub fn remove_selected(&mut self) {
        if let Some(idx) = self.list_state.selected() {
            if idx < self.statements.len() {
                self.statements.remove(idx);
                if self.statements.is_empty() {
                    self.list_state.select(None);
                    self.focus = FilterFocus::Field;
                } else {
                    self.list_state.select(Some(idx.min(self.statements.len() - 1)));
                }
            }
        }
    }

    pub fn clear_statements(&mut self) {
        self.statements.clear();
        self.list_state.select(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn rows() -> Vec<Record> {
        vec![
            record(json!({"sku": "SKU123", "store_id": "S1", "sales": 10})),
            record(json!({"sku": "SKU456", "store_id": "S2", "sales": null})),
            record(json!({"sku": "SKU789", "store_id": "S1"})),
        ]
    }

    #[test]
    fn test_free_text_is_case_insensitive_substring() {
        let rows = rows();
        let filter = FilterState {
            query: "sku123".to_string(),
            fields: Vec::new(),
        };
        let visible = filter.apply(&rows);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0]["sku"], json!("SKU123"));
    }

    #[test]
    fn test_equality_filter_exact_match() {
        let rows = rows();
        let filter = FilterState {
            query: String::new(),
            fields: vec![FieldFilter {
                field: "store_id".to_string(),
                value: "S1".to_string(),
            }],
        };
        assert_eq!(filter.apply(&rows).len(), 2);

        // Substring is not enough for equality constraints.
        let filter = FilterState {
            query: String::new(),
            fields: vec![FieldFilter {
                field: "store_id".to_string(),
                value: "S".to_string(),
            }],
        };
        assert!(filter.apply(&rows).is_empty());
    }

    #[test]
    fn test_constraints_combine_with_and() {
        let rows = rows();
        let filter = FilterState {
            query: "sku".to_string(),
            fields: vec![FieldFilter {
                field: "store_id".to_string(),
                value: "S2".to_string(),
            }],
        };
        let visible = filter.apply(&rows);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0]["sku"], json!("SKU456"));
    }

    #[test]
    fn test_empty_constraint_imposes_nothing() {
        let rows = rows();
        let filter = FilterState {
            query: String::new(),
            fields: vec![FieldFilter {
                field: "store_id".to_string(),
                value: String::new(),
            }],
        };
        assert_eq!(filter.apply(&rows).len(), 3);
        assert!(!filter.is_active());
    }

    #[test]
    fn test_missing_and_null_fields_match_as_empty() {
        let rows = rows();
        let filter = FilterState {
            query: String::new(),
            fields: vec![FieldFilter {
                field: "sales".to_string(),
                value: String::new(),
            }],
        };
        // Never panics on null or absent values.
        assert_eq!(filter.apply(&rows).len(), 3);
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let rows = rows();
        let filter = FilterState {
            query: "s1".to_string(),
            fields: Vec::new(),
        };
        let once: Vec<Record> = filter.apply(&rows).into_iter().cloned().collect();
        let twice = filter.apply(&once);
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn test_modal_add_replaces_same_field() {
        let mut modal = FilterModal::new();
        modal.open(vec!["sku".to_string(), "store_id".to_string()], &[]);
        modal.new_field_idx = 1;
        modal.new_value = "S1".to_string();
        modal.add_statement();
        modal.new_field_idx = 1;
        modal.new_value = "S2".to_string();
        modal.add_statement();

        assert_eq!(modal.statements.len(), 1);
        assert_eq!(modal.statements[0].value, "S2");
        assert_eq!(modal.new_value, "");
        assert_eq!(modal.focus, FilterFocus::Field);
    }

    #[test]
    fn test_modal_add_requires_value() {
        let mut modal = FilterModal::new();
        modal.open(vec!["sku".to_string()], &[]);
        modal.add_statement();
        assert!(modal.statements.is_empty());
    }
}
