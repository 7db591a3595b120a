use std::cmp::Ordering;

use crate::record::{value_number, value_text, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            SortDirection::Ascending => "↑",
            SortDirection::Descending => "↓",
        }
    }
}

/// At most one active sort key. Toggling the active key flips direction;
/// picking a different key replaces it and starts ascending.
#[derive(Debug, Clone, Default)]
pub struct SortState {
    pub key: Option<(String, SortDirection)>,
}

impl SortState {
    pub fn toggle(&mut self, field: &str) {
        self.key = match self.key.take() {
            Some((current, direction)) if current == field => {
                Some((current, direction.flipped()))
            }
            _ => Some((field.to_string(), SortDirection::Ascending)),
        };
    }

    pub fn clear(&mut self) {
        self.key = None;
    }

    pub fn direction_for(&self, field: &str) -> Option<SortDirection> {
        match &self.key {
            Some((current, direction)) if current == field => Some(*direction),
            _ => None,
        }
    }

    /// Order the visible subset in place. Stable: ties keep their relative
    /// input order, so unrelated re-renders never reshuffle equal keys.
    /// No key set leaves the input order untouched.
    pub fn apply(&self, rows: &mut [&Record]) {
        let Some((field, direction)) = &self.key else {
            return;
        };
        rows.sort_by(|a, b| {
            let ord = compare_field(a, b, field);
            match direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });
    }
}

/// Numbers compare numerically, everything else as case-insensitive strings.
/// A mixed pair falls back to the string comparison.
fn compare_field(a: &Record, b: &Record, field: &str) -> Ordering {
    let av = a.get(field);
    let bv = b.get(field);
    if let (Some(an), Some(bn)) = (
        av.and_then(value_number),
        bv.and_then(value_number),
    ) {
        return an.partial_cmp(&bn).unwrap_or(Ordering::Equal);
    }
    let at = av.map(value_text).unwrap_or_default().to_lowercase();
    let bt = bv.map(value_text).unwrap_or_default().to_lowercase();
    at.cmp(&bt)
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

    fn ids(rows: &[&Record]) -> Vec<i64> {
        rows.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn test_no_key_preserves_input_order() {
        let rows = vec![
            record(json!({"id": 2, "sales": 5})),
            record(json!({"id": 1, "sales": 10})),
        ];
        let mut visible: Vec<&Record> = rows.iter().collect();
        SortState::default().apply(&mut visible);
        assert_eq!(ids(&visible), vec![2, 1]);
    }

    #[test]
    fn test_numeric_sort_is_stable_on_ties() {
        let rows = vec![
            record(json!({"id": 1, "sales": 10})),
            record(json!({"id": 2, "sales": 5})),
            record(json!({"id": 3, "sales": 10})),
        ];
        let mut visible: Vec<&Record> = rows.iter().collect();
        let mut sort = SortState::default();
        sort.toggle("sales");
        sort.apply(&mut visible);
        assert_eq!(ids(&visible), vec![2, 1, 3]);

        // Descending keeps the 1-before-3 tie order as well.
        sort.toggle("sales");
        let mut visible: Vec<&Record> = rows.iter().collect();
        sort.apply(&mut visible);
        assert_eq!(ids(&visible), vec![1, 3, 2]);
    }

    #[test]
    fn test_string_sort_is_case_insensitive() {
        let rows = vec![
            record(json!({"id": 1, "sku": "beta"})),
            record(json!({"id": 2, "sku": "Alpha"})),
            record(json!({"id": 3, "sku": "gamma"})),
        ];
        let mut visible: Vec<&Record> = rows.iter().collect();
        let mut sort = SortState::default();
        sort.toggle("sku");
        sort.apply(&mut visible);
        assert_eq!(ids(&visible), vec![2, 1, 3]);
    }

    #[test]
    fn test_missing_fields_sort_as_empty_strings() {
        let rows = vec![
            record(json!({"id": 1, "sku": "beta"})),
            record(json!({"id": 2})),
        ];
        let mut visible: Vec<&Record> = rows.iter().collect();
        let mut sort = SortState::default();
        sort.toggle("sku");
        sort.apply(&mut visible);
        assert_eq!(ids(&visible), vec![2, 1]);
    }

    #[test]
    fn test_toggle_flips_then_replaces() {
        let mut sort = SortState::default();
        sort.toggle("sales");
        assert_eq!(sort.direction_for("sales"), Some(SortDirection::Ascending));
        sort.toggle("sales");
        assert_eq!(sort.direction_for("sales"), Some(SortDirection::Descending));
        sort.toggle("sku");
        assert_eq!(sort.direction_for("sku"), Some(SortDirection::Ascending));
        assert_eq!(sort.direction_for("sales"), None);
        sort.clear();
        assert!(sort.key.is_none());
    }
}
