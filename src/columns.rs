/// Which columns to display, chosen out of the field set discovered from the
/// first loaded record. An empty selection means "show all" so toggling every
/// column off never renders a zero-column table.
#[derive(Debug, Clone, Default)]
pub struct ColumnSelection {
    visible: Vec<String>,
}

impl ColumnSelection {
    pub fn toggle(&mut self, column: &str) {
        if let Some(pos) = self.visible.iter().position(|c| c == column) {
            self.visible.remove(pos);
        } else {
            self.visible.push(column.to_string());
        }
    }

    pub fn reset(&mut self) {
        self.visible.clear();
    }

    pub fn is_selected(&self, column: &str) -> bool {
        self.visible.iter().any(|c| c == column)
    }

    /// Whether the column would currently be rendered.
    pub fn is_visible(&self, column: &str) -> bool {
        self.visible.is_empty() || self.is_selected(column)
    }

    /// The columns to render, preserving the discovery order of `all`.
    pub fn effective<'a>(&self, all: &'a [String]) -> Vec<&'a str> {
        if self.visible.is_empty() {
            return all.iter().map(String::as_str).collect();
        }
        all.iter()
            .filter(|c| self.is_selected(c))
            .map(String::as_str)
            .collect()
    }
}

/// UI state for the column-visibility modal: cursor over the discovered
/// columns, Space toggles, `a` restores show-all.
#[derive(Default)]
pub struct ColumnsModal {
    pub active: bool,
    pub columns: Vec<String>,
    pub cursor: usize,
}

impl ColumnsModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, columns: Vec<String>) {
        self.active = true;
        self.columns = columns;
        self.cursor = 0;
    }

    pub fn close(&mut self) {
        self.active = false;
    }

    pub fn next(&mut self) {
        if !self.columns.is_empty() {
            self.cursor = (self.cursor + 1) % self.columns.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.columns.is_empty() {
            self.cursor = (self.cursor + self.columns.len() - 1) % self.columns.len();
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.columns.get(self.cursor).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> Vec<String> {
        vec!["sku".to_string(), "store_id".to_string(), "sales".to_string()]
    }

    #[test]
    fn test_empty_selection_shows_all() {
        let selection = ColumnSelection::default();
        assert_eq!(selection.effective(&all()), vec!["sku", "store_id", "sales"]);
        assert!(selection.is_visible("sku"));
    }

    #[test]
    fn test_toggle_narrows_then_restores() {
        let mut selection = ColumnSelection::default();
        selection.toggle("sales");
        assert_eq!(selection.effective(&all()), vec!["sales"]);
        assert!(!selection.is_visible("sku"));

        selection.toggle("sku");
        // Display order follows discovery order, not toggle order.
        assert_eq!(selection.effective(&all()), vec!["sku", "sales"]);

        selection.toggle("sales");
        selection.toggle("sku");
        assert_eq!(selection.effective(&all()), vec!["sku", "store_id", "sales"]);
    }

    #[test]
    fn test_reset_clears_selection() {
        let mut selection = ColumnSelection::default();
        selection.toggle("sku");
        selection.reset();
        assert_eq!(selection.effective(&all()).len(), 3);
    }

    #[test]
    fn test_modal_cursor_wraps() {
        let mut modal = ColumnsModal::new();
        modal.open(all());
        assert_eq!(modal.current(), Some("sku"));
        modal.previous();
        assert_eq!(modal.current(), Some("sales"));
        modal.next();
        assert_eq!(modal.current(), Some("sku"));
    }
}
