use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Row, StatefulWidget, Table, TableState},
};
use serde_json::Value;

use crate::record::{field_number, value_text, Record};
use crate::sort::SortState;

/// Risk banding for predicted sales. Above `high` is high-risk overstock,
/// above `warn` is moderate, anything else is low.
#[derive(Debug, Clone, Copy)]
pub struct RiskBands {
    pub high: f64,
    pub warn: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    High,
    Moderate,
    Low,
}

impl RiskBands {
    pub fn level(&self, predicted: f64) -> RiskLevel {
        if predicted > self.high {
            RiskLevel::High
        } else if predicted > self.warn {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

/// Aggregates over the currently visible rows, shown in the table footer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TableStats {
    pub rows: usize,
    pub mean_predicted: Option<f64>,
    pub high_risk: usize,
}

impl TableStats {
    pub fn compute(rows: &[&Record], bands: RiskBands) -> Self {
        let mut sum = 0.0;
        let mut counted = 0usize;
        let mut high_risk = 0usize;
        for row in rows {
            if let Some(predicted) = field_number(row, "predicted_sales") {
                sum += predicted;
                counted += 1;
                if bands.level(predicted) == RiskLevel::High {
                    high_risk += 1;
                }
            }
        }
        Self {
            rows: rows.len(),
            mean_predicted: (counted > 0).then(|| sum / counted as f64),
            high_risk,
        }
    }

    pub fn summary(&self) -> String {
        match self.mean_predicted {
            Some(mean) => format!(
                "{} rows | avg predicted {:.2} | {} high-risk",
                self.rows, mean, self.high_risk
            ),
            None => format!("{} rows", self.rows),
        }
    }
}

/// Colors the table needs from the theme
#[derive(Debug, Clone, Copy)]
pub struct DataTableColors {
    pub header: Color,
    pub border: Color,
    pub risk_high: Color,
    pub risk_moderate: Color,
    pub text: Color,
}

/// Scrollable record table over the accumulated rows. Headers carry sort
/// arrows, the column cursor is underlined for sort/visibility targeting,
/// and predicted_sales cells are colored by risk band.
pub struct DataTable<'a> {
    pub title: &'a str,
    pub columns: &'a [&'a str],
    pub rows: &'a [&'a Record],
    pub sort: &'a SortState,
    pub column_cursor: usize,
    pub bands: RiskBands,
    pub colors: DataTableColors,
    pub loading: bool,
}

/// Render one cell value. Null and missing fields show as "N/A"; predicted
/// sales are fixed to two decimals like the rest of the dashboard.
pub fn cell_text(record: &Record, column: &str) -> String {
    match record.get(column) {
        None | Some(Value::Null) => "N/A".to_string(),
        Some(value) => {
            if column == "predicted_sales" {
                if let Some(n) = value.as_f64() {
                    return format!("{:.2}", n);
                }
            }
            value_text(value)
        }
    }
}

impl DataTable<'_> {
    fn header_label(&self, idx: usize, column: &str) -> String {
        let arrow = self
            .sort
            .direction_for(column)
            .map(|d| d.arrow())
            .unwrap_or("");
        let cursor = if idx == self.column_cursor { ">" } else { "" };
        format!("{}{}{}", cursor, column, arrow)
    }

    fn column_widths(&self) -> Vec<Constraint> {
        const MAX_WIDTH: usize = 40;
        const SAMPLE_ROWS: usize = 200;

        self.columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let mut width = self.header_label(idx, column).chars().count();
                for row in self.rows.iter().take(SAMPLE_ROWS) {
                    width = width.max(cell_text(row, column).chars().count());
                }
                Constraint::Length(width.min(MAX_WIDTH) as u16 + 1)
            })
            .collect()
    }
}

impl StatefulWidget for &DataTable<'_> {
    type State = TableState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut TableState) {
        let header = Row::new(self.columns.iter().enumerate().map(|(idx, column)| {
            let mut style = Style::default()
                .fg(self.colors.header)
                .add_modifier(Modifier::BOLD);
            if idx == self.column_cursor {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            Cell::from(self.header_label(idx, column)).style(style)
        }));

        let rows = self.rows.iter().map(|record| {
            Row::new(self.columns.iter().map(|column| {
                let text = cell_text(record, column);
                let style = if *column == "predicted_sales" {
                    match field_number(record, "predicted_sales").map(|p| self.bands.level(p)) {
                        Some(RiskLevel::High) => Style::default().fg(self.colors.risk_high),
                        Some(RiskLevel::Moderate) => {
                            Style::default().fg(self.colors.risk_moderate)
                        }
                        _ => Style::default().fg(self.colors.text),
                    }
                } else {
                    Style::default().fg(self.colors.text)
                };
                Cell::from(text).style(style)
            }))
        });

        let title = if self.loading {
            format!("{} (loading...)", self.title)
        } else {
            self.title.to_string()
        };

        let table = Table::new(rows, self.column_widths())
            .header(header)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.colors.border))
                    .title(title),
            );

        StatefulWidget::render(table, area, buf, state);
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

    const BANDS: RiskBands = RiskBands {
        high: 100.0,
        warn: 50.0,
    };

    #[test]
    fn test_risk_banding_boundaries() {
        assert_eq!(BANDS.level(150.0), RiskLevel::High);
        assert_eq!(BANDS.level(100.0), RiskLevel::Moderate);
        assert_eq!(BANDS.level(75.0), RiskLevel::Moderate);
        assert_eq!(BANDS.level(50.0), RiskLevel::Low);
        assert_eq!(BANDS.level(0.0), RiskLevel::Low);
    }

    #[test]
    fn test_cell_text_formats_predictions_and_nulls() {
        let row = record(json!({"predicted_sales": 12.3456, "note": null, "sku": "A1"}));
        assert_eq!(cell_text(&row, "predicted_sales"), "12.35");
        assert_eq!(cell_text(&row, "note"), "N/A");
        assert_eq!(cell_text(&row, "missing"), "N/A");
        assert_eq!(cell_text(&row, "sku"), "A1");
    }

    #[test]
    fn test_stats_over_visible_rows() {
        let rows = vec![
            record(json!({"predicted_sales": 120.0})),
            record(json!({"predicted_sales": 80.0})),
            record(json!({"sku": "no-prediction"})),
        ];
        let refs: Vec<&Record> = rows.iter().collect();
        let stats = TableStats::compute(&refs, BANDS);
        assert_eq!(stats.rows, 3);
        assert_eq!(stats.mean_predicted, Some(100.0));
        assert_eq!(stats.high_risk, 1);
        assert_eq!(stats.summary(), "3 rows | avg predicted 100.00 | 1 high-risk");
    }

    #[test]
    fn test_stats_without_predictions() {
        let rows = vec![record(json!({"sku": "A"}))];
        let refs: Vec<&Record> = rows.iter().collect();
        let stats = TableStats::compute(&refs, BANDS);
        assert_eq!(stats.mean_predicted, None);
        assert_eq!(stats.summary(), "1 rows");
    }
}
