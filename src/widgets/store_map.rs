use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{
        canvas::{Canvas, Map, MapResolution},
        Block, Borders, List, ListItem, Paragraph, Widget,
    },
};

use crate::config::StoreLocation;
use crate::record::{field_number, field_text, Record};

use super::datatable::{RiskBands, RiskLevel};

/// Per-store liquidation risk, derived from whatever prediction rows are
/// currently loaded. Stores with no matching rows carry no level.
#[derive(Debug, Clone)]
pub struct StoreRisk {
    pub store: StoreLocation,
    pub mean_predicted: Option<f64>,
    pub level: Option<RiskLevel>,
}

/// Aggregate loaded rows per store. Rows are matched on their `store_id`
/// field; the mean predicted_sales for a store is banded like table cells.
pub fn store_risks(
    stores: &[StoreLocation],
    rows: &[Record],
    bands: RiskBands,
) -> Vec<StoreRisk> {
    stores
        .iter()
        .map(|store| {
            let mut sum = 0.0;
            let mut count = 0usize;
            for row in rows {
                if field_text(row, "store_id") != store.store_id {
                    continue;
                }
                if let Some(predicted) = field_number(row, "predicted_sales") {
                    sum += predicted;
                    count += 1;
                }
            }
            let mean_predicted = (count > 0).then(|| sum / count as f64);
            StoreRisk {
                store: store.clone(),
                mean_predicted,
                level: mean_predicted.map(|m| bands.level(m)),
            }
        })
        .collect()
}

pub struct StoreMapColors {
    pub border: Color,
    pub land: Color,
    pub dimmed: Color,
    pub risk_high: Color,
    pub risk_moderate: Color,
    pub risk_low: Color,
    pub risk_none: Color,
}

impl StoreMapColors {
    fn for_level(&self, level: Option<RiskLevel>) -> Color {
        match level {
            Some(RiskLevel::High) => self.risk_high,
            Some(RiskLevel::Moderate) => self.risk_moderate,
            Some(RiskLevel::Low) => self.risk_low,
            None => self.risk_none,
        }
    }
}

/// World map of store locations with markers colored by derived risk, plus a
/// side panel listing each store's mean prediction.
pub struct StoreMap<'a> {
    pub risks: &'a [StoreRisk],
    pub selected: usize,
    pub colors: StoreMapColors,
}

impl Widget for &StoreMap<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Fill(2), Constraint::Length(38)])
            .split(area);

        self.render_canvas(chunks[0], buf);
        self.render_panel(chunks[1], buf);
    }
}

impl StoreMap<'_> {
    fn render_canvas(&self, area: Rect, buf: &mut Buffer) {
        let canvas = Canvas::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(self.colors.border))
                    .title("Store Risk Map"),
            )
            .x_bounds([-180.0, 180.0])
            .y_bounds([-90.0, 90.0])
            .paint(|ctx| {
                ctx.draw(&Map {
                    resolution: MapResolution::High,
                    color: self.colors.land,
                });
                ctx.layer();
                for (idx, risk) in self.risks.iter().enumerate() {
                    let color = self.colors.for_level(risk.level);
                    let marker = if idx == self.selected { "◉" } else { "●" };
                    ctx.print(
                        risk.store.lng,
                        risk.store.lat,
                        Span::styled(
                            marker.to_string(),
                            Style::default().fg(color).add_modifier(Modifier::BOLD),
                        ),
                    );
                }
            });
        canvas.render(area, buf);
    }

    fn render_panel(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.colors.border))
            .title("Stores");
        let inner = block.inner(area);
        block.render(area, buf);

        if self.risks.is_empty() {
            Paragraph::new("No stores configured.\nAdd [[stores]] entries to config.toml.")
                .style(Style::default().fg(self.colors.dimmed))
                .render(inner, buf);
            return;
        }

        let items: Vec<ListItem> = self
            .risks
            .iter()
            .enumerate()
            .map(|(idx, risk)| {
                let color = self.colors.for_level(risk.level);
                let line = match risk.mean_predicted {
                    Some(mean) => format!(
                        "{} {} - avg {:.2}",
                        risk.store.store_id, risk.store.name, mean
                    ),
                    None => format!("{} {} - no data", risk.store.store_id, risk.store.name),
                };
                let mut style = Style::default().fg(color);
                if idx == self.selected {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                ListItem::new(line).style(style)
            })
            .collect();

        List::new(items).render(inner, buf);
    }
}
