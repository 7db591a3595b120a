use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Paragraph, Widget},
};

/// Bottom key-hint bar. The entries vary per view, so the caller passes the
/// (key, action) pairs along with an optional row counter for table views.
pub struct Controls {
    pub entries: &'static [(&'static str, &'static str)],
    pub row_count: Option<(usize, usize)>, // (visible, loaded)
    pub dimmed: bool,
    pub bg: Color,
}

impl Controls {
    pub fn new(entries: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            entries,
            row_count: None,
            dimmed: false,
            bg: Color::DarkGray,
        }
    }

    pub fn with_row_count(mut self, visible: usize, loaded: usize) -> Self {
        self.row_count = Some((visible, loaded));
        self
    }

    pub fn with_dimmed(mut self, dimmed: bool) -> Self {
        self.dimmed = dimmed;
        self
    }

    pub fn with_bg(mut self, bg: Color) -> Self {
        self.bg = bg;
        self
    }
}

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut constraints = self.entries.iter().fold(vec![], |mut acc, (key, action)| {
            acc.push(Constraint::Length(key.chars().count() as u16 + 2));
            acc.push(Constraint::Length(action.chars().count() as u16 + 1));
            acc
        });

        // Add space for row count if available
        if self.row_count.is_some() {
            constraints.push(Constraint::Length(24)); // Space for "Rows: 123 of 4567"
        }
        constraints.push(Constraint::Fill(1)); // Fill the remaining space

        let layout = Layout::new(Direction::Horizontal, constraints).split(area);

        let base_style = if self.dimmed {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        for (i, (key, action)) in self.entries.iter().enumerate() {
            let j = i * 2;
            Paragraph::new(*key)
                .style(base_style.bold())
                .centered()
                .render(layout[j], buf);
            Paragraph::new(*action)
                .style(base_style.bg(self.bg))
                .render(layout[j + 1], buf);
        }

        let mut fill_start_idx = self.entries.len() * 2;
        if let Some((visible, loaded)) = self.row_count {
            let row_count_text = if visible == loaded {
                format!("Rows: {}", loaded)
            } else {
                format!("Rows: {} of {}", visible, loaded)
            };
            Paragraph::new(row_count_text)
                .style(base_style.bg(self.bg).fg(if self.dimmed {
                    Color::DarkGray
                } else {
                    Color::White
                }))
                .right_aligned()
                .render(layout[fill_start_idx], buf);
            fill_start_idx += 1;
        }

        Paragraph::new("")
            .style(base_style.bg(self.bg))
            .render(layout[fill_start_idx], buf);
    }
}
