use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Paragraph, Widget},
};

/// Operational counters shown in the --debug status line: event/frame
/// throughput plus the paging internals of whichever table is on screen.
#[derive(Default)]
pub struct DebugState {
    pub enabled: bool,
    pub num_events: usize,
    pub num_frames: usize,
    pub last_key: String,
    /// (skip, generation, in_flight, exhausted) for the active pager
    pub pager: Option<(usize, u64, bool, bool)>,
}

impl DebugState {
    pub fn on_key(&mut self, key: &crossterm::event::KeyEvent) {
        if self.enabled {
            self.last_key = format!("{:?}", key.code);
        }
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let pager = match self.pager {
            Some((skip, generation, in_flight, exhausted)) => format!(
                "skip={} gen={} in_flight={} exhausted={}",
                skip, generation, in_flight, exhausted
            ),
            None => "no pager".to_string(),
        };
        let line = format!(
            "debug: events={} frames={} key={} | {}",
            self.num_events, self.num_frames, self.last_key, pager
        );
        Paragraph::new(line)
            .style(Style::default().fg(Color::Black).bg(Color::Yellow))
            .render(area, buf);
    }
}
