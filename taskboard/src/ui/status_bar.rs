//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, HELP, NoticeLevel};

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let (dot_color, phase_label) = theme::phase(&app.phase);

    let message = match &app.notice {
        Some(n) if n.level == NoticeLevel::Error => {
            Span::styled(n.text.as_str(), theme::normal().fg(theme::ERROR))
        }
        Some(n) => Span::styled(n.text.as_str(), theme::normal()),
        None => Span::styled(HELP, theme::dimmed()),
    };

    let status_line = Line::from(vec![
        Span::styled(concat!("Taskboard v", env!("CARGO_PKG_VERSION")), theme::bold()),
        Span::raw(" | "),
        Span::styled("●", theme::normal().fg(dot_color)),
        Span::raw(format!(" {phase_label} ({})", app.source)),
        Span::raw(" | "),
        message,
    ]);

    let paragraph = Paragraph::new(status_line).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}
