//! Command line rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use super::theme;
use crate::app::App;

/// Render the command line with a block cursor.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let line = if app.input.is_empty() {
        Line::from(vec![
            Span::styled("█", theme::normal()),
            Span::styled("add <name>, mv <n> <status>, rm <n> ...", theme::dimmed()),
        ])
    } else {
        let mut display_text = String::with_capacity(app.input.len() + 3);
        for (i, c) in app.input.chars().enumerate() {
            if i == app.cursor_position {
                display_text.push('█');
            }
            display_text.push(c);
        }
        if app.cursor_position >= app.input.chars().count() {
            display_text.push('█');
        }
        Line::from(Span::styled(display_text, theme::normal()))
    };

    let block = Block::default()
        .title("Command")
        .borders(Borders::ALL)
        .border_style(theme::highlighted());

    frame.render_widget(Paragraph::new(line).block(block), area);
}
