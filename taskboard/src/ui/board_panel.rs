//! Board rendering: one bordered list per status column.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use super::theme;
use crate::app::{App, format_date};
use crate::board::{Card, Column};
use crate::sync::SyncPhase;

/// Render the three columns side by side.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    for (column, chunk) in app.board.columns().iter().zip(chunks.iter()) {
        render_column(frame, *chunk, column, app);
    }
}

fn render_column(frame: &mut Frame, area: Rect, column: &Column, app: &App) {
    let title = Line::from(vec![
        Span::styled(column.status.as_str(), theme::column_title(column.status)),
        Span::styled(format!(" ({})", column.cards.len()), theme::dimmed()),
    ]);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(theme::normal());

    if column.cards.is_empty() {
        let hint = match app.phase {
            SyncPhase::Loading => "Loading...",
            _ => "No tasks",
        };
        let paragraph = Paragraph::new(Span::styled(hint, theme::dimmed())).block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = column
        .cards
        .iter()
        .map(|card| card_item(card, &app.date_format))
        .collect();

    frame.render_widget(List::new(items).block(block), area);
}

/// Two lines per card: number and name, then assignee, priority and due date.
fn card_item<'a>(card: &'a Card, date_format: &str) -> ListItem<'a> {
    let record = &card.record;

    let title = Line::from(vec![
        Span::styled(format!("#{} ", card.number), theme::dimmed()),
        Span::styled(record.name.as_str(), theme::bold()),
    ]);

    let mut meta = vec![Span::raw("   ")];
    if record.is_assigned() {
        meta.push(Span::styled(format!("@{} ", record.assigned_to), theme::normal()));
    }
    meta.push(Span::styled(
        format!("!{}", record.priority),
        theme::priority(record.priority),
    ));
    if let Some(due) = record.due_at {
        meta.push(Span::styled(
            format!(" due {}", format_date(due, date_format)),
            theme::dimmed(),
        ));
    }

    ListItem::new(vec![title, Line::from(meta)])
}
