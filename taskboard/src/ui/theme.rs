//! Theme and styling constants for the TUI.

use ratatui::style::{Color, Modifier, Style};
use taskboard_proto::task::{Priority, TaskStatus};

use crate::sync::SyncPhase;

/// Primary foreground color.
pub const FG_PRIMARY: Color = Color::White;

/// Secondary foreground color (dimmed text).
pub const FG_SECONDARY: Color = Color::Gray;

/// Highlight color for the command line.
pub const HIGHLIGHT: Color = Color::Cyan;

/// Live indicator color.
pub const SUCCESS: Color = Color::Green;

/// Loading indicator color.
pub const WARNING: Color = Color::Yellow;

/// Error and stale indicator color.
pub const ERROR: Color = Color::Red;

/// Idle indicator color.
pub const IDLE: Color = Color::DarkGray;

/// Column title colors, in `To Do`, `In Progress`, `Done` order.
pub const COLUMN_TITLES: [Color; 3] = [Color::Blue, Color::Yellow, Color::Green];

/// Normal text style.
#[must_use]
pub fn normal() -> Style {
    Style::default().fg(FG_PRIMARY)
}

/// Dimmed text style (metadata).
#[must_use]
pub fn dimmed() -> Style {
    Style::default().fg(FG_SECONDARY)
}

/// Bold text style.
#[must_use]
pub fn bold() -> Style {
    Style::default().fg(FG_PRIMARY).add_modifier(Modifier::BOLD)
}

/// Highlighted text style (focused borders).
#[must_use]
pub fn highlighted() -> Style {
    Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD)
}

/// Style for the status bar background (dark background with white foreground).
#[must_use]
pub fn status_bar_bg() -> Style {
    Style::default().fg(Color::White).bg(Color::Rgb(30, 30, 50))
}

/// Style for panel titles with a given color (bold).
#[must_use]
pub fn panel_title(color: Color) -> Style {
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Title style for a status column.
#[must_use]
pub fn column_title(status: TaskStatus) -> Style {
    panel_title(COLUMN_TITLES[status.index()])
}

/// Style for a card's priority marker.
#[must_use]
pub fn priority(priority: Priority) -> Style {
    match priority {
        Priority::High => Style::default().fg(ERROR).add_modifier(Modifier::BOLD),
        Priority::Normal => normal(),
        Priority::Low => dimmed(),
    }
}

/// Indicator color and label for a sync phase.
#[must_use]
pub fn phase(phase: &SyncPhase) -> (Color, &'static str) {
    match phase {
        SyncPhase::Idle => (IDLE, "Idle"),
        SyncPhase::Loading => (WARNING, "Loading"),
        SyncPhase::Live => (SUCCESS, "Live"),
        SyncPhase::Stale { .. } => (ERROR, "Stale"),
    }
}
