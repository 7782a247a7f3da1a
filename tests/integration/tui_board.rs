//! Rendering tests for the board UI using ratatui's `TestBackend`.
//!
//! # Verification Focus
//!
//! - Three status columns with card counts
//! - Cards show number, name and metadata
//! - Sync phase and notices in the status bar
//! - Commands typed into the app resolve against the rendered numbers

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{Terminal, backend::TestBackend};
use taskboard::app::{App, Intent, Outcome};
use taskboard::sync::{BoardView, Mirror, SyncPhase};
use taskboard::ui;
use taskboard_proto::document::{DocId, Document, FieldValue, Fields};
use taskboard_proto::task::field;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn doc(id: &str, name: &str, status: &str, created_at: u64) -> Document {
    let mut f = Fields::new();
    f.insert(field::NAME.to_string(), FieldValue::from(name));
    f.insert(field::STATUS.to_string(), FieldValue::from(status));
    f.insert(field::CREATED_AT.to_string(), FieldValue::Timestamp(created_at));
    Document::new(DocId::new(id), f)
}

fn live(docs: &[Document]) -> BoardView {
    BoardView {
        phase: SyncPhase::Live,
        mirror: Arc::new(Mirror::from_documents(docs)),
    }
}

/// Renders the app and returns the screen as one string per row.
fn render(app: &App) -> Vec<String> {
    let backend = TestBackend::new(120, 20);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal.draw(|frame| ui::draw(frame, app)).unwrap();

    let buffer = terminal.backend().buffer();
    let area = buffer.area;
    (0..area.height)
        .map(|y| {
            (0..area.width)
                .map(|x| buffer[(x, y)].symbol().to_string())
                .collect::<String>()
        })
        .collect()
}

fn screen_contains(rows: &[String], needle: &str) -> bool {
    rows.iter().any(|r| r.contains(needle))
}

fn type_line(app: &mut App, line: &str) -> Option<Intent> {
    for c in line.chars() {
        app.handle_key_event(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
    }
    app.handle_key_event(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
}

// ===========================================================================
// Layout
// ===========================================================================

#[test]
fn empty_board_shows_three_columns() {
    let mut app = App::new("offline demo", "%Y-%m-%d");
    app.apply_view(&live(&[]));
    let rows = render(&app);

    for title in ["To Do (0)", "In Progress (0)", "Done (0)"] {
        assert!(screen_contains(&rows, title), "missing column {title}");
    }
    assert!(screen_contains(&rows, "No tasks"));
    assert!(screen_contains(&rows, "Live (offline demo)"));
}

#[test]
fn loading_board_says_so() {
    let mut app = App::new("ws://store/ws", "%Y-%m-%d");
    app.apply_view(&BoardView {
        phase: SyncPhase::Loading,
        mirror: Arc::new(Mirror::default()),
    });
    let rows = render(&app);
    assert!(screen_contains(&rows, "Loading..."));
    assert!(screen_contains(&rows, "Loading (ws://store/ws)"));
}

#[test]
fn cards_render_in_their_columns() {
    let mut task = doc("a", "Write docs", "In Progress", 2);
    task.fields
        .insert(field::ASSIGNED.to_string(), FieldValue::from("sam"));
    task.fields
        .insert(field::PRIORITY.to_string(), FieldValue::from("High"));
    task.fields
        .insert(field::DUE.to_string(), FieldValue::Timestamp(1_772_323_200_000));

    let mut app = App::new("test", "%Y-%m-%d");
    app.apply_view(&live(&[task, doc("b", "Plan sprint", "To Do", 1)]));
    let rows = render(&app);

    assert!(screen_contains(&rows, "To Do (1)"));
    assert!(screen_contains(&rows, "In Progress (1)"));
    assert!(screen_contains(&rows, "#1 Plan sprint"));
    assert!(screen_contains(&rows, "#2 Write docs"));
    assert!(screen_contains(&rows, "@sam"));
    assert!(screen_contains(&rows, "!High"));
    assert!(screen_contains(&rows, "due 2026-03-01"));
}

// ===========================================================================
// Status bar
// ===========================================================================

#[test]
fn stale_view_keeps_cards_and_shows_reason() {
    let mut app = App::new("test", "%Y-%m-%d");
    app.apply_view(&live(&[doc("a", "Survivor", "Done", 1)]));
    let mirror = Arc::new(Mirror::from_documents(&[doc("a", "Survivor", "Done", 1)]));
    app.apply_view(&BoardView {
        phase: SyncPhase::Stale {
            reason: "connection closed".to_string(),
        },
        mirror,
    });
    let rows = render(&app);

    assert!(screen_contains(&rows, "#1 Survivor"));
    assert!(screen_contains(&rows, "Stale (test)"));
    assert!(screen_contains(&rows, "Live updates lost: connection closed"));
}

#[test]
fn outcomes_show_in_status_bar() {
    let mut app = App::new("test", "%Y-%m-%d");
    app.report(Outcome::Failed("Could not add task: task name cannot be empty".to_string()));
    assert!(screen_contains(&render(&app), "task name cannot be empty"));

    app.report(Outcome::Done("Added 'x'".to_string()));
    assert!(screen_contains(&render(&app), "Added 'x'"));
}

// ===========================================================================
// Command line
// ===========================================================================

#[test]
fn typed_input_is_echoed() {
    let mut app = App::new("test", "%Y-%m-%d");
    for c in "add milk".chars() {
        app.handle_key_event(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
    }
    assert!(screen_contains(&render(&app), "add milk█"));
}

#[test]
fn card_numbers_match_rendering() {
    let mut app = App::new("test", "%Y-%m-%d");
    app.apply_view(&live(&[
        doc("done", "Finished", "Done", 3),
        doc("todo", "Pending", "To Do", 1),
    ]));
    let rows = render(&app);
    assert!(screen_contains(&rows, "#2 Finished"));

    let intent = type_line(&mut app, "rm 2").unwrap();
    assert_eq!(
        intent,
        Intent::Remove {
            id: DocId::new("done"),
            name: "Finished".to_string(),
        }
    );
}
