//! Application state, command parsing and event handling.
//!
//! The app never mutates tasks itself. A submitted command becomes an
//! [`Intent`]; the event loop runs it against the engine with [`execute`]
//! and feeds the [`Outcome`] back through [`App::report`].

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use taskboard_proto::document::DocId;
use taskboard_proto::task::{NewTask, Priority, TaskPatch};
use thiserror::Error;

use crate::board::{Board, BoardPartitioner};
use crate::remote::RemoteStore;
use crate::sync::{BoardView, SyncEngine, SyncPhase};

/// Command line help shown in the status bar.
pub const HELP: &str = "add <name> [@who] [!prio] [due:date] | mv <n> <status> | rm <n> | \
                        rename <n> <name> | assign <n> [who] | prio <n> <level> | due <n> [date] | q";

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a task.
    Add(NewTask),
    /// Move card `card` to the column named by `status`.
    Move {
        /// Card number.
        card: usize,
        /// Untrusted status text.
        status: String,
    },
    /// Edit fields of card `card`.
    Edit {
        /// Card number.
        card: usize,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Delete card `card`.
    Remove {
        /// Card number.
        card: usize,
    },
    /// Leave the app.
    Quit,
}

/// Why a command line could not be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command word.
    #[error("unknown command '{0}'")]
    Unknown(String),
    /// Missing or extra arguments.
    #[error("usage: {0}")]
    Usage(&'static str),
    /// Card number is not a positive integer.
    #[error("'{0}' is not a card number")]
    BadCard(String),
    /// Priority is not low, normal or high.
    #[error("unknown priority '{0}'")]
    BadPriority(String),
    /// Date does not match the configured format.
    #[error("'{0}' is not a date ({1})")]
    BadDate(String, String),
}

/// Parses one command line. `date_format` is a chrono format string.
///
/// # Errors
///
/// Returns [`CommandError`] describing the first problem found.
pub fn parse_command(line: &str, date_format: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(CommandError::Usage(HELP));
    };
    let rest: Vec<&str> = words.collect();

    match verb.to_ascii_lowercase().as_str() {
        "q" | "quit" => Ok(Command::Quit),
        "add" | "a" => parse_add(&rest, date_format),
        "mv" | "move" => {
            let [card, status @ ..] = rest.as_slice() else {
                return Err(CommandError::Usage("mv <n> <status>"));
            };
            if status.is_empty() {
                return Err(CommandError::Usage("mv <n> <status>"));
            }
            Ok(Command::Move {
                card: parse_card(card)?,
                status: status.join(" "),
            })
        }
        "rm" | "remove" => match rest.as_slice() {
            [card] => Ok(Command::Remove {
                card: parse_card(card)?,
            }),
            _ => Err(CommandError::Usage("rm <n>")),
        },
        "rename" => {
            let [card, name @ ..] = rest.as_slice() else {
                return Err(CommandError::Usage("rename <n> <name>"));
            };
            Ok(Command::Edit {
                card: parse_card(card)?,
                patch: TaskPatch {
                    name: Some(name.join(" ")),
                    ..TaskPatch::default()
                },
            })
        }
        "assign" => {
            let [card, who @ ..] = rest.as_slice() else {
                return Err(CommandError::Usage("assign <n> [who]"));
            };
            let who = who.join(" ");
            Ok(Command::Edit {
                card: parse_card(card)?,
                patch: TaskPatch {
                    assigned_to: Some(who.trim_start_matches('@').to_string()),
                    ..TaskPatch::default()
                },
            })
        }
        "prio" | "priority" => match rest.as_slice() {
            [card, level] => Ok(Command::Edit {
                card: parse_card(card)?,
                patch: TaskPatch {
                    priority: Some(parse_priority(level)?),
                    ..TaskPatch::default()
                },
            }),
            _ => Err(CommandError::Usage("prio <n> <low|normal|high>")),
        },
        "due" => match rest.as_slice() {
            [card] => Ok(Command::Edit {
                card: parse_card(card)?,
                patch: TaskPatch {
                    due_at: Some(None),
                    ..TaskPatch::default()
                },
            }),
            [card, date] => Ok(Command::Edit {
                card: parse_card(card)?,
                patch: TaskPatch {
                    due_at: Some(Some(parse_date(date, date_format)?)),
                    ..TaskPatch::default()
                },
            }),
            _ => Err(CommandError::Usage("due <n> [date]")),
        },
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_add(args: &[&str], date_format: &str) -> Result<Command, CommandError> {
    let mut task = NewTask::default();
    let mut name = Vec::new();
    for word in args {
        if let Some(who) = word.strip_prefix('@').filter(|w| !w.is_empty()) {
            task.assigned_to = who.to_string();
        } else if let Some(level) = word.strip_prefix('!').filter(|w| !w.is_empty()) {
            task.priority = parse_priority(level)?;
        } else if let Some(date) = word.strip_prefix("due:") {
            task.due_at = Some(parse_date(date, date_format)?);
        } else {
            name.push(*word);
        }
    }
    // An empty name is left for the engine to reject.
    task.name = name.join(" ");
    Ok(Command::Add(task))
}

fn parse_card(word: &str) -> Result<usize, CommandError> {
    word.trim_start_matches('#')
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| CommandError::BadCard(word.to_string()))
}

fn parse_priority(word: &str) -> Result<Priority, CommandError> {
    word.parse()
        .map_err(|_| CommandError::BadPriority(word.to_string()))
}

/// Parses a calendar date into milliseconds since the epoch (midnight UTC).
fn parse_date(word: &str, date_format: &str) -> Result<u64, CommandError> {
    let bad = || CommandError::BadDate(word.to_string(), date_format.to_string());
    let date = chrono::NaiveDate::parse_from_str(word, date_format).map_err(|_| bad())?;
    let ms = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(bad)?
        .and_utc()
        .timestamp_millis();
    u64::try_from(ms).map_err(|_| bad())
}

/// Formats a due date (ms since epoch) for display.
#[must_use]
pub fn format_date(ms: u64, date_format: &str) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
        .map_or_else(|| "?".to_string(), |dt| dt.format(date_format).to_string())
}

/// A mutation ready to run against the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Create a task.
    Create(NewTask),
    /// Move a task.
    ChangeStatus {
        /// Task id.
        id: DocId,
        /// Task name, for reporting.
        name: String,
        /// Untrusted status text.
        status: String,
    },
    /// Edit a task.
    Edit {
        /// Task id.
        id: DocId,
        /// Task name, for reporting.
        name: String,
        /// Fields to change.
        patch: TaskPatch,
    },
    /// Delete a task.
    Remove {
        /// Task id.
        id: DocId,
        /// Task name, for reporting.
        name: String,
    },
}

/// Result of running an [`Intent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The store accepted the write (or none was needed).
    Done(String),
    /// Validation or the store rejected it.
    Failed(String),
}

/// Runs an intent against the engine.
pub async fn execute<S: RemoteStore>(engine: &SyncEngine<S>, intent: Intent) -> Outcome {
    match intent {
        Intent::Create(task) => {
            let name = task.name.trim().to_string();
            match engine.create(task).await {
                Ok(_) => Outcome::Done(format!("Added '{name}'")),
                Err(e) => Outcome::Failed(format!("Could not add task: {e}")),
            }
        }
        Intent::ChangeStatus { id, name, status } => match engine.change_status(&id, &status).await {
            Ok(t) => Outcome::Done(format!("Moved '{name}' to {}", t.to)),
            Err(e) => Outcome::Failed(format!("Could not move '{name}': {e}")),
        },
        Intent::Edit { id, name, patch } => match engine.edit(&id, patch).await {
            Ok(()) => Outcome::Done(format!("Updated '{name}'")),
            Err(e) => Outcome::Failed(format!("Could not update '{name}': {e}")),
        },
        Intent::Remove { id, name } => match engine.remove(&id).await {
            Ok(()) => Outcome::Done(format!("Removed '{name}'")),
            Err(e) => Outcome::Failed(format!("Could not remove '{name}': {e}")),
        },
    }
}

/// Severity of a status bar notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something went wrong.
    Error,
}

/// Last message shown in the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Message text.
    pub text: String,
    /// Severity.
    pub level: NoticeLevel,
}

/// Main application state.
pub struct App {
    /// Current command line.
    pub input: String,
    /// Cursor position in input (character index).
    pub cursor_position: usize,
    /// Board built from the latest view.
    pub board: Board,
    /// Sync phase of the latest view.
    pub phase: SyncPhase,
    /// Where the tasks live (store URL or offline note).
    pub source: String,
    /// Last notice for the status bar.
    pub notice: Option<Notice>,
    /// Due date format (chrono).
    pub date_format: String,
    /// Whether the app should quit.
    pub should_quit: bool,
}

impl App {
    /// Creates an app showing an empty, idle board.
    #[must_use]
    pub fn new(source: impl Into<String>, date_format: impl Into<String>) -> Self {
        Self {
            input: String::new(),
            cursor_position: 0,
            board: BoardPartitioner::partition(&BoardView::default().mirror),
            phase: SyncPhase::Idle,
            source: source.into(),
            notice: None,
            date_format: date_format.into(),
            should_quit: false,
        }
    }

    /// Rebuilds the board from a new view.
    pub fn apply_view(&mut self, view: &BoardView) {
        if self.phase != view.phase {
            if let SyncPhase::Stale { reason } = &view.phase {
                self.set_error(format!("Live updates lost: {reason}"));
            }
        }
        self.board = BoardPartitioner::partition(&view.mirror);
        self.phase = view.phase.clone();
    }

    /// Shows the result of an intent.
    pub fn report(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Done(text) => self.set_info(text),
            Outcome::Failed(text) => self.set_error(text),
        }
    }

    /// Shows an informational notice.
    pub fn set_info(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            level: NoticeLevel::Info,
        });
    }

    /// Shows an error notice.
    pub fn set_error(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            level: NoticeLevel::Error,
        });
    }

    /// Handle a key event. Returns an intent when a command was submitted.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<Intent> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Esc, _) => {
                self.should_quit = true;
                None
            }
            (KeyCode::Enter, _) => self.submit(),
            (KeyCode::Char(c), _) => {
                self.enter_char(c);
                None
            }
            (KeyCode::Backspace, _) => {
                self.delete_char();
                None
            }
            (KeyCode::Left, _) => {
                self.cursor_position = self.cursor_position.saturating_sub(1);
                None
            }
            (KeyCode::Right, _) => {
                if self.cursor_position < self.input.chars().count() {
                    self.cursor_position += 1;
                }
                None
            }
            (KeyCode::Home, _) => {
                self.cursor_position = 0;
                None
            }
            (KeyCode::End, _) => {
                self.cursor_position = self.input.chars().count();
                None
            }
            _ => None,
        }
    }

    /// Parses the command line and resolves card numbers against the board.
    pub fn submit(&mut self) -> Option<Intent> {
        let line = std::mem::take(&mut self.input);
        self.cursor_position = 0;
        if line.trim().is_empty() {
            return None;
        }

        let command = match parse_command(&line, &self.date_format) {
            Ok(c) => c,
            Err(e) => {
                self.set_error(e.to_string());
                return None;
            }
        };

        match command {
            Command::Quit => {
                self.should_quit = true;
                None
            }
            Command::Add(task) => Some(Intent::Create(task)),
            Command::Move { card, status } => {
                let (id, name) = self.lookup(card)?;
                Some(Intent::ChangeStatus { id, name, status })
            }
            Command::Edit { card, patch } => {
                let (id, name) = self.lookup(card)?;
                Some(Intent::Edit { id, name, patch })
            }
            Command::Remove { card } => {
                let (id, name) = self.lookup(card)?;
                Some(Intent::Remove { id, name })
            }
        }
    }

    fn lookup(&mut self, card: usize) -> Option<(DocId, String)> {
        match self.board.card(card) {
            Some(c) => Some((c.record.id.clone(), c.record.name.clone())),
            None => {
                self.set_error(format!("No card #{card} on the board"));
                None
            }
        }
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_position)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn enter_char(&mut self, c: char) {
        let at = self.byte_index();
        self.input.insert(at, c);
        self.cursor_position += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index();
            self.input.remove(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taskboard_proto::document::{Document, FieldValue, Fields};
    use taskboard_proto::task::field;

    use crate::sync::Mirror;

    const FMT: &str = "%Y-%m-%d";

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_line(app: &mut App, line: &str) -> Option<Intent> {
        for c in line.chars() {
            app.handle_key_event(key(KeyCode::Char(c)));
        }
        app.handle_key_event(key(KeyCode::Enter))
    }

    fn app_with_cards() -> App {
        let doc = |id: &str, status: &str, created_at: u64| {
            let mut f = Fields::new();
            f.insert(field::NAME.to_string(), FieldValue::from(format!("task {id}")));
            f.insert(field::STATUS.to_string(), FieldValue::from(status));
            f.insert(field::CREATED_AT.to_string(), FieldValue::Timestamp(created_at));
            Document::new(DocId::new(id), f)
        };
        let mut app = App::new("test", FMT);
        app.apply_view(&BoardView {
            phase: SyncPhase::Live,
            mirror: Arc::new(Mirror::from_documents(&[
                doc("a", "To Do", 1),
                doc("b", "Done", 2),
            ])),
        });
        app
    }

    #[test]
    fn add_parses_markers() {
        let cmd = parse_command("add Write docs @sam !high due:2026-03-01", FMT).unwrap();
        let Command::Add(task) = cmd else {
            panic!("expected Add");
        };
        assert_eq!(task.name, "Write docs");
        assert_eq!(task.assigned_to, "sam");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_at, Some(1_772_323_200_000));
    }

    #[test]
    fn add_without_name_is_left_to_engine() {
        let cmd = parse_command("add @sam", FMT).unwrap();
        assert!(matches!(cmd, Command::Add(t) if t.name.is_empty()));
    }

    #[test]
    fn move_joins_multi_word_status() {
        assert_eq!(
            parse_command("mv 2 in progress", FMT).unwrap(),
            Command::Move {
                card: 2,
                status: "in progress".to_string()
            }
        );
    }

    #[test]
    fn due_without_date_clears() {
        let Command::Edit { patch, .. } = parse_command("due 1", FMT).unwrap() else {
            panic!("expected Edit");
        };
        assert_eq!(patch.due_at, Some(None));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            parse_command("launch 1", FMT),
            Err(CommandError::Unknown("launch".to_string()))
        );
        assert_eq!(
            parse_command("rm zero", FMT),
            Err(CommandError::BadCard("zero".to_string()))
        );
        assert_eq!(
            parse_command("rm 0", FMT),
            Err(CommandError::BadCard("0".to_string()))
        );
        assert!(matches!(parse_command("mv 1", FMT), Err(CommandError::Usage(_))));
        assert!(matches!(
            parse_command("prio 1 urgent", FMT),
            Err(CommandError::BadPriority(_))
        ));
        assert!(matches!(
            parse_command("due 1 tomorrow", FMT),
            Err(CommandError::BadDate(..))
        ));
    }

    #[test]
    fn format_date_uses_configured_format() {
        assert_eq!(format_date(1_772_323_200_000, FMT), "2026-03-01");
        assert_eq!(format_date(1_772_323_200_000, "%d.%m."), "01.03.");
    }

    #[test]
    fn submit_resolves_card_numbers() {
        let mut app = app_with_cards();
        let intent = type_line(&mut app, "mv 2 todo").unwrap();
        assert_eq!(
            intent,
            Intent::ChangeStatus {
                id: DocId::new("b"),
                name: "task b".to_string(),
                status: "todo".to_string()
            }
        );
        assert!(app.input.is_empty());
    }

    #[test]
    fn unknown_card_sets_error() {
        let mut app = app_with_cards();
        assert!(type_line(&mut app, "rm 9").is_none());
        let notice = app.notice.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.text.contains("#9"));
    }

    #[test]
    fn quit_command_and_escape() {
        let mut app = App::new("test", FMT);
        assert!(type_line(&mut app, "q").is_none());
        assert!(app.should_quit);

        let mut app = App::new("test", FMT);
        app.handle_key_event(key(KeyCode::Esc));
        assert!(app.should_quit);
    }

    #[test]
    fn cursor_editing_handles_multibyte() {
        let mut app = App::new("test", FMT);
        for c in "héllo".chars() {
            app.handle_key_event(key(KeyCode::Char(c)));
        }
        app.handle_key_event(key(KeyCode::Left));
        app.handle_key_event(key(KeyCode::Left));
        app.handle_key_event(key(KeyCode::Left));
        app.handle_key_event(key(KeyCode::Backspace));
        assert_eq!(app.input, "hllo");
        app.handle_key_event(key(KeyCode::Char('e')));
        assert_eq!(app.input, "hello");
        assert_eq!(app.cursor_position, 2);
    }

    #[test]
    fn stale_view_raises_notice_once() {
        let mut app = app_with_cards();
        let stale = BoardView {
            phase: SyncPhase::Stale {
                reason: "gone".to_string(),
            },
            mirror: Arc::new(Mirror::default()),
        };
        app.apply_view(&stale);
        assert_eq!(app.notice.as_ref().unwrap().level, NoticeLevel::Error);

        app.notice = None;
        app.apply_view(&stale);
        assert!(app.notice.is_none());
    }
}
