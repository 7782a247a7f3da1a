//! Status normalization and transition rules.

use taskboard_proto::task::TaskStatus;
use thiserror::Error;

/// Status text that does not name a board column.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid status {0:?} (expected To Do, In Progress or Done)")]
pub struct InvalidStatusError(pub String);

/// A validated status request.
///
/// The update is always sent; `from` is what the mirror showed at the time
/// and may lag the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Status currently mirrored, `None` when the task is not in the mirror.
    pub from: Option<TaskStatus>,
    /// Requested status.
    pub to: TaskStatus,
}

impl Transition {
    /// Whether the mirror already showed the requested status.
    #[must_use]
    pub fn is_same_column(self) -> bool {
        self.from == Some(self.to)
    }
}

/// Validates status requests coming from untrusted input.
///
/// Every move between distinct columns is allowed, backward included.
/// Nothing transitions on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskStatusMachine;

impl TaskStatusMachine {
    /// Maps free text onto a column.
    ///
    /// Case, surrounding whitespace and the separators space, `_` and `-`
    /// are ignored: `"to-do"`, `"InProgress"` and `" DONE "` all parse.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStatusError`] for anything else.
    pub fn normalize(input: &str) -> Result<TaskStatus, InvalidStatusError> {
        input
            .parse()
            .map_err(|_| InvalidStatusError(input.trim().to_string()))
    }

    /// Validates a move from `current` to the status named by `requested`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStatusError`] if `requested` is not a column.
    pub fn transition(
        current: Option<TaskStatus>,
        requested: &str,
    ) -> Result<Transition, InvalidStatusError> {
        let to = Self::normalize(requested)?;
        Ok(Transition { from: current, to })
    }
}
