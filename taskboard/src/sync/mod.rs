//! Live synchronization between the remote task collection and the board.
//!
//! The [`SyncEngine`] holds one subscription to the store and replaces its
//! [`Mirror`] wholesale on every snapshot. Mutations are forwarded to the
//! store and never touch the mirror; their effect arrives with a later
//! snapshot.

pub mod engine;
pub mod mirror;
pub mod status;

pub use engine::{BoardView, SyncEngine, SyncOptions, SyncPhase};
pub use mirror::Mirror;
pub use status::{InvalidStatusError, TaskStatusMachine, Transition};

use thiserror::Error;

use crate::remote::StoreError;

/// Input rejected locally, before any store call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Task name is empty after trimming.
    #[error("task name cannot be empty")]
    NameEmpty,
    /// Task name exceeds the configured length.
    #[error("task name too long (max {max} characters)")]
    NameTooLong {
        /// Configured maximum, in characters.
        max: usize,
    },
    /// An edit that changes nothing.
    #[error("nothing to change")]
    EmptyPatch,
}

/// Errors returned by [`SyncEngine`] operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Local validation failed; the store was not contacted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Requested status is not a board column; the store was not contacted.
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatusError),

    /// The store rejected or failed a write. The mirror is unaffected.
    #[error("remote write failed: {0}")]
    RemoteWrite(#[source] StoreError),

    /// The snapshot stream could not be opened or has failed.
    #[error("subscription failed: {0}")]
    Subscription(#[source] StoreError),
}

/// Checks a task name: non-empty after trimming and at most `max_len`
/// characters.
///
/// # Errors
///
/// Returns [`ValidationError::NameEmpty`] or [`ValidationError::NameTooLong`].
pub fn validate_name(name: &str, max_len: usize) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::NameEmpty);
    }
    if trimmed.chars().count() > max_len {
        return Err(ValidationError::NameTooLong { max: max_len });
    }
    Ok(())
}
