//! Task record types for the shared board.
//!
//! Tasks live in the store as schema-less [`Document`]s. This module defines
//! the typed [`TaskRecord`] decoded from them, the field names used on the
//! wire, and the payloads a client sends to create or edit a task.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::{DocId, Document, FieldValue, Fields};

/// Collection holding the board's tasks.
pub const COLLECTION: &str = "tasks";

/// Maximum allowed task name length in characters.
pub const MAX_TASK_NAME_LENGTH: usize = 256;

/// Field names of a task document.
pub mod field {
    /// Task name (text).
    pub const NAME: &str = "name";
    /// Assignee (text, empty when unassigned).
    pub const ASSIGNED: &str = "assigned";
    /// Priority label (text).
    pub const PRIORITY: &str = "priority";
    /// Status label (text).
    pub const STATUS: &str = "status";
    /// Creation time, stamped by the store.
    pub const CREATED_AT: &str = "createdAt";
    /// Optional deadline (timestamp or null).
    pub const DUE: &str = "due";
}

/// Error returned when text does not name a [`TaskStatus`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task status: {0:?}")]
pub struct ParseStatusError(pub String);

/// Error returned when text does not name a [`Priority`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown priority: {0:?}")]
pub struct ParsePriorityError(pub String);

/// Board column a task sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started.
    ToDo,
    /// Being worked on.
    InProgress,
    /// Finished.
    Done,
}

impl TaskStatus {
    /// Every status in board column order.
    pub const ALL: [Self; 3] = [Self::ToDo, Self::InProgress, Self::Done];

    /// Returns the label stored in documents and shown as column title.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ToDo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }

    /// Returns the column index (0..3) of this status.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::ToDo => 0,
            Self::InProgress => 1,
            Self::Done => 2,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercases and drops separators so "To Do", "to_do" and "ToDo" compare equal.
fn squash(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl FromStr for TaskStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match squash(s).as_str() {
            "todo" => Ok(Self::ToDo),
            "inprogress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Can wait.
    Low,
    /// The default.
    #[default]
    Normal,
    /// Needs attention first.
    High,
}

impl Priority {
    /// Returns the label stored in documents.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Normal => "Normal",
            Self::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match squash(s).as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            _ => Err(ParsePriorityError(s.to_string())),
        }
    }
}

/// Why a raw document could not become a [`TaskRecord`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// `name` is missing, not text, or blank.
    #[error("task name is missing or blank")]
    MissingName,
    /// `status` is missing or not text.
    #[error("task status is missing")]
    MissingStatus,
    /// `status` holds a value outside the three columns.
    #[error(transparent)]
    InvalidStatus(#[from] ParseStatusError),
    /// `createdAt` still holds the server timestamp sentinel.
    #[error("creation time not yet assigned by the store")]
    PendingCreatedAt,
    /// `createdAt` is missing or not a timestamp.
    #[error("creation time is missing")]
    MissingCreatedAt,
}

/// A task as mirrored from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Store-assigned identifier.
    pub id: DocId,
    /// Non-blank task name.
    pub name: String,
    /// Assignee; empty means unassigned.
    pub assigned_to: String,
    /// Priority, `Normal` unless set.
    pub priority: Priority,
    /// Board column.
    pub status: TaskStatus,
    /// Store-assigned creation time (ms since epoch).
    pub created_at: u64,
    /// Optional deadline (ms since epoch).
    pub due_at: Option<u64>,
}

impl TaskRecord {
    /// Returns `true` if someone is assigned.
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        !self.assigned_to.trim().is_empty()
    }

    /// Board order: newest `created_at` first, ties by ascending id.
    #[must_use]
    pub fn board_order(a: &Self, b: &Self) -> Ordering {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl TryFrom<&Document> for TaskRecord {
    type Error = DecodeError;

    fn try_from(doc: &Document) -> Result<Self, Self::Error> {
        let name = doc
            .get(field::NAME)
            .and_then(FieldValue::as_text)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(DecodeError::MissingName)?;
        let status = doc
            .get(field::STATUS)
            .and_then(FieldValue::as_text)
            .ok_or(DecodeError::MissingStatus)?
            .parse::<TaskStatus>()?;
        let created_at = match doc.get(field::CREATED_AT) {
            Some(FieldValue::Timestamp(ms)) => *ms,
            Some(FieldValue::ServerTimestamp) => return Err(DecodeError::PendingCreatedAt),
            _ => return Err(DecodeError::MissingCreatedAt),
        };
        let assigned_to = doc
            .get(field::ASSIGNED)
            .and_then(FieldValue::as_text)
            .map(|a| a.trim().to_string())
            .unwrap_or_default();
        let priority = doc
            .get(field::PRIORITY)
            .and_then(FieldValue::as_text)
            .and_then(|p| p.parse().ok())
            .unwrap_or_default();
        let due_at = doc.get(field::DUE).and_then(FieldValue::as_timestamp);

        Ok(Self {
            id: doc.id.clone(),
            name: name.to_string(),
            assigned_to,
            priority,
            status,
            created_at,
            due_at,
        })
    }
}

/// Fields supplied by a user when creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    /// Task name; required, trimmed before sending.
    pub name: String,
    /// Assignee; empty means unassigned.
    pub assigned_to: String,
    /// Priority.
    pub priority: Priority,
    /// Optional deadline (ms since epoch).
    pub due_at: Option<u64>,
}

impl NewTask {
    /// Creates a task payload with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builds the insert payload: trimmed text, status `To Do`, and a server
    /// timestamp sentinel for `createdAt`.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::NAME.to_string(), FieldValue::from(self.name.trim()));
        fields.insert(
            field::ASSIGNED.to_string(),
            FieldValue::from(self.assigned_to.trim()),
        );
        fields.insert(
            field::PRIORITY.to_string(),
            FieldValue::from(self.priority.as_str()),
        );
        fields.insert(
            field::STATUS.to_string(),
            FieldValue::from(TaskStatus::ToDo.as_str()),
        );
        fields.insert(field::CREATED_AT.to_string(), FieldValue::ServerTimestamp);
        fields.insert(
            field::DUE.to_string(),
            self.due_at.map_or(FieldValue::Null, FieldValue::Timestamp),
        );
        fields
    }
}

/// A partial edit of a task's user-editable fields.
///
/// `None` leaves a field untouched. `due_at: Some(None)` clears the deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New name.
    pub name: Option<String>,
    /// New assignee; an empty string unassigns.
    pub assigned_to: Option<String>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New deadline, or `Some(None)` to clear it.
    pub due_at: Option<Option<u64>>,
}

impl TaskPatch {
    /// Returns `true` if the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.assigned_to.is_none()
            && self.priority.is_none()
            && self.due_at.is_none()
    }

    /// Builds the partial update payload containing only the set fields.
    #[must_use]
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        if let Some(name) = self.name {
            fields.insert(field::NAME.to_string(), FieldValue::from(name.trim()));
        }
        if let Some(assigned) = self.assigned_to {
            fields.insert(field::ASSIGNED.to_string(), FieldValue::from(assigned.trim()));
        }
        if let Some(priority) = self.priority {
            fields.insert(field::PRIORITY.to_string(), FieldValue::from(priority.as_str()));
        }
        if let Some(due) = self.due_at {
            fields.insert(
                field::DUE.to_string(),
                due.map_or(FieldValue::Null, FieldValue::Timestamp),
            );
        }
        fields
    }
}

/// Builds the partial update payload that moves a task to `status`.
#[must_use]
pub fn status_fields(status: TaskStatus) -> Fields {
    let mut fields = Fields::new();
    fields.insert(field::STATUS.to_string(), FieldValue::from(status.as_str()));
    fields
}
