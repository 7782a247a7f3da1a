//! Schema-less document model.
//!
//! A [`Document`] is an id plus a map of named [`FieldValue`]s. The store
//! never interprets field contents except for [`FieldValue::ServerTimestamp`],
//! a write-time sentinel replaced by the store's own clock when the write
//! commits.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Field map of a document, keyed by field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// Opaque document identifier assigned by the store on insert.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(String);

impl DocId {
    /// Wraps an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh time-ordered identifier (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single field value.
///
/// Variant order doubles as the cross-type sort order (`Null` sorts first),
/// so the derived `Ord` is what the store uses for `order_by`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldValue {
    /// Explicit absence of a value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// UTF-8 text value.
    Text(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(u64),
    /// Placeholder asking the store to stamp the commit time.
    ServerTimestamp,
}

impl FieldValue {
    /// Returns the text if this is a [`FieldValue::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the timestamp if this is a resolved [`FieldValue::Timestamp`].
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<u64> {
        match self {
            Self::Timestamp(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Returns `true` for [`FieldValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Store-assigned identifier.
    pub id: DocId,
    /// Field values.
    pub fields: Fields,
}

impl Document {
    /// Creates a document from an id and its fields.
    #[must_use]
    pub const fn new(id: DocId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Sort direction for subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Smallest value first.
    Ascending,
    /// Largest value first.
    Descending,
}

/// Sorts documents by one field in the given direction.
///
/// Documents missing the field sort as if it were `Null`. Ties are broken by
/// ascending id regardless of direction, so the result is deterministic.
pub fn sort_documents(documents: &mut [Document], order_by: &str, direction: Direction) {
    documents.sort_by(|a, b| compare_by_field(a, b, order_by, direction));
}

/// Compares two documents the way [`sort_documents`] orders them.
#[must_use]
pub fn compare_by_field(a: &Document, b: &Document, order_by: &str, direction: Direction) -> Ordering {
    let key_a = a.get(order_by).unwrap_or(&FieldValue::Null);
    let key_b = b.get(order_by).unwrap_or(&FieldValue::Null);
    let by_key = match direction {
        Direction::Ascending => key_a.cmp(key_b),
        Direction::Descending => key_b.cmp(key_a),
    };
    by_key.then_with(|| a.id.cmp(&b.id))
}

/// Replaces every [`FieldValue::ServerTimestamp`] in `fields` with `now`.
pub fn resolve_server_timestamps(fields: &mut Fields, now: u64) {
    for value in fields.values_mut() {
        if *value == FieldValue::ServerTimestamp {
            *value = FieldValue::Timestamp(now);
        }
    }
}
