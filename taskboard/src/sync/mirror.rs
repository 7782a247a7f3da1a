//! The local copy of the task collection.

use std::collections::HashSet;

use taskboard_proto::document::{DocId, Document};
use taskboard_proto::task::{DecodeError, TaskRecord};

/// Decoded, ordered contents of one snapshot.
///
/// Records are unique by id and sorted newest first (ties by id). Documents
/// that do not decode, including ones whose creation time is still pending,
/// are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mirror {
    records: Vec<TaskRecord>,
}

impl Mirror {
    /// Builds a mirror from a raw snapshot.
    #[must_use]
    pub fn from_documents(documents: &[Document]) -> Self {
        let mut seen = HashSet::with_capacity(documents.len());
        let mut records = Vec::with_capacity(documents.len());

        for doc in documents {
            if !seen.insert(&doc.id) {
                tracing::warn!(task_id = %doc.id, "duplicate document in snapshot, keeping first");
                continue;
            }
            match TaskRecord::try_from(doc) {
                Ok(record) => records.push(record),
                Err(DecodeError::PendingCreatedAt) => {
                    tracing::debug!(task_id = %doc.id, "skipping task with pending creation time");
                }
                Err(e) => {
                    tracing::warn!(task_id = %doc.id, error = %e, "skipping undecodable task");
                }
            }
        }

        records.sort_by(TaskRecord::board_order);
        Self { records }
    }

    /// Records in board order.
    #[must_use]
    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn get(&self, id: &DocId) -> Option<&TaskRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the mirror holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
