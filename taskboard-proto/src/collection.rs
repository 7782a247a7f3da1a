//! In-memory document collection with store-side timestamps.
//!
//! [`Collection`] holds the write semantics every store implementation shares:
//! ids are generated on insert, server timestamp sentinels are resolved from a
//! [`MonotonicClock`], updates merge fields into an existing document, and
//! deletes are idempotent. It is synchronous; callers wrap it in their own
//! locking.
//!
//! [`PublishedCollection`] pairs a [`Collection`] with a [`watch`] channel
//! that carries the document set after every committed write.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::watch;

use crate::document::{DocId, Direction, Document, Fields, resolve_server_timestamps, sort_documents};

/// Errors returned by [`Collection`] writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// The document to update does not exist.
    #[error("document not found: {0}")]
    NotFound(DocId),
}

/// Wall clock that never returns the same millisecond twice.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: u64,
}

impl MonotonicClock {
    /// Creates a clock with no readings yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Returns the current time in milliseconds since epoch, bumped past the
    /// previous reading if the wall clock stalled or went backwards.
    pub fn now(&mut self) -> u64 {
        let wall = u64::try_from(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
        )
        .unwrap_or(u64::MAX);
        let next = wall.max(self.last.saturating_add(1));
        self.last = next;
        next
    }
}

/// An unordered set of documents keyed by id.
#[derive(Debug, Default)]
pub struct Collection {
    documents: HashMap<DocId, Document>,
    clock: MonotonicClock,
}

impl Collection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new document and returns its generated id.
    pub fn insert(&mut self, mut fields: Fields) -> DocId {
        resolve_server_timestamps(&mut fields, self.clock.now());
        let id = DocId::generate();
        self.documents
            .insert(id.clone(), Document::new(id.clone(), fields));
        id
    }

    /// Merges `fields` into an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::NotFound`] if no document has this id.
    pub fn merge(&mut self, id: &DocId, mut fields: Fields) -> Result<(), CollectionError> {
        let now = self.clock.now();
        let doc = self
            .documents
            .get_mut(id)
            .ok_or_else(|| CollectionError::NotFound(id.clone()))?;
        resolve_server_timestamps(&mut fields, now);
        doc.fields.extend(fields);
        Ok(())
    }

    /// Removes a document, returning whether it existed.
    pub fn remove(&mut self, id: &DocId) -> bool {
        self.documents.remove(id).is_some()
    }

    /// Returns the number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns `true` if the collection holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Returns every document in unspecified order.
    #[must_use]
    pub fn documents(&self) -> Vec<Document> {
        self.documents.values().cloned().collect()
    }

    /// Returns every document sorted by `order_by`.
    #[must_use]
    pub fn snapshot(&self, order_by: &str, direction: Direction) -> Vec<Document> {
        let mut docs = self.documents();
        sort_documents(&mut docs, order_by, direction);
        docs
    }
}

/// Unordered documents of one collection as of the last committed write.
pub type SharedDocuments = Arc<Vec<Document>>;

/// A [`Collection`] that announces its new state after each write.
pub struct PublishedCollection {
    collection: Collection,
    changes: watch::Sender<SharedDocuments>,
}

impl Default for PublishedCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishedCollection {
    /// Creates an empty collection with nothing published yet.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _rx) = watch::channel(Arc::new(Vec::new()));
        Self {
            collection: Collection::new(),
            changes,
        }
    }

    /// Read access to the underlying documents.
    #[must_use]
    pub const fn collection(&self) -> &Collection {
        &self.collection
    }

    /// Inserts a document and publishes.
    pub fn insert(&mut self, fields: Fields) -> DocId {
        let id = self.collection.insert(fields);
        self.publish();
        id
    }

    /// Merges fields into a document and publishes.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::NotFound`] if the document does not exist;
    /// nothing is published then.
    pub fn merge(&mut self, id: &DocId, fields: Fields) -> Result<(), CollectionError> {
        self.collection.merge(id, fields)?;
        self.publish();
        Ok(())
    }

    /// Removes a document, publishing only if it existed.
    pub fn remove(&mut self, id: &DocId) -> bool {
        let existed = self.collection.remove(id);
        if existed {
            self.publish();
        }
        existed
    }

    /// Returns a receiver already marked as changed, so the current state
    /// is seen before any later write.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SharedDocuments> {
        let mut rx = self.changes.subscribe();
        rx.mark_changed();
        rx
    }

    fn publish(&self) {
        self.changes
            .send_replace(Arc::new(self.collection.documents()));
    }
}
