//! Shared collection registry with snapshot fan-out.
//!
//! The [`CollectionRegistry`] owns every named [`PublishedCollection`]. Each
//! committed write publishes the new document set on that collection's
//! channel; subscribers sort it in their own order.

use std::collections::HashMap;

use taskboard_proto::collection::{CollectionError, PublishedCollection, SharedDocuments};
use taskboard_proto::document::{DocId, Fields};
use tokio::sync::{RwLock, watch};

/// Thread-safe registry of named collections, created on first use.
#[derive(Default)]
pub struct CollectionRegistry {
    slots: RwLock<HashMap<String, PublishedCollection>>,
}

impl CollectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document and announces the new state.
    pub async fn add(&self, collection: &str, fields: Fields) -> DocId {
        let mut slots = self.slots.write().await;
        slots.entry(collection.to_string()).or_default().insert(fields)
    }

    /// Merges fields into a document and announces the new state.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::NotFound`] if the document does not exist.
    pub async fn update(
        &self,
        collection: &str,
        id: &DocId,
        fields: Fields,
    ) -> Result<(), CollectionError> {
        let mut slots = self.slots.write().await;
        slots
            .get_mut(collection)
            .ok_or_else(|| CollectionError::NotFound(id.clone()))?
            .merge(id, fields)
    }

    /// Deletes a document, announcing the new state if it existed.
    ///
    /// Returns whether the document existed.
    pub async fn delete(&self, collection: &str, id: &DocId) -> bool {
        let mut slots = self.slots.write().await;
        slots.get_mut(collection).is_some_and(|slot| slot.remove(id))
    }

    /// Returns a change receiver for a collection, creating it if needed.
    ///
    /// The receiver starts marked as changed so the current state is
    /// delivered before any later write.
    pub async fn watch(&self, collection: &str) -> watch::Receiver<SharedDocuments> {
        let mut slots = self.slots.write().await;
        slots.entry(collection.to_string()).or_default().watch()
    }

    /// Returns the number of documents in a collection.
    pub async fn len(&self, collection: &str) -> usize {
        let slots = self.slots.read().await;
        slots.get(collection).map_or(0, |s| s.collection().len())
    }
}
