//! Remote document store abstraction.
//!
//! Defines the [`RemoteStore`] trait the sync engine talks to. Concrete
//! implementations:
//! - [`memory::MemoryStore`]: in-process store for tests and offline mode
//! - [`ws::WsStore`]: client for the `taskboard-store` WebSocket service

pub mod memory;
pub mod ws;

use std::fmt;

use taskboard_proto::document::{DocId, Direction, Document, Fields};
use tokio::sync::mpsc;

/// Errors surfaced at the remote store boundary.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The connection to the store has been closed.
    #[error("connection to store closed")]
    ConnectionClosed,

    /// The store did not answer in time.
    #[error("store operation timed out")]
    Timeout,

    /// The store could not be reached.
    #[error("store at {0} is unreachable")]
    Unreachable(String),

    /// The store refused the request.
    #[error("store rejected request: {0}")]
    Rejected(String),

    /// The addressed document does not exist.
    #[error("document {0} not found")]
    NotFound(DocId),

    /// A frame could not be encoded or decoded.
    #[error("store codec error: {0}")]
    Codec(String),

    /// An underlying I/O error occurred.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One item of a subscription stream: a full ordered snapshot, or the error
/// that ended the stream.
pub type SnapshotResult = Result<Vec<Document>, StoreError>;

/// A live stream of full-collection snapshots.
///
/// Dropping the subscription releases it at the store. An `Err` item is
/// terminal: nothing follows it.
pub struct Subscription {
    rx: mpsc::Receiver<SnapshotResult>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps a snapshot channel. Closing the channel is the only release.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<SnapshotResult>) -> Self {
        Self { rx, on_cancel: None }
    }

    /// Wraps a snapshot channel with a hook run once when the subscription
    /// is dropped.
    #[must_use]
    pub fn with_cancel(
        rx: mpsc::Receiver<SnapshotResult>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the store side has gone away without reporting
    /// an error.
    pub async fn next_snapshot(&mut self) -> Option<SnapshotResult> {
        self.rx.recv().await
    }

    /// Releases the subscription.
    pub fn cancel(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancellable", &self.on_cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(on_cancel) = self.on_cancel.take() {
            on_cancel();
        }
    }
}

/// Async document store with push-based snapshot subscriptions.
///
/// The store is authoritative: it assigns ids and resolves
/// [`FieldValue::ServerTimestamp`](taskboard_proto::document::FieldValue::ServerTimestamp)
/// sentinels. Writes report only commit or failure; their effect is observed
/// through the next snapshot.
pub trait RemoteStore: Send + Sync + 'static {
    /// Opens a snapshot stream over `collection` ordered by `order_by`.
    ///
    /// The current state is delivered first, then one snapshot per change.
    fn subscribe(
        &self,
        collection: &str,
        order_by: &str,
        direction: Direction,
    ) -> impl std::future::Future<Output = Result<Subscription, StoreError>> + Send;

    /// Inserts a document and returns its store-assigned id.
    fn add(
        &self,
        collection: &str,
        fields: Fields,
    ) -> impl std::future::Future<Output = Result<DocId, StoreError>> + Send;

    /// Merges `fields` into an existing document.
    fn update(
        &self,
        collection: &str,
        id: &DocId,
        fields: Fields,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Deletes a document. Deleting a missing document succeeds.
    fn delete(
        &self,
        collection: &str,
        id: &DocId,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}
