//! In-process document store.
//!
//! [`MemoryStore`] implements [`RemoteStore`] over the same
//! [`PublishedCollection`] the store service uses for snapshot fan-out. It
//! backs the offline demo mode and the engine tests, and carries a few hooks
//! for fault injection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use taskboard_proto::collection::{CollectionError, PublishedCollection};
use taskboard_proto::document::{DocId, Direction, Document, Fields, sort_documents};
use tokio::sync::{broadcast, mpsc};

use super::{RemoteStore, StoreError, Subscription};

/// Default per-subscription snapshot buffer.
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
struct Inner {
    slots: HashMap<String, PublishedCollection>,
    /// When set, every write fails with this reason.
    fail_writes: Option<String>,
}

impl Inner {
    fn slot(&mut self, collection: &str) -> &mut PublishedCollection {
        self.slots.entry(collection.to_string()).or_default()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        match &self.fail_writes {
            Some(reason) => Err(StoreError::Rejected(reason.clone())),
            None => Ok(()),
        }
    }
}

/// In-memory [`RemoteStore`] implementation.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// Fired to end every open subscription with an error.
    disconnect: broadcast::Sender<()>,
    channel_capacity: usize,
    writes: AtomicUsize,
    subscriptions_opened: AtomicUsize,
    subscriptions_active: Arc<AtomicUsize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates an empty store whose subscriptions buffer up to `capacity`
    /// undelivered snapshots.
    #[must_use]
    pub fn with_channel_capacity(capacity: usize) -> Self {
        let (disconnect, _) = broadcast::channel(1);
        Self {
            inner: Mutex::new(Inner::default()),
            disconnect,
            channel_capacity: capacity.max(1),
            writes: AtomicUsize::new(0),
            subscriptions_opened: AtomicUsize::new(0),
            subscriptions_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes every subsequent write fail with `reason`, or clears the fault
    /// when `None`.
    pub fn set_fail_writes(&self, reason: Option<&str>) {
        self.inner.lock().fail_writes = reason.map(str::to_string);
    }

    /// Ends every open subscription with [`StoreError::ConnectionClosed`].
    ///
    /// The stored documents are kept.
    pub fn drop_subscribers(&self) {
        let _ = self.disconnect.send(());
    }

    /// Number of write calls (add, update, delete) received, failed or not.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of subscriptions ever opened.
    pub fn subscriptions_opened(&self) -> usize {
        self.subscriptions_opened.load(Ordering::SeqCst)
    }

    /// Number of subscriptions whose forwarder is still running.
    pub fn subscriptions_active(&self) -> usize {
        self.subscriptions_active.load(Ordering::SeqCst)
    }

    /// Returns the documents of a collection in the given order.
    pub fn documents(&self, collection: &str, order_by: &str, direction: Direction) -> Vec<Document> {
        self.inner
            .lock()
            .slots
            .get(collection)
            .map(|s| s.collection().snapshot(order_by, direction))
            .unwrap_or_default()
    }
}

impl RemoteStore for MemoryStore {
    async fn subscribe(
        &self,
        collection: &str,
        order_by: &str,
        direction: Direction,
    ) -> Result<Subscription, StoreError> {
        let mut changes = self.inner.lock().slot(collection).watch();
        let mut disconnect = self.disconnect.subscribe();
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let order_by = order_by.to_string();

        self.subscriptions_opened.fetch_add(1, Ordering::SeqCst);
        let active = Arc::clone(&self.subscriptions_active);
        active.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(collection, order_by = %order_by, "memory subscription opened");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    _ = disconnect.recv() => {
                        let _ = tx.send(Err(StoreError::ConnectionClosed)).await;
                        break;
                    }
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let mut documents = Vec::clone(&changes.borrow_and_update());
                        sort_documents(&mut documents, &order_by, direction);
                        if tx.send(Ok(documents)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            active.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(Subscription::new(rx))
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<DocId, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.check_writable()?;
        Ok(inner.slot(collection).insert(fields))
    }

    async fn update(&self, collection: &str, id: &DocId, fields: Fields) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.check_writable()?;
        inner
            .slot(collection)
            .merge(id, fields)
            .map_err(|CollectionError::NotFound(id)| StoreError::NotFound(id))
    }

    async fn delete(&self, collection: &str, id: &DocId) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.check_writable()?;
        inner.slot(collection).remove(id);
        Ok(())
    }
}
