//! The sync engine: one subscription in, whole-mirror replacement out.
//!
//! A single pump task drains the store [`Subscription`] and is the only
//! writer of the published [`BoardView`]. Readers take cheap clones of the
//! view (the mirror sits behind an `Arc`) from a `watch` channel.
//!
//! The lifecycle lock is held while a snapshot is checked against the current
//! generation and published, and [`SyncEngine::stop`] bumps the generation
//! under the same lock. Once `stop` returns, no snapshot from the old
//! subscription can reach the view.

use std::sync::Arc;

use parking_lot::Mutex;
use taskboard_proto::document::{DocId, Direction, Document, Fields};
use taskboard_proto::task::{COLLECTION, MAX_TASK_NAME_LENGTH, NewTask, TaskPatch, field, status_fields};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::mirror::Mirror;
use super::status::{TaskStatusMachine, Transition};
use super::{SyncError, ValidationError, validate_name};
use crate::remote::{RemoteStore, Subscription};

/// Where the engine stands with respect to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    /// Not started, or stopped.
    Idle,
    /// Subscribed, waiting for the first snapshot.
    Loading,
    /// The mirror reflects the latest snapshot.
    Live,
    /// The subscription failed; the mirror holds the last snapshot received.
    Stale {
        /// Why the stream ended.
        reason: String,
    },
}

/// What the display layer renders: the phase plus the current mirror.
#[derive(Debug, Clone)]
pub struct BoardView {
    /// Sync phase.
    pub phase: SyncPhase,
    /// Current mirror.
    pub mirror: Arc<Mirror>,
}

impl Default for BoardView {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Idle,
            mirror: Arc::new(Mirror::default()),
        }
    }
}

/// Engine settings.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Collection holding the tasks.
    pub collection: String,
    /// Maximum task name length in characters.
    pub max_name_len: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            collection: COLLECTION.to_string(),
            max_name_len: MAX_TASK_NAME_LENGTH,
        }
    }
}

enum Lifecycle {
    Idle,
    Starting,
    Running(JoinHandle<()>),
}

struct State {
    lifecycle: Lifecycle,
    /// Bumped by every start and stop; snapshots carry the generation of the
    /// subscription they came from.
    generation: u64,
}

/// State shared between the engine handle and its pump task.
struct Core {
    state: Mutex<State>,
    view: watch::Sender<BoardView>,
}

impl Core {
    fn set_phase(&self, phase: SyncPhase) {
        self.view.send_modify(|view| view.phase = phase);
    }

    /// Publishes a snapshot if it belongs to `generation`, or to whatever
    /// subscription is active when `generation` is `None`.
    fn publish(&self, generation: Option<u64>, documents: &[Document]) -> bool {
        let mirror = Arc::new(Mirror::from_documents(documents));
        let state = self.state.lock();
        let current = match generation {
            Some(g) => g == state.generation,
            None => !matches!(state.lifecycle, Lifecycle::Idle),
        };
        if !current {
            tracing::debug!(documents = documents.len(), "discarding snapshot from stopped subscription");
            return false;
        }
        tracing::debug!(documents = documents.len(), tasks = mirror.len(), "snapshot applied");
        self.view.send_replace(BoardView {
            phase: SyncPhase::Live,
            mirror,
        });
        true
    }

    /// Marks the view stale after the subscription of `generation` ended.
    fn fail(&self, generation: u64, reason: String) {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        tracing::warn!(reason = %reason, "subscription ended, keeping last snapshot");
        state.lifecycle = Lifecycle::Idle;
        self.set_phase(SyncPhase::Stale { reason });
    }
}

/// Keeps a live [`Mirror`] of the task collection and forwards mutations.
pub struct SyncEngine<S: RemoteStore> {
    store: Arc<S>,
    options: SyncOptions,
    core: Arc<Core>,
}

impl<S: RemoteStore> SyncEngine<S> {
    /// Creates an engine over `store`. Nothing happens until [`start`](Self::start).
    pub fn new(store: Arc<S>, options: SyncOptions) -> Self {
        let (view, _) = watch::channel(BoardView::default());
        Self {
            store,
            options,
            core: Arc::new(Core {
                state: Mutex::new(State {
                    lifecycle: Lifecycle::Idle,
                    generation: 0,
                }),
                view,
            }),
        }
    }

    /// Opens the subscription and starts applying snapshots.
    ///
    /// Calling `start` while started (or starting) does nothing. After the
    /// stream has failed, `start` opens a fresh subscription.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Subscription`] if the store refuses the
    /// subscription; the view turns [`SyncPhase::Stale`].
    pub async fn start(&self) -> Result<(), SyncError> {
        let generation = {
            let mut state = self.core.state.lock();
            if !matches!(state.lifecycle, Lifecycle::Idle) {
                return Ok(());
            }
            state.lifecycle = Lifecycle::Starting;
            state.generation += 1;
            self.core.set_phase(SyncPhase::Loading);
            state.generation
        };

        let opened = self
            .store
            .subscribe(&self.options.collection, field::CREATED_AT, Direction::Descending)
            .await;

        let subscription = match opened {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(collection = %self.options.collection, error = %e, "subscribe failed");
                self.core.fail(generation, e.to_string());
                return Err(SyncError::Subscription(e));
            }
        };

        let mut state = self.core.state.lock();
        if state.generation != generation {
            // Stopped while the subscription was being opened.
            drop(state);
            subscription.cancel();
            return Ok(());
        }
        // Spawned under the lock so an immediately failing pump cannot
        // reset the lifecycle before it is recorded as running.
        let handle = tokio::spawn(pump(Arc::clone(&self.core), subscription, generation));
        state.lifecycle = Lifecycle::Running(handle);
        tracing::info!(collection = %self.options.collection, "sync started");
        Ok(())
    }

    /// Releases the subscription.
    ///
    /// The mirror is kept but no snapshot is applied after this returns,
    /// including ones already in flight.
    pub fn stop(&self) {
        let mut state = self.core.state.lock();
        state.generation += 1;
        let previous = std::mem::replace(&mut state.lifecycle, Lifecycle::Idle);
        if let Lifecycle::Running(handle) = previous {
            handle.abort();
            tracing::info!(collection = %self.options.collection, "sync stopped");
        }
        self.core.set_phase(SyncPhase::Idle);
    }

    /// Whether a subscription is open or being opened.
    #[must_use]
    pub fn is_started(&self) -> bool {
        !matches!(self.core.state.lock().lifecycle, Lifecycle::Idle)
    }

    /// Replaces the mirror with a raw snapshot.
    ///
    /// Ignored (returns `false`) while the engine is stopped.
    pub fn on_snapshot(&self, documents: &[Document]) -> bool {
        self.core.publish(None, documents)
    }

    /// The current view.
    #[must_use]
    pub fn view(&self) -> BoardView {
        self.core.view.borrow().clone()
    }

    /// A receiver notified on every view change.
    #[must_use]
    pub fn subscribe_view(&self) -> watch::Receiver<BoardView> {
        self.core.view.subscribe()
    }

    /// Submits a new task. It shows up in `To Do` with the next snapshot.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Validation`] if the name is blank or too long; the
    ///   store is not contacted.
    /// - [`SyncError::RemoteWrite`] if the store fails the insert.
    pub async fn create(&self, task: NewTask) -> Result<DocId, SyncError> {
        validate_name(&task.name, self.options.max_name_len)?;
        let id = self
            .store
            .add(&self.options.collection, task.into_fields())
            .await
            .map_err(|e| {
                tracing::warn!(collection = %self.options.collection, error = %e, "task create failed");
                SyncError::RemoteWrite(e)
            })?;
        tracing::info!(task_id = %id, "task created");
        Ok(id)
    }

    /// Moves a task to the column named by `requested`.
    ///
    /// The update is always sent, whatever the mirror shows: the mirror may
    /// lag the store or be stale.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidStatus`] if `requested` is not a column; the
    ///   store is not contacted.
    /// - [`SyncError::RemoteWrite`] if the store fails the update.
    pub async fn change_status(&self, id: &DocId, requested: &str) -> Result<Transition, SyncError> {
        let current = self.core.view.borrow().mirror.get(id).map(|r| r.status);
        let transition = TaskStatusMachine::transition(current, requested)?;
        self.write_update(id, status_fields(transition.to)).await?;
        tracing::info!(task_id = %id, status = %transition.to, "task status changed");
        Ok(transition)
    }

    /// Applies a partial edit to a task's fields.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Validation`] for an empty patch or an invalid name.
    /// - [`SyncError::RemoteWrite`] if the store fails the update.
    pub async fn edit(&self, id: &DocId, patch: TaskPatch) -> Result<(), SyncError> {
        if patch.is_empty() {
            return Err(ValidationError::EmptyPatch.into());
        }
        if let Some(name) = &patch.name {
            validate_name(name, self.options.max_name_len)?;
        }
        self.write_update(id, patch.into_fields()).await?;
        tracing::info!(task_id = %id, "task edited");
        Ok(())
    }

    /// Deletes a task. It leaves the board with the next snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RemoteWrite`] if the store fails the delete.
    pub async fn remove(&self, id: &DocId) -> Result<(), SyncError> {
        self.store
            .delete(&self.options.collection, id)
            .await
            .map_err(|e| {
                tracing::warn!(task_id = %id, error = %e, "task delete failed");
                SyncError::RemoteWrite(e)
            })?;
        tracing::info!(task_id = %id, "task removed");
        Ok(())
    }

    async fn write_update(&self, id: &DocId, fields: Fields) -> Result<(), SyncError> {
        self.store
            .update(&self.options.collection, id, fields)
            .await
            .map_err(|e| {
                tracing::warn!(task_id = %id, error = %e, "task update failed");
                SyncError::RemoteWrite(e)
            })
    }
}

impl<S: RemoteStore> Drop for SyncEngine<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Applies snapshots from `subscription` until it ends or the engine moves
/// on to another generation.
async fn pump(core: Arc<Core>, mut subscription: Subscription, generation: u64) {
    loop {
        match subscription.next_snapshot().await {
            Some(Ok(documents)) => {
                if !core.publish(Some(generation), &documents) {
                    return;
                }
            }
            Some(Err(e)) => {
                core.fail(generation, e.to_string());
                return;
            }
            None => {
                core.fail(generation, "subscription closed by store".to_string());
                return;
            }
        }
    }
}
