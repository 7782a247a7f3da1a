//! End-to-end tests: sync engines over `WsStore` against the store server.
//!
//! # Verification Focus
//!
//! - Two boards on one collection converge on every write
//! - The server stamps creation time and orders newest first
//! - Collections are isolated from each other
//! - A server-side disconnect turns the view stale, mirror retained
//! - Store rejections surface as remote write errors

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use taskboard::board::BoardPartitioner;
use taskboard::remote::StoreError;
use taskboard::remote::ws::{WsStore, WsStoreOptions};
use taskboard::sync::{BoardView, SyncEngine, SyncError, SyncOptions, SyncPhase};
use taskboard_proto::document::DocId;
use taskboard_proto::task::{NewTask, Priority, TaskPatch, TaskStatus};
use taskboard_store::server::{self, StoreState};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn start_store() -> (String, Arc<StoreState>) {
    let state = Arc::new(StoreState::new());
    let (addr, _handle) = server::start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start store server");
    (format!("ws://{addr}/ws"), state)
}

async fn board(url: &str, collection: &str) -> SyncEngine<WsStore> {
    let store = WsStore::connect(url, WsStoreOptions::default())
        .await
        .expect("failed to connect to store");
    let engine = SyncEngine::new(
        Arc::new(store),
        SyncOptions {
            collection: collection.to_string(),
            ..SyncOptions::default()
        },
    );
    engine.start().await.expect("failed to start sync");
    wait_for(&engine, |v| v.phase == SyncPhase::Live).await;
    engine
}

async fn wait_for(
    engine: &SyncEngine<WsStore>,
    pred: impl Fn(&BoardView) -> bool,
) -> BoardView {
    let mut rx = engine.subscribe_view();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = rx.borrow_and_update().clone();
            if pred(&view) {
                return view;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("view did not reach expected state")
}

fn status_of(view: &BoardView, id: &DocId) -> Option<TaskStatus> {
    BoardPartitioner::partition(&view.mirror).status_of(id)
}

// ===========================================================================
// Convergence
// ===========================================================================

#[tokio::test]
async fn two_boards_converge() {
    let (url, _state) = start_store().await;
    let alice = board(&url, "tasks").await;
    let bob = board(&url, "tasks").await;

    let id = alice
        .create(NewTask {
            assigned_to: "bob".to_string(),
            priority: Priority::High,
            ..NewTask::named("Review PR")
        })
        .await
        .unwrap();

    let seen = wait_for(&bob, |v| v.mirror.get(&id).is_some()).await;
    let rec = seen.mirror.get(&id).unwrap();
    assert_eq!(rec.name, "Review PR");
    assert_eq!(rec.assigned_to, "bob");
    assert_eq!(rec.priority, Priority::High);
    assert_eq!(rec.status, TaskStatus::ToDo);

    bob.change_status(&id, "In Progress").await.unwrap();
    wait_for(&alice, |v| status_of(v, &id) == Some(TaskStatus::InProgress)).await;

    alice
        .edit(
            &id,
            TaskPatch {
                due_at: Some(Some(1_772_323_200_000)),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();
    wait_for(&bob, |v| {
        v.mirror
            .get(&id)
            .is_some_and(|r| r.due_at == Some(1_772_323_200_000))
    })
    .await;

    bob.remove(&id).await.unwrap();
    wait_for(&alice, |v| v.mirror.is_empty()).await;
}

#[tokio::test]
async fn server_orders_newest_first() {
    let (url, _state) = start_store().await;
    let engine = board(&url, "tasks").await;

    let first = engine.create(NewTask::named("first")).await.unwrap();
    let second = engine.create(NewTask::named("second")).await.unwrap();

    let view = wait_for(&engine, |v| v.mirror.len() == 2).await;
    let records = view.mirror.records();
    assert_eq!(records[0].id, second);
    assert_eq!(records[1].id, first);
    assert!(records[0].created_at > records[1].created_at);
}

#[tokio::test]
async fn collections_are_isolated() {
    let (url, _state) = start_store().await;
    let sprint = board(&url, "sprint").await;
    let backlog = board(&url, "backlog").await;

    sprint.create(NewTask::named("sprint task")).await.unwrap();
    wait_for(&sprint, |v| v.mirror.len() == 1).await;

    // A write to backlog proves the backlog stream is live and still empty
    // of sprint tasks.
    let id = backlog.create(NewTask::named("backlog task")).await.unwrap();
    let view = wait_for(&backlog, |v| v.mirror.get(&id).is_some()).await;
    assert_eq!(view.mirror.len(), 1);
}

// ===========================================================================
// Failures
// ===========================================================================

#[tokio::test]
async fn disconnect_turns_view_stale() {
    let (url, state) = start_store().await;
    let engine = board(&url, "tasks").await;
    engine.create(NewTask::named("kept")).await.unwrap();
    wait_for(&engine, |v| v.mirror.len() == 1).await;

    state.close_all_connections().await;

    let view = wait_for(&engine, |v| matches!(v.phase, SyncPhase::Stale { .. })).await;
    assert_eq!(view.mirror.len(), 1, "mirror is retained when stale");

    let err = engine.create(NewTask::named("lost")).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::RemoteWrite(StoreError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn status_change_of_deleted_task_is_rejected() {
    let (url, _state) = start_store().await;
    let engine = board(&url, "tasks").await;

    let err = engine
        .change_status(&DocId::new("ghost"), "Done")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::RemoteWrite(StoreError::Rejected(_))
    ));
}
