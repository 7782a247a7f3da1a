//! Integration tests for the board sync engine against the in-process store.
//!
//! # Verification Focus
//!
//! - Created tasks appear once, in `To Do`, with the submitted fields
//! - Invalid input never reaches the store
//! - Status changes and removals move cards between columns
//! - Mirror order is newest first
//! - Repeated `start()` opens a single subscription
//! - The latest snapshot wins

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use taskboard::board::{Board, BoardPartitioner};
use taskboard::remote::memory::MemoryStore;
use taskboard::sync::{
    BoardView, Mirror, SyncEngine, SyncError, SyncOptions, SyncPhase, ValidationError,
};
use taskboard_proto::document::{DocId, Direction, Document, FieldValue, Fields};
use taskboard_proto::task::{COLLECTION, NewTask, Priority, TaskPatch, TaskStatus, field};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn setup() -> (Arc<MemoryStore>, SyncEngine<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(Arc::clone(&store), SyncOptions::default());
    (store, engine)
}

async fn started() -> (Arc<MemoryStore>, SyncEngine<MemoryStore>) {
    let (store, engine) = setup();
    engine.start().await.unwrap();
    wait_for(&engine, |v| v.phase == SyncPhase::Live).await;
    (store, engine)
}

/// Waits until the view satisfies `pred`, failing after two seconds.
async fn wait_for(
    engine: &SyncEngine<MemoryStore>,
    pred: impl Fn(&BoardView) -> bool,
) -> BoardView {
    let mut rx = engine.subscribe_view();
    tokio::time::timeout(Duration::from_secs(2), async {
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

async fn wait_for_board(
    engine: &SyncEngine<MemoryStore>,
    pred: impl Fn(&Board) -> bool,
) -> Board {
    let view = wait_for(engine, |v| pred(&BoardPartitioner::partition(&v.mirror))).await;
    BoardPartitioner::partition(&view.mirror)
}

fn raw(id: &str, name: &str, created_at: u64) -> Document {
    let mut f = Fields::new();
    f.insert(field::NAME.to_string(), FieldValue::from(name));
    f.insert(field::STATUS.to_string(), FieldValue::from("To Do"));
    f.insert(field::CREATED_AT.to_string(), FieldValue::Timestamp(created_at));
    Document::new(DocId::new(id), f)
}

fn ids_in(board: &Board, status: TaskStatus) -> Vec<DocId> {
    board
        .column(status)
        .cards
        .iter()
        .map(|c| c.record.id.clone())
        .collect()
}

// ===========================================================================
// Create
// ===========================================================================

#[tokio::test]
async fn create_appears_once_in_todo() {
    let (_store, engine) = started().await;

    let id = engine
        .create(NewTask {
            name: "  Ship it  ".to_string(),
            assigned_to: "sam".to_string(),
            priority: Priority::High,
            due_at: Some(1_000),
        })
        .await
        .unwrap();

    let view = wait_for(&engine, |v| v.mirror.len() == 1).await;
    let rec = view.mirror.get(&id).unwrap();
    assert_eq!(rec.name, "Ship it");
    assert_eq!(rec.assigned_to, "sam");
    assert_eq!(rec.priority, Priority::High);
    assert_eq!(rec.status, TaskStatus::ToDo);
    assert_eq!(rec.due_at, Some(1_000));
    assert!(rec.created_at > 0, "server stamps createdAt");
}

#[tokio::test]
async fn blank_name_is_rejected_without_store_call() {
    let (store, engine) = started().await;

    for name in ["", "   ", "\t\n"] {
        let err = engine.create(NewTask::named(name)).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::NameEmpty)
        ));
    }
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn overlong_name_is_rejected_without_store_call() {
    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(
        Arc::clone(&store),
        SyncOptions {
            max_name_len: 5,
            ..SyncOptions::default()
        },
    );
    let err = engine.create(NewTask::named("abcdef")).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Validation(ValidationError::NameTooLong { max: 5 })
    ));
    assert_eq!(store.write_count(), 0);
}

// ===========================================================================
// Status changes
// ===========================================================================

#[tokio::test]
async fn change_status_moves_card_to_one_column() {
    let (_store, engine) = started().await;
    let id = engine.create(NewTask::named("move me")).await.unwrap();
    wait_for(&engine, |v| v.mirror.get(&id).is_some()).await;

    engine.change_status(&id, "Done").await.unwrap();

    let board = wait_for_board(&engine, |b| b.status_of(&id) == Some(TaskStatus::Done)).await;
    assert_eq!(ids_in(&board, TaskStatus::Done), [id.clone()]);
    assert!(ids_in(&board, TaskStatus::ToDo).is_empty());
    assert!(ids_in(&board, TaskStatus::InProgress).is_empty());
}

#[tokio::test]
async fn invalid_status_is_rejected_without_store_call() {
    let (store, engine) = started().await;
    let id = engine.create(NewTask::named("stay")).await.unwrap();
    wait_for(&engine, |v| v.mirror.get(&id).is_some()).await;
    let writes = store.write_count();

    let err = engine.change_status(&id, "Archived").await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidStatus(_)));
    assert_eq!(store.write_count(), writes);
}

#[tokio::test]
async fn lenient_status_text_is_accepted() {
    let (_store, engine) = started().await;
    let id = engine.create(NewTask::named("lenient")).await.unwrap();
    wait_for(&engine, |v| v.mirror.get(&id).is_some()).await;

    engine.change_status(&id, "in-progress").await.unwrap();
    wait_for_board(&engine, |b| b.status_of(&id) == Some(TaskStatus::InProgress)).await;
}

// ===========================================================================
// Edit and remove
// ===========================================================================

#[tokio::test]
async fn edit_updates_fields() {
    let (_store, engine) = started().await;
    let id = engine.create(NewTask::named("draft")).await.unwrap();
    wait_for(&engine, |v| v.mirror.get(&id).is_some()).await;

    engine
        .edit(
            &id,
            TaskPatch {
                name: Some("final".to_string()),
                priority: Some(Priority::Low),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();

    let view = wait_for(&engine, |v| {
        v.mirror.get(&id).is_some_and(|r| r.name == "final")
    })
    .await;
    let rec = view.mirror.get(&id).unwrap();
    assert_eq!(rec.priority, Priority::Low);
    assert_eq!(rec.status, TaskStatus::ToDo);
}

#[tokio::test]
async fn remove_clears_task_from_every_column() {
    let (_store, engine) = started().await;
    let id = engine.create(NewTask::named("short lived")).await.unwrap();
    wait_for(&engine, |v| v.mirror.get(&id).is_some()).await;

    engine.remove(&id).await.unwrap();

    let board = wait_for_board(&engine, |b| b.status_of(&id).is_none()).await;
    assert!(board.is_empty());
}

#[tokio::test]
async fn write_failure_is_reported_and_mirror_untouched() {
    let (store, engine) = started().await;
    let id = engine.create(NewTask::named("keep")).await.unwrap();
    wait_for(&engine, |v| v.mirror.get(&id).is_some()).await;

    store.set_fail_writes(Some("disk full"));
    let err = engine.change_status(&id, "Done").await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteWrite(_)));
    assert_eq!(
        engine.view().mirror.get(&id).unwrap().status,
        TaskStatus::ToDo
    );
}

// ===========================================================================
// Ordering and subscription lifecycle
// ===========================================================================

#[tokio::test]
async fn mirror_is_newest_first() {
    let (_store, engine) = started().await;
    let mut created = Vec::new();
    for name in ["first", "second", "third"] {
        created.push(engine.create(NewTask::named(name)).await.unwrap());
    }

    let view = wait_for(&engine, |v| v.mirror.len() == 3).await;
    let order: Vec<DocId> = view.mirror.records().iter().map(|r| r.id.clone()).collect();
    created.reverse();
    assert_eq!(order, created);

    let stamps: Vec<u64> = view.mirror.records().iter().map(|r| r.created_at).collect();
    assert!(stamps.windows(2).all(|w| w[0] > w[1]));
}

#[tokio::test]
async fn start_twice_opens_one_subscription() {
    let (store, engine) = setup();
    engine.start().await.unwrap();
    engine.start().await.unwrap();
    assert_eq!(store.subscriptions_opened(), 1);

    engine.create(NewTask::named("only once")).await.unwrap();
    let view = wait_for(&engine, |v| v.mirror.len() == 1).await;
    assert_eq!(view.mirror.records().len(), 1);
}

#[tokio::test]
async fn stop_releases_subscription_and_keeps_mirror() {
    let (store, engine) = started().await;
    engine.create(NewTask::named("kept")).await.unwrap();
    wait_for(&engine, |v| v.mirror.len() == 1).await;

    engine.stop();
    assert_eq!(engine.view().phase, SyncPhase::Idle);
    assert_eq!(engine.view().mirror.len(), 1);

    tokio::time::timeout(Duration::from_secs(2), async {
        while store.subscriptions_active() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscription was not released");
}

#[tokio::test]
async fn disconnect_marks_view_stale_and_restart_recovers() {
    let (store, engine) = started().await;
    engine.create(NewTask::named("survivor")).await.unwrap();
    wait_for(&engine, |v| v.mirror.len() == 1).await;

    store.drop_subscribers();
    let view = wait_for(&engine, |v| matches!(v.phase, SyncPhase::Stale { .. })).await;
    assert_eq!(view.mirror.len(), 1, "mirror is retained when stale");
    assert!(!engine.is_started());

    engine.start().await.unwrap();
    wait_for(&engine, |v| v.phase == SyncPhase::Live).await;
    assert_eq!(store.subscriptions_opened(), 2);
}

#[tokio::test]
async fn latest_snapshot_wins() {
    let (_store, engine) = started().await;

    assert!(engine.on_snapshot(&[raw("a", "one", 1), raw("b", "two", 2)]));
    assert!(engine.on_snapshot(&[raw("c", "three", 3)]));

    let view = engine.view();
    assert_eq!(view.mirror.len(), 1);
    assert_eq!(view.mirror.records()[0].id, DocId::new("c"));
}

#[tokio::test]
async fn back_to_back_writes_leave_mirror_equal_to_final_store_state() {
    let (store, engine) = started().await;

    let first = engine.create(NewTask::named("first")).await.unwrap();
    let second = engine.create(NewTask::named("second")).await.unwrap();
    engine.remove(&first).await.unwrap();

    let view = wait_for(&engine, |v| v.mirror.len() == 1 && v.mirror.get(&second).is_some()).await;
    let expected = Mirror::from_documents(&store.documents(
        COLLECTION,
        field::CREATED_AT,
        Direction::Descending,
    ));
    assert_eq!(*view.mirror, expected);
    assert!(view.mirror.get(&first).is_none());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*engine.view().mirror, expected, "no older snapshot lands afterwards");
}

// ===========================================================================
// Scenario
// ===========================================================================

#[tokio::test]
async fn task_walks_through_the_board() {
    let (_store, engine) = started().await;
    let id = engine.create(NewTask::named("journey")).await.unwrap();

    let board = wait_for_board(&engine, |b| b.status_of(&id) == Some(TaskStatus::ToDo)).await;
    assert_eq!(ids_in(&board, TaskStatus::ToDo), [id.clone()]);

    engine.change_status(&id, "In Progress").await.unwrap();
    let board =
        wait_for_board(&engine, |b| b.status_of(&id) == Some(TaskStatus::InProgress)).await;
    assert!(ids_in(&board, TaskStatus::ToDo).is_empty());
    assert_eq!(ids_in(&board, TaskStatus::InProgress), [id.clone()]);

    engine.remove(&id).await.unwrap();
    let board = wait_for_board(&engine, Board::is_empty).await;
    assert_eq!(board.len(), 0);
}
