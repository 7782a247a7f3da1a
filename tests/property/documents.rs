//! Property-based tests for the document model and store protocol.
//!
//! Uses proptest to verify:
//! 1. Random bytes never cause a panic in the protocol decoders.
//! 2. `sort_documents` always yields a total, deterministic order.
//! 3. Decoded task records never carry a status outside the board.

use proptest::prelude::*;
use taskboard_proto::document::{
    DocId, Direction, Document, FieldValue, Fields, compare_by_field, sort_documents,
};
use taskboard_proto::store::{StoreResponse, decode_request, decode_response, encode_response};
use taskboard_proto::task::{TaskRecord, TaskStatus, field};

/// Strategy for arbitrary field values, including the sentinel.
fn arb_field_value() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        Just(FieldValue::Null),
        any::<bool>().prop_map(FieldValue::Bool),
        any::<i64>().prop_map(FieldValue::Int),
        "[^\x00]{0,32}".prop_map(FieldValue::Text),
        any::<u64>().prop_map(FieldValue::Timestamp),
        Just(FieldValue::ServerTimestamp),
    ]
}

/// Strategy for a document whose fields use the task field names.
fn arb_task_document() -> impl Strategy<Value = Document> {
    let names = prop::sample::select(vec![
        field::NAME,
        field::ASSIGNED,
        field::PRIORITY,
        field::STATUS,
        field::CREATED_AT,
        field::DUE,
    ]);
    (
        "[a-z0-9]{1,12}",
        prop::collection::btree_map(names.prop_map(str::to_string), arb_field_value(), 0..6),
    )
        .prop_map(|(id, fields): (String, Fields)| Document::new(DocId::new(id), fields))
}

proptest! {
    #[test]
    fn random_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_request(&bytes);
        let _ = decode_response(&bytes);
    }

    #[test]
    fn snapshot_frames_survive_the_wire(docs in prop::collection::vec(arb_task_document(), 0..8)) {
        let msg = StoreResponse::Snapshot { subscription_id: 1, documents: docs };
        let bytes = encode_response(&msg).unwrap();
        prop_assert_eq!(decode_response(&bytes).unwrap(), msg);
    }

    #[test]
    fn sorted_documents_are_pairwise_ordered(
        mut docs in prop::collection::vec(arb_task_document(), 0..16),
        descending in any::<bool>(),
    ) {
        let direction = if descending { Direction::Descending } else { Direction::Ascending };
        sort_documents(&mut docs, field::CREATED_AT, direction);
        for pair in docs.windows(2) {
            prop_assert_ne!(
                compare_by_field(&pair[0], &pair[1], field::CREATED_AT, direction),
                std::cmp::Ordering::Greater
            );
        }
    }

    #[test]
    fn decoded_records_have_board_status(doc in arb_task_document()) {
        if let Ok(rec) = TaskRecord::try_from(&doc) {
            prop_assert!(TaskStatus::ALL.contains(&rec.status));
            prop_assert!(!rec.name.trim().is_empty());
            prop_assert_eq!(doc.get(field::CREATED_AT), Some(&FieldValue::Timestamp(rec.created_at)));
        }
    }
}
