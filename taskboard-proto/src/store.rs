//! Store wire protocol.
//!
//! Clients and the store service exchange postcard-encoded [`StoreRequest`]
//! and [`StoreResponse`] values, one per WebSocket binary frame. Writes carry
//! a client-chosen `request_id` echoed in the reply; subscriptions are
//! identified by a store-chosen `subscription_id` once acknowledged.

use serde::{Deserialize, Serialize};

use crate::document::{DocId, Direction, Document, Fields};

/// Error type for store protocol encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Requests sent from a client to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreRequest {
    /// Open a snapshot stream over a collection.
    Subscribe {
        /// Correlates the `Subscribed` reply.
        request_id: u64,
        /// Collection to watch.
        collection: String,
        /// Field to order snapshots by.
        order_by: String,
        /// Sort direction.
        direction: Direction,
    },
    /// Close a snapshot stream. Unknown ids are ignored.
    Unsubscribe {
        /// Stream to close.
        subscription_id: u64,
    },
    /// Insert a document; the store assigns its id.
    Add {
        /// Correlates the `Added` reply.
        request_id: u64,
        /// Target collection.
        collection: String,
        /// Initial fields (may contain server timestamp sentinels).
        fields: Fields,
    },
    /// Merge fields into an existing document.
    Update {
        /// Correlates the `Done` reply.
        request_id: u64,
        /// Target collection.
        collection: String,
        /// Document to update.
        id: DocId,
        /// Fields to overwrite.
        fields: Fields,
    },
    /// Delete a document. Deleting a missing document succeeds.
    Delete {
        /// Correlates the `Done` reply.
        request_id: u64,
        /// Target collection.
        collection: String,
        /// Document to delete.
        id: DocId,
    },
}

impl StoreRequest {
    /// Returns the correlation id, if this request expects a reply.
    #[must_use]
    pub const fn request_id(&self) -> Option<u64> {
        match self {
            Self::Subscribe { request_id, .. }
            | Self::Add { request_id, .. }
            | Self::Update { request_id, .. }
            | Self::Delete { request_id, .. } => Some(*request_id),
            Self::Unsubscribe { .. } => None,
        }
    }
}

/// Reads the correlation id from the head of an encoded request without
/// decoding the rest of the frame.
///
/// Lets a server answer frames it will not decode in full (oversized or
/// corrupt past the header). Returns `None` for `Unsubscribe` and for
/// frames whose header is unreadable.
#[must_use]
pub fn peek_request_id(data: &[u8]) -> Option<u64> {
    // Postcard writes the variant index, then the fields in order; every
    // variant except `Unsubscribe` starts with `request_id`.
    let ((variant, request_id), _) = postcard::take_from_bytes::<(u32, u64)>(data).ok()?;
    match variant {
        0 | 2..=4 => Some(request_id),
        _ => None,
    }
}

/// Messages sent from the store to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreResponse {
    /// A subscription is open; snapshots follow.
    Subscribed {
        /// Echo of the request.
        request_id: u64,
        /// Identifier for subsequent `Snapshot` frames.
        subscription_id: u64,
    },
    /// Full ordered state of a watched collection.
    Snapshot {
        /// Stream this snapshot belongs to.
        subscription_id: u64,
        /// Every document, in the subscription's order.
        documents: Vec<Document>,
    },
    /// An `Add` committed.
    Added {
        /// Echo of the request.
        request_id: u64,
        /// Store-assigned id of the new document.
        id: DocId,
    },
    /// An `Update` or `Delete` committed.
    Done {
        /// Echo of the request.
        request_id: u64,
    },
    /// A request was rejected.
    Failed {
        /// Echo of the request.
        request_id: u64,
        /// Human-readable reason.
        reason: String,
    },
    /// A subscription terminated; no further snapshots follow on it.
    SubscriptionFailed {
        /// Stream that ended.
        subscription_id: u64,
        /// Human-readable reason.
        reason: String,
    },
}

/// Encodes a [`StoreRequest`] into bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if serialization fails.
pub fn encode_request(msg: &StoreRequest) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(msg).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`StoreRequest`] from bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the bytes are not a valid request.
pub fn decode_request(bytes: &[u8]) -> Result<StoreRequest, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a [`StoreResponse`] into bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if serialization fails.
pub fn encode_response(msg: &StoreResponse) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(msg).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`StoreResponse`] from bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the bytes are not a valid response.
pub fn decode_response(bytes: &[u8]) -> Result<StoreResponse, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}
