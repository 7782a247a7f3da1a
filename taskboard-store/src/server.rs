//! Store server core: shared state, WebSocket handler, and per-connection
//! request dispatch.
//!
//! Each WebSocket connection is a [`Session`]. Writes go straight to the
//! [`CollectionRegistry`]; every subscription gets a forwarder task that turns
//! collection changes into ordered [`StoreResponse::Snapshot`] frames.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use taskboard_proto::document::{Direction, sort_documents};
use taskboard_proto::store::{self, StoreRequest, StoreResponse};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::collection::CollectionRegistry;

/// Default maximum allowed request frame size in bytes (64 KB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Shared server state holding the collections and open connections.
pub struct StoreState {
    /// Every collection served by this store.
    pub registry: CollectionRegistry,
    /// Maps connection id to a channel feeding that connection's writer.
    connections: RwLock<HashMap<u64, mpsc::UnboundedSender<Message>>>,
    /// Source of connection and subscription ids.
    next_id: AtomicU64,
    /// Maximum allowed request frame size in bytes.
    max_payload_size: usize,
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreState {
    /// Creates an empty store with the default payload limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Creates an empty store with a custom payload limit.
    #[must_use]
    pub fn with_config(max_payload_size: usize) -> Self {
        Self {
            registry: CollectionRegistry::new(),
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            max_payload_size,
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a WebSocket Close frame to every connected client.
    ///
    /// Clients see their subscriptions end. Useful for graceful shutdown and
    /// for exercising client-side disconnect handling in tests.
    pub async fn close_all_connections(&self) {
        let conns = self.connections.read().await;
        for (connection_id, sender) in conns.iter() {
            tracing::info!(connection_id, "sending close frame to client");
            let _ = sender.send(Message::Close(None));
        }
    }
}

/// Per-connection state: the outgoing channel and live subscriptions.
struct Session {
    connection_id: u64,
    state: Arc<StoreState>,
    tx: mpsc::UnboundedSender<Message>,
    forwarders: HashMap<u64, JoinHandle<()>>,
}

impl Session {
    fn new(
        connection_id: u64,
        state: Arc<StoreState>,
        tx: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            connection_id,
            state,
            tx,
            forwarders: HashMap::new(),
        }
    }

    /// Answers a frame that will not be dispatched, if it carries a request id.
    fn refuse(&self, data: &[u8], reason: String) {
        if let Some(request_id) = store::peek_request_id(data) {
            self.send(&StoreResponse::Failed { request_id, reason });
        }
    }

    fn send(&self, msg: &StoreResponse) {
        send_on(&self.tx, msg);
    }

    /// Checks, decodes and dispatches one binary frame.
    ///
    /// Frames over the size limit are refused before decoding. A refused or
    /// undecodable frame gets `Failed` when its header names a request.
    async fn handle_frame(&mut self, data: &[u8]) {
        if data.len() > self.state.max_payload_size {
            tracing::warn!(
                connection_id = self.connection_id,
                size = data.len(),
                max = self.state.max_payload_size,
                "request exceeds size limit"
            );
            self.refuse(
                data,
                format!(
                    "payload too large: {} bytes (max {})",
                    data.len(),
                    self.state.max_payload_size
                ),
            );
            return;
        }

        let request = match store::decode_request(data) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(connection_id = self.connection_id, error = %e, "failed to decode request");
                self.refuse(data, format!("malformed request: {e}"));
                return;
            }
        };

        match request {
            StoreRequest::Subscribe {
                request_id,
                collection,
                order_by,
                direction,
            } => {
                self.subscribe(request_id, collection, order_by, direction)
                    .await;
            }
            StoreRequest::Unsubscribe { subscription_id } => {
                if let Some(handle) = self.forwarders.remove(&subscription_id) {
                    handle.abort();
                    tracing::debug!(connection_id = self.connection_id, subscription_id, "unsubscribed");
                }
            }
            StoreRequest::Add {
                request_id,
                collection,
                fields,
            } => {
                let id = self.state.registry.add(&collection, fields).await;
                tracing::debug!(collection = %collection, id = %id, "document added");
                self.send(&StoreResponse::Added { request_id, id });
            }
            StoreRequest::Update {
                request_id,
                collection,
                id,
                fields,
            } => match self.state.registry.update(&collection, &id, fields).await {
                Ok(()) => {
                    tracing::debug!(collection = %collection, id = %id, "document updated");
                    self.send(&StoreResponse::Done { request_id });
                }
                Err(e) => {
                    tracing::debug!(collection = %collection, id = %id, error = %e, "update rejected");
                    self.send(&StoreResponse::Failed {
                        request_id,
                        reason: e.to_string(),
                    });
                }
            },
            StoreRequest::Delete {
                request_id,
                collection,
                id,
            } => {
                let existed = self.state.registry.delete(&collection, &id).await;
                tracing::debug!(collection = %collection, id = %id, existed, "document deleted");
                self.send(&StoreResponse::Done { request_id });
            }
        }
    }

    /// Acknowledges a subscription and spawns its snapshot forwarder.
    async fn subscribe(
        &mut self,
        request_id: u64,
        collection: String,
        order_by: String,
        direction: Direction,
    ) {
        let subscription_id = self.state.next_id();
        let mut changes = self.state.registry.watch(&collection).await;

        // Queued before the forwarder exists, so the ack precedes the first snapshot.
        self.send(&StoreResponse::Subscribed {
            request_id,
            subscription_id,
        });
        tracing::info!(
            connection_id = self.connection_id,
            subscription_id,
            collection = %collection,
            "subscription opened"
        );

        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let mut documents = Vec::clone(&changes.borrow_and_update());
                sort_documents(&mut documents, &order_by, direction);
                let snapshot = StoreResponse::Snapshot {
                    subscription_id,
                    documents,
                };
                if !send_on(&tx, &snapshot) {
                    return;
                }
            }
            send_on(
                &tx,
                &StoreResponse::SubscriptionFailed {
                    subscription_id,
                    reason: "collection closed".to_string(),
                },
            );
        });
        self.forwarders.insert(subscription_id, handle);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for (_, handle) in self.forwarders.drain() {
            handle.abort();
        }
    }
}

/// Encodes a response and queues it on a connection's writer channel.
///
/// Returns `false` once the connection's writer has gone away.
fn send_on(tx: &mpsc::UnboundedSender<Message>, msg: &StoreResponse) -> bool {
    match store::encode_response(msg) {
        Ok(bytes) => tx.send(Message::Binary(bytes.into())).is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode response");
            true
        }
    }
}

/// Handles an upgraded WebSocket connection for a single client.
///
/// The connection lifecycle:
/// 1. Register the connection's writer channel.
/// 2. Spawn a writer task draining that channel into the socket.
/// 3. Read and dispatch requests until the client disconnects.
/// 4. Tear down subscriptions and unregister.
pub async fn handle_socket(socket: WebSocket, state: Arc<StoreState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = state.next_id();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    state
        .connections
        .write()
        .await
        .insert(connection_id, tx.clone());
    tracing::info!(connection_id, "client connected");

    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(connection_id, "WebSocket write failed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let mut read_task = tokio::spawn(async move {
        let mut session = Session::new(connection_id, reader_state, tx);
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => session.handle_frame(&data).await,
                Message::Close(_) => {
                    tracing::info!(connection_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    state.connections.write().await.remove(&connection_id);
    tracing::info!(connection_id, "client disconnected");
}

/// Starts the store server on the given address and returns the bound
/// address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(StoreState::new())).await
}

/// Starts the store server with a pre-configured [`StoreState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<StoreState>,
) -> Result<
    (std::net::SocketAddr, JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "store server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<StoreState>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}
