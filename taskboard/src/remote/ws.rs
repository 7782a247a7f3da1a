//! WebSocket client for the `taskboard-store` service.
//!
//! Implements [`RemoteStore`] over one WebSocket connection. Requests are
//! correlated with replies by `request_id`; snapshot frames are routed to the
//! matching [`Subscription`] by `subscription_id`.
//!
//! A single writer task owns the sink and a single reader task owns the
//! stream. When the connection drops, every pending request fails and every
//! open subscription receives [`StoreError::ConnectionClosed`]. The client
//! never reconnects on its own.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use taskboard_proto::document::{DocId, Direction, Fields};
use taskboard_proto::store::{self, StoreRequest, StoreResponse};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{RemoteStore, SnapshotResult, StoreError, Subscription};

/// Read half of the store connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Connection tuning for [`WsStore`].
#[derive(Debug, Clone)]
pub struct WsStoreOptions {
    /// Timeout for establishing the WebSocket connection.
    pub connect_timeout: Duration,
    /// Timeout for each request's reply.
    pub request_timeout: Duration,
    /// Per-subscription snapshot buffer.
    pub channel_capacity: usize,
}

impl Default for WsStoreOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            channel_capacity: 16,
        }
    }
}

/// A decoded reply to a correlated request.
#[derive(Debug)]
enum Reply {
    Subscribed(u64),
    Added(DocId),
    Done,
    Failed(String),
}

/// Requests and subscriptions awaiting frames from the reader task.
#[derive(Default)]
struct Routes {
    /// Reply slots keyed by request id.
    requests: HashMap<u64, oneshot::Sender<Reply>>,
    /// Snapshot channels for subscriptions not yet acknowledged, keyed by
    /// request id.
    opening: HashMap<u64, mpsc::Sender<SnapshotResult>>,
    /// Snapshot channels keyed by subscription id.
    live: HashMap<u64, mpsc::Sender<SnapshotResult>>,
}

struct Shared {
    routes: Mutex<Routes>,
    connected: AtomicBool,
}

/// [`RemoteStore`] backed by a `taskboard-store` server.
pub struct WsStore {
    url: String,
    outgoing: mpsc::UnboundedSender<Message>,
    shared: Arc<Shared>,
    next_request_id: AtomicU64,
    options: WsStoreOptions,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl WsStore {
    /// Connects to a store at `url` (e.g. `ws://127.0.0.1:9300/ws`).
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unreachable`] if the URL is invalid or nothing listens there.
    /// - [`StoreError::Timeout`] if the handshake does not finish in time.
    /// - [`StoreError::Io`] for other connection failures.
    pub async fn connect(url: &str, options: WsStoreOptions) -> Result<Self, StoreError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| StoreError::Unreachable(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(StoreError::Unreachable(format!(
                "{url}: unsupported scheme {}",
                parsed.scheme()
            )));
        }

        let (ws_stream, _response) =
            tokio::time::timeout(options.connect_timeout, connect_async(url))
                .await
                .map_err(|_| {
                    tracing::warn!(url, "store connect timed out");
                    StoreError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url, error = %e, "store connect failed");
                    map_ws_connect_error(url, e)
                })?;

        let (mut ws_sender, ws_reader) = ws_stream.split();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    tracing::warn!(error = %e, "store send failed");
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let shared = Arc::new(Shared {
            routes: Mutex::new(Routes::default()),
            connected: AtomicBool::new(true),
        });
        let reader = tokio::spawn(reader_loop(ws_reader, Arc::clone(&shared)));

        tracing::info!(url, "connected to store");

        Ok(Self {
            url: url.to_string(),
            outgoing,
            shared,
            next_request_id: AtomicU64::new(1),
            options,
            writer,
            reader,
        })
    }

    /// The URL this client connected to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the connection is still up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn send(&self, request: &StoreRequest) -> Result<(), StoreError> {
        send_on(&self.outgoing, request)
    }

    /// Sends a correlated request and waits for its reply.
    ///
    /// `opening` registers a snapshot channel under the same request id so
    /// the reader can route snapshots that arrive right after the ack.
    async fn call(
        &self,
        build: impl FnOnce(u64) -> StoreRequest + Send,
        opening: Option<mpsc::Sender<SnapshotResult>>,
    ) -> Result<Reply, StoreError> {
        if !self.is_connected() {
            return Err(StoreError::ConnectionClosed);
        }
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut routes = self.shared.routes.lock();
            // The reader flips `connected` before clearing routes, so a
            // registration that lands after the clear is caught here.
            if !self.is_connected() {
                return Err(StoreError::ConnectionClosed);
            }
            routes.requests.insert(request_id, reply_tx);
            if let Some(tx) = opening {
                routes.opening.insert(request_id, tx);
            }
        }

        if let Err(e) = self.send(&build(request_id)) {
            self.forget(request_id);
            return Err(e);
        }

        match tokio::time::timeout(self.options.request_timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(StoreError::ConnectionClosed),
            Err(_) => {
                tracing::warn!(request_id, "store request timed out");
                self.forget(request_id);
                Err(StoreError::Timeout)
            }
        }
    }

    fn forget(&self, request_id: u64) {
        let mut routes = self.shared.routes.lock();
        routes.requests.remove(&request_id);
        routes.opening.remove(&request_id);
    }
}

impl Drop for WsStore {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

impl RemoteStore for WsStore {
    async fn subscribe(
        &self,
        collection: &str,
        order_by: &str,
        direction: Direction,
    ) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(self.options.channel_capacity.max(1));
        let reply = self
            .call(
                |request_id| StoreRequest::Subscribe {
                    request_id,
                    collection: collection.to_string(),
                    order_by: order_by.to_string(),
                    direction,
                },
                Some(tx),
            )
            .await?;

        match reply {
            Reply::Subscribed(subscription_id) => {
                tracing::info!(collection, subscription_id, "store subscription opened");
                let shared = Arc::clone(&self.shared);
                let outgoing = self.outgoing.clone();
                Ok(Subscription::with_cancel(rx, move || {
                    shared.routes.lock().live.remove(&subscription_id);
                    let _ = send_on(&outgoing, &StoreRequest::Unsubscribe { subscription_id });
                    tracing::debug!(subscription_id, "store subscription released");
                }))
            }
            Reply::Failed(reason) => Err(StoreError::Rejected(reason)),
            other => Err(unexpected(&other)),
        }
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<DocId, StoreError> {
        let reply = self
            .call(
                |request_id| StoreRequest::Add {
                    request_id,
                    collection: collection.to_string(),
                    fields,
                },
                None,
            )
            .await?;
        match reply {
            Reply::Added(id) => Ok(id),
            Reply::Failed(reason) => Err(StoreError::Rejected(reason)),
            other => Err(unexpected(&other)),
        }
    }

    async fn update(&self, collection: &str, id: &DocId, fields: Fields) -> Result<(), StoreError> {
        let reply = self
            .call(
                |request_id| StoreRequest::Update {
                    request_id,
                    collection: collection.to_string(),
                    id: id.clone(),
                    fields,
                },
                None,
            )
            .await?;
        expect_done(reply)
    }

    async fn delete(&self, collection: &str, id: &DocId) -> Result<(), StoreError> {
        let reply = self
            .call(
                |request_id| StoreRequest::Delete {
                    request_id,
                    collection: collection.to_string(),
                    id: id.clone(),
                },
                None,
            )
            .await?;
        expect_done(reply)
    }
}

fn expect_done(reply: Reply) -> Result<(), StoreError> {
    match reply {
        Reply::Done => Ok(()),
        Reply::Failed(reason) => Err(StoreError::Rejected(reason)),
        other => Err(unexpected(&other)),
    }
}

fn unexpected(reply: &Reply) -> StoreError {
    StoreError::Codec(format!("unexpected reply: {reply:?}"))
}

fn send_on(outgoing: &mpsc::UnboundedSender<Message>, request: &StoreRequest) -> Result<(), StoreError> {
    let bytes = store::encode_request(request).map_err(|e| StoreError::Codec(e.to_string()))?;
    outgoing
        .send(Message::Binary(bytes.into()))
        .map_err(|_| StoreError::ConnectionClosed)
}

/// Background task that reads store frames and routes them.
///
/// Malformed frames are logged and skipped. On exit every pending request is
/// dropped (its caller sees [`StoreError::ConnectionClosed`]) and every live
/// subscription receives a terminal [`StoreError::ConnectionClosed`].
async fn reader_loop(mut ws_reader: WsReader, shared: Arc<Shared>) {
    while let Some(frame) = ws_reader.next().await {
        match frame {
            Ok(Message::Binary(data)) => match store::decode_response(&data) {
                Ok(response) => route(&shared, response).await,
                Err(e) => tracing::warn!(error = %e, "malformed store frame, skipping"),
            },
            Ok(Message::Close(_)) => {
                tracing::info!("store closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "store read error");
                break;
            }
        }
    }

    shared.connected.store(false, Ordering::SeqCst);
    let live: Vec<_> = {
        let mut routes = shared.routes.lock();
        routes.requests.clear();
        routes.opening.clear();
        routes.live.drain().map(|(_, tx)| tx).collect()
    };
    for tx in live {
        let _ = tx.send(Err(StoreError::ConnectionClosed)).await;
    }
    tracing::info!("store reader task exiting");
}

async fn route(shared: &Shared, response: StoreResponse) {
    match response {
        StoreResponse::Subscribed {
            request_id,
            subscription_id,
        } => {
            let reply_tx = {
                let mut routes = shared.routes.lock();
                if let Some(tx) = routes.opening.remove(&request_id) {
                    routes.live.insert(subscription_id, tx);
                }
                routes.requests.remove(&request_id)
            };
            if let Some(reply_tx) = reply_tx {
                let _ = reply_tx.send(Reply::Subscribed(subscription_id));
            }
        }
        StoreResponse::Snapshot {
            subscription_id,
            documents,
        } => {
            let tx = shared.routes.lock().live.get(&subscription_id).cloned();
            let Some(tx) = tx else {
                tracing::debug!(subscription_id, "snapshot for unknown subscription");
                return;
            };
            if tx.send(Ok(documents)).await.is_err() {
                shared.routes.lock().live.remove(&subscription_id);
            }
        }
        StoreResponse::SubscriptionFailed {
            subscription_id,
            reason,
        } => {
            tracing::warn!(subscription_id, reason = %reason, "store ended subscription");
            let tx = shared.routes.lock().live.remove(&subscription_id);
            if let Some(tx) = tx {
                let _ = tx.send(Err(StoreError::Rejected(reason))).await;
            }
        }
        StoreResponse::Added { request_id, id } => resolve(shared, request_id, Reply::Added(id)),
        StoreResponse::Done { request_id } => resolve(shared, request_id, Reply::Done),
        StoreResponse::Failed { request_id, reason } => {
            resolve(shared, request_id, Reply::Failed(reason));
        }
    }
}

fn resolve(shared: &Shared, request_id: u64, reply: Reply) {
    let reply_tx = {
        let mut routes = shared.routes.lock();
        routes.opening.remove(&request_id);
        routes.requests.remove(&request_id)
    };
    match reply_tx {
        Some(tx) => {
            let _ = tx.send(reply);
        }
        None => tracing::debug!(request_id, "reply for unknown request"),
    }
}

/// Map a `tokio_tungstenite` connection error to a [`StoreError`].
fn map_ws_connect_error(url: &str, err: tokio_tungstenite::tungstenite::Error) -> StoreError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::ConnectionRefused
                || io_err.kind() == std::io::ErrorKind::AddrNotAvailable
            {
                StoreError::Unreachable(url.to_string())
            } else {
                StoreError::Io(io_err)
            }
        }
        WsError::Http(response) => StoreError::Io(std::io::Error::other(format!(
            "store HTTP error: status {}",
            response.status()
        ))),
        other => StoreError::Io(std::io::Error::other(format!(
            "store connection error: {other}"
        ))),
    }
}
