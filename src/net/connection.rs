//! Connection lifecycle tracking and per-connection HTTP glue.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track live connections for graceful shutdown and the active gauge
//! - Translate hyper requests into inbound assembly events
//! - Expose the hyper response as an outbound [`Channel`]
//!
//! # Data Flow
//! ```text
//! hyper Request<Incoming>
//!     → acquire in-flight permit (one logical request per connection)
//!     → ReceivedHead → ReceivedBodyChunk* → ReceivedEnd
//!     → spawn: Router::route_request(request, Response(HyperChannel))
//!         → head   ──oneshot──▶ hyper Response parts
//!         → body   ──mpsc────▶ hyper Response stream body
//!         → close  (drop the body sender, ending the stream)
//!     → ProcessedRequest, permit released (also when the handler panics)
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{stream, StreamExt};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};
use tracing::Instrument;

use crate::http::channel::{Channel, ResponseHead, TransportError};
use crate::http::inbound::{InboundAnomaly, InboundAssembly, InboundEvent};
use crate::http::request::{Request, RequestHead};
use crate::http::response::Response;
use crate::observability::metrics;
use crate::routing::Router;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Body frames buffered between the dispatch task and hyper.
const BODY_BUFFER: usize = 16;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks active connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::connection_opened();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until all connections are closed or `timeout` elapses. Returns
    /// whether the drain completed.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let drained = async {
            while self.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        metrics::connection_closed();
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

/// Per-connection settings taken from the listener config.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub keep_alive: bool,
    pub max_body_bytes: usize,
}

/// Serve one accepted TCP connection until hyper is done with it.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
    settings: ConnectionSettings,
    guard: ConnectionGuard,
) {
    let id = guard.id();
    tracing::debug!(connection_id = %id, peer_addr = %peer, "Serving connection");

    let context = Arc::new(ConnectionContext::new(id, router, settings.max_body_bytes));
    let service = service_fn(move |req: hyper::Request<Incoming>| {
        let context = Arc::clone(&context);
        async move { Ok::<_, Infallible>(context.exchange(req).await) }
    });

    if let Err(err) = http1::Builder::new()
        .keep_alive(settings.keep_alive)
        .serve_connection(TokioIo::new(stream), service)
        .await
    {
        tracing::debug!(connection_id = %id, error = %err, "Connection error");
    }
    drop(guard);
}

/// State shared by every exchange on one connection.
struct ConnectionContext {
    id: ConnectionId,
    router: Arc<Router>,
    assembly: Mutex<InboundAssembly>,
    in_flight: Arc<Semaphore>,
    max_body_bytes: usize,
}

impl ConnectionContext {
    fn new(id: ConnectionId, router: Arc<Router>, max_body_bytes: usize) -> Self {
        Self {
            id,
            router,
            assembly: Mutex::new(InboundAssembly::new()),
            in_flight: Arc::new(Semaphore::new(1)),
            max_body_bytes,
        }
    }

    /// Run one hyper request through assembly and dispatch.
    async fn exchange(self: Arc<Self>, req: hyper::Request<Incoming>) -> hyper::Response<Body> {
        let Ok(permit) = Arc::clone(&self.in_flight).acquire_owned().await else {
            return plain_response(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable.");
        };

        let (parts, incoming) = req.into_parts();
        let _ = self.fire(InboundEvent::ReceivedHead(RequestHead {
            method: parts.method,
            uri: parts.uri.to_string(),
            headers: parts.headers,
        }));

        let mut received = 0usize;
        let mut chunks = Body::new(incoming).into_data_stream();
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => {
                    received += chunk.len();
                    if received > self.max_body_bytes {
                        tracing::debug!(connection_id = %self.id, received, "Request body over limit");
                        self.lock_assembly().reset();
                        return plain_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large.");
                    }
                    let _ = self.fire(InboundEvent::ReceivedBodyChunk(chunk));
                }
                Err(err) => {
                    tracing::debug!(connection_id = %self.id, error = %err, "Request body aborted");
                    self.lock_assembly().reset();
                    return plain_response(StatusCode::BAD_REQUEST, "Bad request.");
                }
            }
        }

        let Ok(Some(request)) = self.fire(InboundEvent::ReceivedEnd) else {
            self.lock_assembly().reset();
            return plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.");
        };

        let (channel, head_rx, body_rx) = HyperChannel::new();
        let response = Response::new(Arc::new(channel));
        let span = tracing::debug_span!(
            "request",
            connection_id = %self.id,
            method = %request.method(),
            uri = %request.uri(),
        );
        let mut completion = Completion {
            context: Arc::clone(&self),
            finished: false,
            _permit: permit,
        };
        tokio::spawn(
            async move {
                completion.context.router.route_request(request, response).await;
                completion.finished = true;
            }
            .instrument(span),
        );

        match head_rx.await {
            Ok(head) => hyper_response(head, body_rx),
            // dispatch task went away without answering
            Err(_) => plain_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error."),
        }
    }

    /// Feed the assembly, logging and counting anything without a transition.
    fn fire(&self, event: InboundEvent) -> Result<Option<Request>, InboundAnomaly> {
        self.lock_assembly().fire(event).inspect_err(|anomaly| {
            tracing::warn!(
                connection_id = %self.id,
                state = anomaly.state,
                event = anomaly.event,
                "Inbound event ignored"
            );
            metrics::record_inbound_anomaly(anomaly);
        })
    }

    fn lock_assembly(&self) -> MutexGuard<'_, InboundAssembly> {
        self.assembly.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Ends one dispatch cycle when the dispatch task is done with it, including
/// when the handler panicked and the task was torn down. Fires
/// `ProcessedRequest` before the in-flight permit is released.
struct Completion {
    context: Arc<ConnectionContext>,
    finished: bool,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.finished {
            tracing::error!(connection_id = %self.context.id, "Request dispatch aborted");
        }
        let _ = self.context.fire(InboundEvent::ProcessedRequest);
    }
}

/// Outbound channel backed by a pending hyper response.
pub struct HyperChannel {
    head: Mutex<Option<oneshot::Sender<ResponseHead>>>,
    body: Mutex<Option<mpsc::Sender<Bytes>>>,
}

impl HyperChannel {
    /// A channel plus the receiving ends hyper's side waits on.
    pub fn new() -> (Self, oneshot::Receiver<ResponseHead>, mpsc::Receiver<Bytes>) {
        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::channel(BODY_BUFFER);
        let channel = Self {
            head: Mutex::new(Some(head_tx)),
            body: Mutex::new(Some(body_tx)),
        };
        (channel, head_rx, body_rx)
    }

    fn body_sender(&self) -> Option<mpsc::Sender<Bytes>> {
        self.body.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Channel for HyperChannel {
    fn send_head(&self, head: ResponseHead) -> BoxFuture<'_, Result<(), TransportError>> {
        let sender = self.head.lock().unwrap_or_else(|e| e.into_inner()).take();
        Box::pin(async move {
            match sender {
                Some(sender) => sender.send(head).map_err(|_| TransportError::Closed),
                None => Err(TransportError::Write("head already sent".to_string())),
            }
        })
    }

    fn send_body(&self, chunk: Bytes) -> BoxFuture<'_, Result<(), TransportError>> {
        let sender = self.body_sender();
        Box::pin(async move {
            match sender {
                Some(sender) => sender.send(chunk).await.map_err(|_| TransportError::Closed),
                None => Err(TransportError::Closed),
            }
        })
    }

    // hyper frames the message end itself (content length or final chunk)
    fn send_terminator(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async { Ok(()) })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        self.head.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.body.lock().unwrap_or_else(|e| e.into_inner()).take();
        Box::pin(async {})
    }
}

fn hyper_response(head: ResponseHead, body_rx: mpsc::Receiver<Bytes>) -> hyper::Response<Body> {
    let frames = stream::unfold(body_rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, Infallible>(chunk), rx))
    });

    let mut response = hyper::Response::new(Body::from_stream(frames));
    *response.status_mut() = head.status;
    *response.headers_mut() = head.headers;
    response
}

fn plain_response(status: StatusCode, message: &'static str) -> hyper::Response<Body> {
    let mut response = hyper::Response::new(Body::from(message));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
