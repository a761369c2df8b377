//! Internal boundary: the backend-facing WebSocket side of the hub.
//!
//! # Responsibilities
//! - Upgrade backend connections and parse their queue subscriptions
//! - Fan in session frames with every subscribed queue channel (N+1 select)
//! - Mint correlation ids and push request frames to the backend
//! - Route ack and reply frames back to the waiting request
//! - Reap correlation entries whose deadline has long passed

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
    routing::any,
    Router,
};
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, SelectAll, StreamExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::frame::{self, FrameHeaders};
use crate::hub::request::{Request, Response};
use crate::hub::router::QueueRouter;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::session::{adapt, Session, SocketMessage, MAX_MESSAGE_SIZE};

/// How often the correlation map is swept for expired entries.
const REAP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone)]
struct InternalState {
    router: Arc<QueueRouter>,
    shutdown: Shutdown,
}

/// Build the backend-facing router. The whole request path is the
/// comma-separated queue subscription list.
pub fn app(router: Arc<QueueRouter>, shutdown: Shutdown) -> Router {
    Router::new()
        .route("/{*queues}", any(subscribe_handler))
        .route("/", any(empty_subscription))
        .with_state(InternalState { router, shutdown })
}

async fn subscribe_handler(
    ws: WebSocketUpgrade,
    Path(queues): Path<String>,
    State(state): State<InternalState>,
) -> HttpResponse {
    let queues = parse_queues(&queues);
    if queues.is_empty() {
        return empty_subscription().await;
    }
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| backend_session(socket, queues, state))
}

async fn empty_subscription() -> HttpResponse {
    (
        StatusCode::BAD_REQUEST,
        "must subscribe to at least one queue",
    )
        .into_response()
}

/// One event in the session's fan-in select.
enum Event {
    /// Frame arrived from the backend.
    Frame(SocketMessage),
    /// Request pulled from a subscribed queue channel.
    Dispatch(Arc<Request>),
    /// Peer gone or hub shutting down.
    Hangup,
}

/// Per-connection select loop owning this session's correlation map.
async fn backend_session(socket: WebSocket, queues: Vec<String>, state: InternalState) {
    info!(queues = ?queues, "backend attached");
    metrics::record_backend_session(1);

    let (outbound_tx, outbound_rx) = async_channel::bounded(1);
    let (inbound_tx, inbound_rx) = async_channel::bounded(1);
    let (sink, stream) = adapt::server_socket(socket);
    let session = Session::spawn(sink, stream, outbound_rx, inbound_tx);

    // the dynamic N+1 select: session frames, every queue channel, shutdown
    let mut sources: SelectAll<BoxStream<'static, Event>> = SelectAll::new();
    sources.push(
        inbound_rx
            .map(Event::Frame)
            .chain(stream::once(async { Event::Hangup }))
            .boxed(),
    );
    for queue in &queues {
        debug!(queue = %queue, "registering with queue");
        sources.push(state.router.subscribe(queue).map(Event::Dispatch).boxed());
    }
    let mut shutdown_rx = state.shutdown.subscribe();
    sources.push(
        stream::once(async move {
            let _ = shutdown_rx.recv().await;
            Event::Hangup
        })
        .boxed(),
    );

    let prefix = format!("{}_", frame::rand_hex(4));
    let mut counter: u64 = 0;
    let mut requests: HashMap<String, Arc<Request>> = HashMap::new();
    let mut next_reap = Instant::now() + REAP_INTERVAL;

    while let Some(event) = sources.next().await {
        let now = Instant::now();
        if now > next_reap {
            requests.retain(|id, req| {
                if req.expired(now) {
                    debug!(id = %id, "reaping timed out request");
                    false
                } else {
                    true
                }
            });
            next_reap = now + REAP_INTERVAL;
        }

        match event {
            Event::Hangup => break,
            Event::Frame(SocketMessage::Binary(data)) => {
                handle_frame(&mut requests, data);
            }
            Event::Frame(msg) => {
                debug!(?msg, "ignoring non-binary message from backend");
            }
            Event::Dispatch(req) => {
                counter = counter.wrapping_add(1);
                let id = format!("{prefix}{counter}");
                let mut headers = req.headers.clone();
                headers.set(frame::HEADER_ID, &id);
                headers.set(frame::HEADER_QUEUE, &req.queue);
                let data = frame::encode(&headers, &req.body);
                requests.insert(id, req);
                if outbound_tx
                    .send(SocketMessage::Binary(data.into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }

    drop(sources);
    outbound_tx.close();
    session.join().await;
    metrics::record_backend_session(-1);
    info!("backend session closed");
}

/// Dispatch one frame from the backend: an ack keeps its map entry alive,
/// a reply consumes it.
fn handle_frame(requests: &mut HashMap<String, Arc<Request>>, data: Bytes) {
    let (headers, body) = frame::decode(data);
    let Some(id) = headers.first(frame::HEADER_ID).map(str::to_owned) else {
        warn!("frame missing X-Hub-Id header");
        return;
    };

    let is_ack = headers.first(frame::HEADER_CONTROL_OP) == Some(frame::CONTROL_OP_ACK);
    if is_ack {
        match requests.get(&id) {
            Some(req) => req.ack.notify_one(),
            None => warn!(id = %id, "request not found"),
        }
        return;
    }

    match requests.remove(&id) {
        Some(req) => {
            let status = headers
                .first(frame::HEADER_STATUS)
                .and_then(|s| s.parse().ok())
                .unwrap_or(200);
            let delivered = req.deliver(Response {
                status,
                headers,
                body,
            });
            if !delivered {
                debug!(id = %id, "duplicate reply dropped");
            }
        }
        None => warn!(id = %id, "request not found"),
    }
}

/// Parse the subscription path: leading slash stripped, comma-separated,
/// empty tokens ignored.
fn parse_queues(path: &str) -> Vec<String> {
    path.trim_start_matches('/')
        .split(',')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
