//! Backend worker pool: the peer-side consumer of hub request frames.
//!
//! Runs inside the worker process. Dials the hub with a comma-separated
//! queue list in the URL path, acks every request frame straight from the
//! dispatcher, and spreads handler invocations across a pool of workers.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio_tungstenite::tungstenite::{self, protocol::WebSocketConfig};
use tokio_tungstenite::connect_async_with_config;
use tracing::{debug, info, warn};

use crate::frame::{self, FrameHeaders};
use crate::lifecycle::Shutdown;
use crate::session::{adapt, Session, SocketMessage, MAX_MESSAGE_SIZE};

/// Worker pool size used when the caller passes 0.
pub const DEFAULT_WORKERS: usize = 10;

/// Synchronous application handler invoked once per delivered request.
///
/// Returned headers are forwarded verbatim except `X-Hub-Id`, which the
/// framework overwrites. Setting `X-Hub-Status` maps to the HTTP status the
/// external client sees. Empty headers are legal.
pub type MessageHandler = Arc<dyn Fn(&FrameHeaders, &[u8]) -> (FrameHeaders, Vec<u8>) + Send + Sync>;

/// Error dialing the hub.
#[derive(Debug)]
pub enum BackendError {
    Connect(tungstenite::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Connect(e) => write!(f, "failed to connect to hub: {e}"),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Connect(e) => Some(e),
        }
    }
}

struct Job {
    id: String,
    headers: FrameHeaders,
    body: Bytes,
}

/// Dial `ws_url`, subscribe to the queues named in its path, and serve
/// request frames until the stop signal fires or the connection drops.
pub async fn run(
    ws_url: &str,
    workers: usize,
    handler: MessageHandler,
    shutdown: &Shutdown,
) -> Result<(), BackendError> {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_MESSAGE_SIZE);
    let (socket, _) = connect_async_with_config(ws_url, Some(config), false)
        .await
        .map_err(BackendError::Connect)?;
    info!(url = %ws_url, "backend connected");

    let (outbound_tx, outbound_rx) = async_channel::bounded::<SocketMessage>(1);
    let (inbound_tx, inbound_rx) = async_channel::bounded::<SocketMessage>(1);
    let (sink, stream) = adapt::client_socket(socket);
    let session = Session::spawn(sink, stream, outbound_rx, inbound_tx);

    let workers = if workers == 0 { DEFAULT_WORKERS } else { workers };
    let (dispatch_tx, dispatch_rx) = async_channel::bounded::<Job>(1);
    let mut worker_tasks = Vec::with_capacity(workers);
    for n in 0..workers {
        worker_tasks.push(tokio::spawn(worker(
            n,
            handler.clone(),
            dispatch_rx.clone(),
            outbound_tx.clone(),
        )));
    }
    drop(dispatch_rx);

    let mut stop = shutdown.subscribe();
    let mut stopping = false;
    loop {
        tokio::select! {
            msg = inbound_rx.recv() => {
                let Ok(msg) = msg else {
                    debug!("session closed, stopping workers");
                    break;
                };
                let SocketMessage::Binary(data) = msg else {
                    continue;
                };
                let (headers, body) = frame::decode(data);
                let Some(id) = headers.first(frame::HEADER_ID).map(str::to_owned) else {
                    warn!("request frame missing X-Hub-Id header");
                    continue;
                };
                // ack straight from the dispatcher so a slow handler cannot
                // delay receipt confirmation
                if outbound_tx.send(ack_frame(&id)).await.is_err() {
                    break;
                }
                if dispatch_tx.send(Job { id, headers, body }).await.is_err() {
                    break;
                }
            }
            _ = stop.recv(), if !stopping => {
                info!("stop received");
                stopping = true;
                session.stop_read();
            }
        }
    }

    dispatch_tx.close();
    for task in worker_tasks {
        let _ = task.await;
    }
    outbound_tx.close();
    session.join().await;
    info!("backend stopped");
    Ok(())
}

fn ack_frame(id: &str) -> SocketMessage {
    let mut headers = FrameHeaders::new();
    headers.set(frame::HEADER_CONTROL_OP, frame::CONTROL_OP_ACK);
    headers.set(frame::HEADER_ID, id);
    SocketMessage::Binary(frame::encode(&headers, b"").into())
}

/// Pull jobs off the dispatch channel, invoke the handler and push the reply
/// with the correlation id preserved.
async fn worker(
    n: usize,
    handler: MessageHandler,
    jobs: async_channel::Receiver<Job>,
    outbound: async_channel::Sender<SocketMessage>,
) {
    while let Ok(job) = jobs.recv().await {
        let (mut headers, body) = handler(&job.headers, &job.body);
        headers.set(frame::HEADER_ID, &job.id);
        let reply = SocketMessage::Binary(frame::encode(&headers, &body).into());
        if outbound.send(reply).await.is_err() {
            break;
        }
    }
    debug!(worker = n, "worker done");
}
