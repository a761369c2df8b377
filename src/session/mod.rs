//! WebSocket session pumps.
//!
//! # Responsibilities
//! - Pump messages between one WebSocket and an inbound/outbound channel pair
//! - Heartbeat: ping on a timer, treat a silent peer as dead
//! - Close the inbound channel exactly once when the peer is gone
//! - Graceful close when the outbound channel is closed by its owner

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tracing::{debug, warn};

pub mod adapt;

/// Time allowed to write a message to the peer.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Time allowed to read the next message (or pong) from the peer.
pub const PONG_WAIT: Duration = Duration::from_secs(2);

/// Ping interval. Must be less than [`PONG_WAIT`].
pub const PING_PERIOD: Duration =
    Duration::from_millis((PONG_WAIT.as_millis() as u64 * 4) / 10);

/// Maximum single message size accepted from a peer.
pub const MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Transport-agnostic message moved between the pumps and the hub loops.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketMessage {
    Binary(Bytes),
    Text(String),
    Ping(Bytes),
    Pong(Bytes),
    Close,
}

/// Error surfaced by an adapted socket stream or sink.
#[derive(Debug)]
pub struct SocketError(pub String);

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "socket error: {}", self.0)
    }
}

impl std::error::Error for SocketError {}

/// One WebSocket connection driven by a read pump and a write pump.
///
/// The caller owns the outbound sender and the inbound receiver; closing the
/// outbound channel initiates a graceful shutdown, and the inbound channel
/// closing signals that the peer is gone.
pub struct Session {
    reading: Arc<AtomicBool>,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl Session {
    /// Spawn the pump pair over an adapted sink/stream.
    pub fn spawn<Si, St>(
        sink: Si,
        stream: St,
        outbound: async_channel::Receiver<SocketMessage>,
        inbound: async_channel::Sender<SocketMessage>,
    ) -> Session
    where
        Si: Sink<SocketMessage, Error = SocketError> + Send + Unpin + 'static,
        St: Stream<Item = Result<SocketMessage, SocketError>> + Send + Unpin + 'static,
    {
        let reading = Arc::new(AtomicBool::new(true));
        let read_task = tokio::spawn(read_pump(stream, inbound, reading.clone()));
        let write_task = tokio::spawn(write_pump(sink, outbound, reading.clone()));
        Session {
            reading,
            read_task,
            write_task,
        }
    }

    /// Ask the read pump to stop at its next deadline check.
    pub fn stop_read(&self) {
        self.reading.store(false, Ordering::SeqCst);
    }

    /// Wait for both pumps to finish.
    pub async fn join(self) {
        let _ = self.read_task.await;
        let _ = self.write_task.await;
    }
}

/// Pump messages from the socket into the inbound channel.
///
/// Each read is bounded by [`PONG_WAIT`]; pings and pongs re-arm the deadline
/// without being forwarded. Any error, deadline expiry, close or EOF ends the
/// pump, which closes the inbound channel on the way out.
async fn read_pump<St>(
    mut stream: St,
    inbound: async_channel::Sender<SocketMessage>,
    reading: Arc<AtomicBool>,
) where
    St: Stream<Item = Result<SocketMessage, SocketError>> + Send + Unpin + 'static,
{
    while reading.load(Ordering::SeqCst) {
        match timeout(PONG_WAIT, stream.next()).await {
            Err(_) => {
                if reading.load(Ordering::SeqCst) {
                    debug!("read pump: peer silent past pong deadline");
                }
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                if reading.load(Ordering::SeqCst) {
                    warn!(error = %e, "read pump: read failed");
                }
                break;
            }
            Ok(Some(Ok(msg))) => match msg {
                SocketMessage::Ping(_) | SocketMessage::Pong(_) => continue,
                SocketMessage::Close => break,
                msg => {
                    if inbound.send(msg).await.is_err() {
                        break;
                    }
                }
            },
        }
    }
    inbound.close();
}

/// Pump messages from the outbound channel onto the socket, pinging every
/// [`PING_PERIOD`]. On exit the read pump is told to stop.
async fn write_pump<Si>(
    mut sink: Si,
    outbound: async_channel::Receiver<SocketMessage>,
    reading: Arc<AtomicBool>,
) where
    Si: Sink<SocketMessage, Error = SocketError> + Send + Unpin + 'static,
{
    let mut ticker = interval(PING_PERIOD);
    loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Err(_) => {
                    // owner closed the channel: attempt a clean close and stop
                    let _ = timeout(WRITE_WAIT, sink.send(SocketMessage::Close)).await;
                    break;
                }
                Ok(msg) => {
                    if !write(&mut sink, msg).await {
                        break;
                    }
                }
            },
            _ = ticker.tick() => {
                if !write(&mut sink, SocketMessage::Ping(Bytes::new())).await {
                    break;
                }
            }
        }
    }
    reading.store(false, Ordering::SeqCst);
    debug!("write pump exiting");
}

async fn write<Si>(sink: &mut Si, msg: SocketMessage) -> bool
where
    Si: Sink<SocketMessage, Error = SocketError> + Send + Unpin,
{
    match timeout(WRITE_WAIT, sink.send(msg)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "write pump: write failed");
            false
        }
        Err(_) => {
            warn!("write pump: write timed out");
            false
        }
    }
}
