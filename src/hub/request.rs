//! Request and response types matched through the hub.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::frame::FrameHeaders;

/// One in-flight external call.
///
/// Shared between the external boundary (which awaits the reply), the queue
/// router (which awaits the ack) and whichever backend session currently
/// holds a delivery of it.
pub struct Request {
    pub queue: String,
    pub method: String,
    pub uri: String,
    pub headers: FrameHeaders,
    pub body: Bytes,
    /// Absolute deadline. Delivery and ack attempts past this time abort.
    pub deadline: Instant,
    /// Fired when a backend confirms receipt. Holds at most one permit, so
    /// duplicate acks from redelivery races are dropped.
    pub ack: Notify,
    reply_tx: async_channel::Sender<Response>,
}

impl Request {
    /// Build a request expiring `timeout` from now, returning it with the
    /// single-consumer receiver its reply will arrive on.
    pub fn new(
        queue: impl Into<String>,
        method: impl Into<String>,
        uri: impl Into<String>,
        headers: FrameHeaders,
        body: Bytes,
        timeout: Duration,
    ) -> (Arc<Request>, async_channel::Receiver<Response>) {
        let (reply_tx, reply_rx) = async_channel::bounded(1);
        let request = Arc::new(Request {
            queue: queue.into(),
            method: method.into(),
            uri: uri.into(),
            headers,
            body,
            deadline: Instant::now() + timeout,
            ack: Notify::new(),
            reply_tx,
        });
        (request, reply_rx)
    }

    /// Deliver the reply. At most one reply is ever observed; later calls
    /// return false and the duplicate is dropped.
    pub fn deliver(&self, response: Response) -> bool {
        self.reply_tx.try_send(response).is_ok()
    }

    /// Wait until a backend acks receipt of this request.
    pub async fn acked(&self) {
        self.ack.notified().await;
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.deadline < now
    }
}

/// Reply returned to the external client.
#[derive(Debug)]
pub struct Response {
    /// HTTP status; 0 or invalid values map to 200 at emission.
    pub status: u16,
    pub headers: FrameHeaders,
    pub body: Bytes,
}

impl Response {
    /// Synthetic reply for a request whose deadline elapsed unanswered.
    pub fn timed_out() -> Response {
        Response {
            status: 504,
            headers: FrameHeaders::new(),
            body: Bytes::from_static(b"Request timed out"),
        }
    }
}
