//! Queue registry and send-with-ack-and-redelivery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{timeout, Instant};
use tracing::debug;

use crate::hub::request::Request;
use crate::observability::metrics;

/// Fallback tick while no consumer is draining a queue channel.
const HANDOFF_RETRY: Duration = Duration::from_secs(1);

type QueueChannel = (
    async_channel::Sender<Arc<Request>>,
    async_channel::Receiver<Arc<Request>>,
);

/// Owns the queue-name → request-channel registry and implements delivery
/// with ack-based redelivery.
///
/// Channels are created lazily on first mention and only ever closed by
/// [`QueueRouter::destroy`] at shutdown. Each channel holds one request at a
/// time; producers beyond that block, which is the backpressure behavior
/// while backends are absent or churning.
pub struct QueueRouter {
    by_queue: Mutex<HashMap<String, QueueChannel>>,
    resends: AtomicU64,
}

impl QueueRouter {
    pub fn new() -> Self {
        Self {
            by_queue: Mutex::new(HashMap::new()),
            resends: AtomicU64::new(0),
        }
    }

    /// Lazily create and return the channel pair for `queue`. Idempotent.
    fn queue_channel(&self, queue: &str) -> QueueChannel {
        let mut by_queue = self.by_queue.lock().expect("queue registry mutex poisoned");
        by_queue
            .entry(queue.to_string())
            .or_insert_with(|| async_channel::bounded(1))
            .clone()
    }

    /// Consumer side of a queue channel, for a subscribing session.
    pub fn subscribe(&self, queue: &str) -> async_channel::Receiver<Arc<Request>> {
        self.queue_channel(queue).1
    }

    /// Number of redeliveries triggered by ack timeouts so far.
    pub fn resend_count(&self) -> u64 {
        self.resends.load(Ordering::Relaxed)
    }

    /// Hand `req` to a subscriber of its queue and wait for the receipt ack,
    /// redelivering on ack timeout until the request deadline passes.
    ///
    /// Returns once a delivery is confirmed or the deadline elapses; the
    /// external boundary's own reply wait converts the latter into a 504.
    pub async fn send(&self, req: &Arc<Request>) {
        let (tx, _) = self.queue_channel(&req.queue);
        let ack_timeout = req.deadline.duration_since(Instant::now()) / 3;
        while Instant::now() < req.deadline {
            match timeout(HANDOFF_RETRY, tx.send(req.clone())).await {
                // no consumer made room yet, check the deadline and retry
                Err(_) => continue,
                // registry destroyed mid-send
                Ok(Err(_)) => return,
                Ok(Ok(())) => {}
            }
            if timeout(ack_timeout, req.acked()).await.is_ok() {
                return;
            }
            let resends = self.resends.fetch_add(1, Ordering::Relaxed) + 1;
            metrics::record_resend(&req.queue);
            debug!(queue = %req.queue, resends, "ack timeout, redelivering");
        }
    }

    /// Close every registered queue channel and reset the registry.
    ///
    /// Callable only at shutdown; sends after this return immediately.
    pub fn destroy(&self) {
        let mut by_queue = self.by_queue.lock().expect("queue registry mutex poisoned");
        for (_, (tx, _)) in by_queue.drain() {
            tx.close();
        }
    }
}

impl Default for QueueRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameHeaders;
    use crate::hub::request::Response;
    use bytes::Bytes;

    fn test_request(
        queue: &str,
        timeout: Duration,
    ) -> (Arc<Request>, async_channel::Receiver<Response>) {
        Request::new(
            queue,
            "POST",
            "/api/test",
            FrameHeaders::new(),
            Bytes::from_static(b"payload"),
            timeout,
        )
    }

    #[tokio::test]
    async fn ack_confirms_delivery() {
        let router = Arc::new(QueueRouter::new());
        let subscriber = router.subscribe("orders");
        let (req, _reply) = test_request("orders", Duration::from_secs(5));

        let send = {
            let router = router.clone();
            let req = req.clone();
            tokio::spawn(async move { router.send(&req).await })
        };

        let delivered = subscriber.recv().await.unwrap();
        delivered.ack.notify_one();
        send.await.unwrap();
        assert_eq!(router.resend_count(), 0);
    }

    #[tokio::test]
    async fn missing_ack_redelivers() {
        let router = Arc::new(QueueRouter::new());
        let subscriber = router.subscribe("orders");
        // 900ms deadline gives a 300ms ack timeout
        let (req, _reply) = test_request("orders", Duration::from_millis(900));

        let send = {
            let router = router.clone();
            let req = req.clone();
            tokio::spawn(async move { router.send(&req).await })
        };

        let first = subscriber.recv().await.unwrap();
        drop(first); // consumed but never acked
        let second = subscriber.recv().await.unwrap();
        second.ack.notify_one();
        send.await.unwrap();
        assert!(router.resend_count() >= 1);
    }

    #[tokio::test]
    async fn gives_up_at_deadline_without_consumer() {
        let router = QueueRouter::new();
        let (req, _reply) = test_request("idle", Duration::from_millis(300));

        let started = std::time::Instant::now();
        router.send(&req).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(300), "returned early: {elapsed:?}");
        // one parked delivery plus at most one handoff retry tick
        assert!(elapsed < Duration::from_millis(2500), "returned late: {elapsed:?}");
    }

    #[tokio::test]
    async fn destroy_unblocks_senders() {
        let router = Arc::new(QueueRouter::new());
        let _subscriber = router.subscribe("stuck");
        // 3s deadline: the parked delivery re-checks the channel after its
        // 1s ack timeout and sees it closed
        let (parked, _reply) = test_request("stuck", Duration::from_secs(3));
        let (blocked, _reply) = test_request("stuck", Duration::from_secs(3));

        let sends = {
            let router = router.clone();
            tokio::spawn(async move {
                tokio::join!(router.send(&parked), router.send(&blocked));
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        router.destroy();
        tokio::time::timeout(Duration::from_secs(2), sends)
            .await
            .expect("sends not unblocked by destroy")
            .unwrap();
    }
}
