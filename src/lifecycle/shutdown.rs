//! Shutdown coordination for the hub and backends.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe
/// to: the hub's listeners, every attached backend session, and backend
/// worker pools.
#[derive(Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Trigger the shutdown signal when Ctrl+C arrives.
pub async fn trigger_on_ctrl_c(shutdown: Shutdown) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
        shutdown.trigger();
    }
}
