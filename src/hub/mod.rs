//! The hub: queue router plus both gateway boundaries.

pub mod external;
pub mod internal;
pub mod request;
pub mod router;

pub use request::{Request, Response};
pub use router::QueueRouter;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::HubConfig;
use crate::lifecycle::Shutdown;

/// The assembled matching engine: one router shared by the client-facing
/// HTTP app and the backend-facing WebSocket app.
pub struct Hub {
    router: Arc<QueueRouter>,
    config: HubConfig,
}

impl Hub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            router: Arc::new(QueueRouter::new()),
            config,
        }
    }

    pub fn router(&self) -> Arc<QueueRouter> {
        self.router.clone()
    }

    /// Client-facing app, mounted at the configured path prefix.
    pub fn external_app(&self) -> axum::Router {
        external::app(self.router.clone(), &self.config.external)
    }

    /// Backend-facing app; sessions hang up when `shutdown` fires.
    pub fn internal_app(&self, shutdown: &Shutdown) -> axum::Router {
        internal::app(self.router.clone(), shutdown.clone())
    }

    /// Serve both listeners until the shutdown signal fires, then tear the
    /// queue registry down.
    pub async fn run(
        self,
        external: TcpListener,
        internal: TcpListener,
        shutdown: &Shutdown,
    ) -> std::io::Result<()> {
        let external_addr = external.local_addr()?;
        let internal_addr = internal.local_addr()?;
        tracing::info!(
            external = %external_addr,
            internal = %internal_addr,
            "hub starting"
        );

        let mut rx = shutdown.subscribe();
        let serve_external = axum::serve(external, self.external_app().into_make_service())
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
            });

        let mut rx = shutdown.subscribe();
        let serve_internal = axum::serve(internal, self.internal_app(shutdown).into_make_service())
            .with_graceful_shutdown(async move {
                let _ = rx.recv().await;
            });

        let (external_result, internal_result) = tokio::join!(
            async move { serve_external.await },
            async move { serve_internal.await },
        );
        self.router.destroy();
        tracing::info!("hub stopped");
        external_result.and(internal_result)
    }
}
