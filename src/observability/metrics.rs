//! Metrics collection and exposition.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize metrics exporter and server.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!("Metrics server listening on http://{}", addr);
}

/// Record one completed external request.
pub fn record_request(queue: &str, status: u16, started: Instant) {
    let labels = [
        ("queue", queue.to_string()),
        ("status", status.to_string()),
    ];

    counter!("hub_requests_total", &labels).increment(1);
    histogram!("hub_request_duration_seconds", &labels).record(started.elapsed().as_secs_f64());
}

/// Record one redelivery triggered by an ack timeout.
pub fn record_resend(queue: &str) {
    counter!("hub_router_resends_total", "queue" => queue.to_string()).increment(1);
}

/// Track the number of attached backend sessions.
pub fn record_backend_session(delta: i64) {
    gauge!("hub_backend_sessions").increment(delta as f64);
}
