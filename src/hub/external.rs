//! External boundary: the client-facing HTTP side of the hub.
//!
//! Converts an inbound HTTP request into a [`Request`], submits it to the
//! queue router and blocks on the reply, emitting a synthetic 504 when the
//! deadline elapses first.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response as HttpResponse},
    routing::any,
    Router,
};
use tokio::time::{timeout, Instant};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ExternalConfig;
use crate::frame::{FrameHeaders, INTERNAL_PREFIX};
use crate::hub::request::{Request, Response};
use crate::hub::router::QueueRouter;
use crate::observability::metrics;

#[derive(Clone)]
struct ExternalState {
    router: Arc<QueueRouter>,
    timeout: Duration,
    max_body_bytes: usize,
}

/// Build the client-facing router mounted at `config.path_prefix`.
pub fn app(router: Arc<QueueRouter>, config: &ExternalConfig) -> Router {
    let state = ExternalState {
        router,
        timeout: Duration::from_secs(config.timeout_secs),
        max_body_bytes: config.max_body_bytes,
    };
    let prefix = config.path_prefix.trim_end_matches('/');

    let app = Router::new().route(&format!("{prefix}/{{queue}}"), any(gateway_handler));
    let app = if prefix.is_empty() {
        app.route("/", any(missing_queue))
    } else {
        app.route(prefix, any(missing_queue))
            .route(&format!("{prefix}/"), any(missing_queue))
    };
    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Main gateway handler: queue lookup, dispatch, reply wait, emission.
async fn gateway_handler(
    State(state): State<ExternalState>,
    Path(queue): Path<String>,
    request: axum::extract::Request,
) -> HttpResponse {
    if queue.is_empty() {
        return missing_queue().await;
    }

    let started = std::time::Instant::now();
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            warn!(queue = %queue, error = %e, "failed to read request body");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error reading request: {e}"),
            )
                .into_response();
        }
    };

    let (req, reply) = Request::new(
        queue.clone(),
        parts.method.to_string(),
        parts.uri.to_string(),
        from_http_headers(&parts.headers),
        body,
        state.timeout,
    );

    // may block across redeliveries, bounded by the request deadline
    state.router.send(&req).await;

    let remaining = req.deadline.duration_since(Instant::now());
    let response = match timeout(remaining, reply.recv()).await {
        Ok(Ok(response)) => response,
        _ => Response::timed_out(),
    };

    metrics::record_request(&queue, response.status, started);
    into_http_response(response)
}

async fn missing_queue() -> HttpResponse {
    (StatusCode::BAD_REQUEST, "queue is undefined on URL").into_response()
}

fn from_http_headers(headers: &HeaderMap) -> FrameHeaders {
    let mut out = FrameHeaders::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            out.append(name.as_str(), value);
        }
    }
    out
}

/// Emit the backend's reply, stripping internal control headers.
fn into_http_response(response: Response) -> HttpResponse {
    let mut http = HttpResponse::new(Body::from(response.body));
    *http.status_mut() = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    let emitted = http.headers_mut();
    for (name, values) in response.headers.iter() {
        if is_internal_header(name) {
            continue;
        }
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        for value in values {
            if let Ok(value) = HeaderValue::from_str(value) {
                emitted.append(name.clone(), value);
            }
        }
    }
    http
}

/// Header names are matched case-insensitively here: client-supplied headers
/// round-trip through the http stack in lowercase.
fn is_internal_header(name: &str) -> bool {
    name.len() >= INTERNAL_PREFIX.len()
        && name[..INTERNAL_PREFIX.len()].eq_ignore_ascii_case(INTERNAL_PREFIX)
}
