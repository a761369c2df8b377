//! Shared fixture for hub integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use wirehub::backend::{self, MessageHandler};
use wirehub::config::HubConfig;
use wirehub::frame::{self, FrameHeaders};
use wirehub::{Hub, Shutdown};

/// A hub running on ephemeral ports for one test.
pub struct TestHub {
    pub external_addr: SocketAddr,
    pub internal_addr: SocketAddr,
    shutdown: Shutdown,
}

impl TestHub {
    pub fn queue_url(&self, queue: &str) -> String {
        format!("http://{}/api/{}", self.external_addr, queue)
    }

    pub fn ws_url(&self, queues: &str) -> String {
        format!("ws://{}/{}", self.internal_addr, queues)
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

/// Start a hub with the given external request timeout.
pub async fn start_hub(timeout: Duration) -> TestHub {
    let external = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let internal = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let external_addr = external.local_addr().unwrap();
    let internal_addr = internal.local_addr().unwrap();

    let mut config = HubConfig::default();
    config.external.bind_address = external_addr.to_string();
    config.internal.bind_address = internal_addr.to_string();
    config.external.timeout_secs = timeout.as_secs().max(1);
    config.observability.metrics_enabled = false;

    let shutdown = Shutdown::new();
    let hub = Hub::new(config);
    let hub_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = hub.run(external, internal, &hub_shutdown).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestHub {
        external_addr,
        internal_addr,
        shutdown,
    }
}

/// Attach an in-process backend and give its subscription time to land.
/// The returned signal stops just this backend.
pub async fn start_backend(ws_url: String, workers: usize, handler: MessageHandler) -> Shutdown {
    let stop = Shutdown::new();
    let backend_stop = stop.clone();
    tokio::spawn(async move {
        if let Err(e) = backend::run(&ws_url, workers, handler, &backend_stop).await {
            eprintln!("backend failed: {e}");
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop
}

/// Handler matrix shared across the integration suites: echoes on `echo`,
/// sums comma-separated integers on `add`, sleeps then echoes on `sleep`,
/// and reports an application-level 500 for anything else.
pub fn test_handler() -> MessageHandler {
    Arc::new(|headers: &FrameHeaders, body: &[u8]| {
        let Some(queue) = headers.first(frame::HEADER_QUEUE) else {
            let mut reply = FrameHeaders::new();
            reply.set(frame::HEADER_STATUS, "500");
            return (reply, b"Missing X-Hub-Queue header".to_vec());
        };
        match queue {
            "echo" => (FrameHeaders::new(), body.to_vec()),
            "add" => {
                let sum: i64 = std::str::from_utf8(body)
                    .unwrap_or("")
                    .split(',')
                    .filter_map(|part| part.trim().parse::<i64>().ok())
                    .sum();
                (FrameHeaders::new(), sum.to_string().into_bytes())
            }
            "sleep" => {
                if let Some((millis, _)) =
                    std::str::from_utf8(body).ok().and_then(|s| s.split_once(','))
                {
                    if let Ok(millis) = millis.parse::<u64>() {
                        std::thread::sleep(Duration::from_millis(millis));
                    }
                }
                (FrameHeaders::new(), body.to_vec())
            }
            other => {
                let mut reply = FrameHeaders::new();
                reply.set(frame::HEADER_STATUS, "500");
                (reply, format!("Unknown queue: {other}").into_bytes())
            }
        }
    })
}

/// Handler that echoes the body regardless of queue.
#[allow(dead_code)]
pub fn echo_handler() -> MessageHandler {
    Arc::new(|_headers: &FrameHeaders, body: &[u8]| (FrameHeaders::new(), body.to_vec()))
}

#[allow(dead_code)]
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
