//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML config files;
//! every section has defaults so a missing file still yields a runnable hub.

use serde::{Deserialize, Serialize};

/// Root configuration for the hub.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HubConfig {
    /// External (client-facing) HTTP listener.
    pub external: ExternalConfig,

    /// Internal (backend-facing) WebSocket listener.
    pub internal: InternalConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Client-facing listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExternalConfig {
    /// Bind address for client HTTP traffic.
    pub bind_address: String,

    /// Path prefix queues are mounted under; requests go to `<prefix>/<queue>`.
    pub path_prefix: String,

    /// End-to-end request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9390".to_string(),
            path_prefix: "/api".to_string(),
            timeout_secs: 30,
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Backend-facing listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InternalConfig {
    /// Bind address backends dial to attach.
    pub bind_address: String,
}

impl Default for InternalConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9391".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
