//! Configuration validation logic.

use std::net::SocketAddr;

use crate::config::schema::HubConfig;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a HubConfig for semantic correctness.
pub fn validate_config(config: &HubConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.external.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError(format!(
            "external.bind_address '{}' is not a valid socket address",
            config.external.bind_address
        )));
    }
    if config.internal.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError(format!(
            "internal.bind_address '{}' is not a valid socket address",
            config.internal.bind_address
        )));
    }

    if !config.external.path_prefix.is_empty() && !config.external.path_prefix.starts_with('/') {
        errors.push(ValidationError(format!(
            "external.path_prefix '{}' must start with '/'",
            config.external.path_prefix
        )));
    }

    if config.external.timeout_secs == 0 {
        errors.push(ValidationError(
            "external.timeout_secs must be > 0".to_string(),
        ));
    }
    if config.external.max_body_bytes == 0 {
        errors.push(ValidationError(
            "external.max_body_bytes must be > 0".to_string(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError(format!(
            "observability.metrics_address '{}' is not a valid socket address",
            config.observability.metrics_address
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
