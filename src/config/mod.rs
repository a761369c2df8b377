//! Configuration loading and validation.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ExternalConfig, HubConfig, InternalConfig, ObservabilityConfig};
