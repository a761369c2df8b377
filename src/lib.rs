//! HTTP-to-WebSocket request/response gateway.
//!
//! External clients issue ordinary HTTP calls against named logical queues;
//! backend processes attach over persistent WebSockets, subscribe to one or
//! more queues, execute each request and return the reply that becomes the
//! HTTP response. Delivery is confirmed with acks and redelivered on ack
//! timeout, so backend churn never loses an in-flight request before its
//! deadline.

pub mod backend;
pub mod config;
pub mod frame;
pub mod hub;
pub mod lifecycle;
pub mod observability;
pub mod session;

pub use config::HubConfig;
pub use hub::Hub;
pub use lifecycle::Shutdown;
