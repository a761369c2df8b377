//! Metrics and logging support.
//!
//! Structured logging uses the tracing crate throughout; the subscriber is
//! initialized by the binary so library users keep control of their own.

pub mod metrics;
