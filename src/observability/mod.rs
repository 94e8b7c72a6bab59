//! # Observability
//!
//! Prometheus metrics for reconciliation, outbound requests and secret
//! injection. Logging goes through `tracing` and is configured in `main.rs`.

pub mod metrics;

pub use metrics::*;
