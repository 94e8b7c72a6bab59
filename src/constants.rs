//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default interval between observations of a healthy resource (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default requeue interval for configuration errors (seconds)
pub const DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS: u64 = 60;

/// Default Fibonacci backoff minimum (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;

/// Default Fibonacci backoff maximum (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 600;

/// Default transport timeout when a resource sets no `waitTimeout` (seconds)
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 300;

/// Default maximum number of resources reconciled at once, per kind
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: usize = 10;

/// Finalizer guarding deletion of the external resource
pub const FINALIZER: &str = "http.resources.io/finalizer";

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "http-resource-controller";
