//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Interval between observations of a resource that reconciled cleanly (seconds)
    pub poll_interval_secs: u64,
    /// Requeue interval for configuration errors (seconds)
    /// Invalid resources are not retried faster than this
    pub reconciliation_error_requeue_secs: u64,
    /// Fibonacci backoff minimum (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff maximum (seconds)
    pub backoff_max_secs: u64,
    /// Transport timeout for resources without `waitTimeout` (seconds)
    pub default_wait_timeout_secs: u64,
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Log format (json, text)
    pub log_format: String,
    /// Maximum concurrent reconciliations per resource kind
    pub max_concurrent_reconciliations: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            default_wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_format: "json".to_string(),
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        Self {
            poll_interval_secs: parsed("POLL_INTERVAL_SECS").unwrap_or(defaults.poll_interval_secs),
            reconciliation_error_requeue_secs: parsed("RECONCILIATION_ERROR_REQUEUE_SECS")
                .unwrap_or(defaults.reconciliation_error_requeue_secs),
            backoff_min_secs: parsed("BACKOFF_MIN_SECS").unwrap_or(defaults.backoff_min_secs),
            backoff_max_secs: parsed("BACKOFF_MAX_SECS").unwrap_or(defaults.backoff_max_secs),
            default_wait_timeout_secs: parsed("DEFAULT_WAIT_TIMEOUT_SECS")
                .unwrap_or(defaults.default_wait_timeout_secs),
            metrics_port: lookup("METRICS_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.metrics_port),
            log_format: lookup("LOG_FORMAT")
                .map(|v| v.trim().to_lowercase())
                .filter(|v| v == "json" || v == "text")
                .unwrap_or(defaults.log_format),
            max_concurrent_reconciliations: lookup("MAX_CONCURRENT_RECONCILIATIONS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_reconciliations),
        }
    }

    /// Get poll interval duration
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Get reconciliation error requeue duration
    #[must_use]
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    /// Get default transport timeout
    #[must_use]
    pub fn default_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.default_wait_timeout_secs)
    }

    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format == "json"
    }
}
