//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `http_resource_reconciliations_total{kind}` - Total number of reconciliations
//! - `http_resource_reconciliation_errors_total{kind}` - Total number of reconciliation errors
//! - `http_resource_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `http_resource_requests_total{method, outcome}` - Outbound HTTP requests by outcome
//! - `http_resource_request_duration_seconds{method}` - Duration of outbound HTTP requests
//! - `http_resource_secret_keys_injected_total` - Secret keys written from responses
//! - `http_resource_placeholders_resolved_total` - Secret placeholders resolved in requests
//! - `http_resource_duration_parsing_errors_total` - Invalid `waitTimeout` values

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "http_resource_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "http_resource_reconciliation_errors_total",
            "Total number of reconciliation errors",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "http_resource_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static HTTP_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "http_resource_requests_total",
            "Total number of outbound HTTP requests by method and outcome",
        ),
        &["method", "outcome"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric - this should never happen")
});

static HTTP_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "http_resource_request_duration_seconds",
            "Duration of outbound HTTP requests in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 30.0]),
        &["method"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION metric - this should never happen")
});

static SECRET_KEYS_INJECTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "http_resource_secret_keys_injected_total",
        "Total number of secret keys written from responses",
    )
    .expect("Failed to create SECRET_KEYS_INJECTED_TOTAL metric - this should never happen")
});

static PLACEHOLDERS_RESOLVED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "http_resource_placeholders_resolved_total",
        "Total number of secret placeholders resolved",
    )
    .expect("Failed to create PLACEHOLDERS_RESOLVED_TOTAL metric - this should never happen")
});

static DURATION_PARSING_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "http_resource_duration_parsing_errors_total",
        "Total number of duration parsing errors (waitTimeout parsing failures)",
    )
    .expect("Failed to create DURATION_PARSING_ERRORS_TOTAL metric - this should never happen")
});

#[allow(clippy::missing_errors_doc)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(HTTP_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(SECRET_KEYS_INJECTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PLACEHOLDERS_RESOLVED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DURATION_PARSING_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

/// Record one outbound request; `outcome` is `success`, `http_error`,
/// `other` or `transport_error`
pub fn record_http_request(method: &str, outcome: &str, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, outcome])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[method])
        .observe(duration);
}

pub fn increment_secret_keys_injected(count: usize) {
    SECRET_KEYS_INJECTED_TOTAL.inc_by(count as u64);
}

pub fn increment_placeholders_resolved(count: usize) {
    PLACEHOLDERS_RESOLVED_TOTAL.inc_by(count as u64);
}

pub fn increment_duration_parsing_errors() {
    DURATION_PARSING_ERRORS_TOTAL.inc();
}
