//! # Duration Validation
//!
//! Handles parsing and validating Kubernetes duration strings.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<number>\d+)(?P<unit>ms|[smhd])$")
        .expect("Failed to compile duration regex - this should never happen")
});

/// Parse Kubernetes duration string into std::time::Duration
/// Supports formats: "500ms", "30s", "1m", "5m", "1h", "2h", "1d"
/// Returns Duration or error if format is invalid
pub fn parse_kubernetes_duration(duration_str: &str) -> Result<Duration> {
    let duration_trimmed = duration_str.trim();

    if duration_trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let interval_lower = duration_trimmed.to_lowercase();

    let captures = DURATION_REGEX.captures(&interval_lower).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid duration format '{}'. Expected format: <number><unit> (e.g., '30s', '5m', '1h')",
            duration_trimmed
        )
    })?;

    let number_str = &captures["number"];
    let unit = &captures["unit"];

    let number: u64 = number_str.parse().map_err(|e| {
        anyhow::anyhow!(
            "Invalid duration number '{}' in '{}': {}",
            number_str,
            duration_trimmed,
            e
        )
    })?;

    if number == 0 {
        return Err(anyhow::anyhow!(
            "Duration number must be greater than 0, got '{}'",
            duration_trimmed
        ));
    }

    let duration = match unit {
        "ms" => Duration::from_millis(number),
        "s" => Duration::from_secs(number),
        "m" => Duration::from_secs(number.saturating_mul(60)),
        "h" => Duration::from_secs(number.saturating_mul(3600)),
        "d" => Duration::from_secs(number.saturating_mul(86400)),
        _ => {
            return Err(anyhow::anyhow!(
                "Invalid unit '{}' in duration '{}'. Expected: ms, s, m, h, or d",
                unit,
                duration_trimmed
            ));
        }
    };

    Ok(duration)
}

/// Transport timeout for a resource: its `waitTimeout`, else `default`
///
/// Invalid values are counted and fall back to `default`; validation
/// reports them separately.
#[must_use]
pub fn wait_timeout(value: Option<&str>, default: Duration) -> Duration {
    match value.map(parse_kubernetes_duration) {
        Some(Ok(duration)) => duration,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Invalid waitTimeout, using default");
            crate::observability::metrics::increment_duration_parsing_errors();
            default
        }
        None => default,
    }
}
