//! # Kubernetes Validation
//!
//! Validates secret references against Kubernetes naming rules (RFC 1123).

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("Failed to compile name regex - this should never happen")
});

static NAMESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$")
        .expect("Failed to compile namespace regex - this should never happen")
});

static SECRET_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-._a-zA-Z0-9]+$")
        .expect("Failed to compile secret key regex - this should never happen")
});

/// Validate Kubernetes resource name (RFC 1123 subdomain)
/// Format: lowercase alphanumeric, hyphens, dots
/// Length: 1-253 characters
pub fn validate_kubernetes_name(name: &str, field_name: &str) -> Result<()> {
    let name_trimmed = name.trim();

    if name_trimmed.is_empty() {
        return Err(anyhow::anyhow!("{field_name} cannot be empty"));
    }

    if name_trimmed.len() > 253 {
        return Err(anyhow::anyhow!(
            "{} '{}' exceeds maximum length of 253 characters (got {})",
            field_name,
            name_trimmed,
            name_trimmed.len()
        ));
    }

    if !NAME_REGEX.is_match(name_trimmed) {
        return Err(anyhow::anyhow!(
            "{field_name} '{name_trimmed}' must be a valid Kubernetes name (lowercase alphanumeric, hyphens, dots; cannot start/end with hyphen or dot)"
        ));
    }

    Ok(())
}

/// Validate Kubernetes namespace (RFC 1123 label)
/// Length: 1-63 characters
pub fn validate_kubernetes_namespace(namespace: &str, field_name: &str) -> Result<()> {
    let namespace_trimmed = namespace.trim();

    if namespace_trimmed.is_empty() {
        return Err(anyhow::anyhow!("{field_name} cannot be empty"));
    }

    if namespace_trimmed.len() > 63 {
        return Err(anyhow::anyhow!(
            "{} '{}' exceeds maximum length of 63 characters (got {})",
            field_name,
            namespace_trimmed,
            namespace_trimmed.len()
        ));
    }

    if !NAMESPACE_REGEX.is_match(namespace_trimmed) {
        return Err(anyhow::anyhow!(
            "{field_name} '{namespace_trimmed}' must be a valid Kubernetes namespace (lowercase alphanumeric, hyphens; cannot start/end with hyphen)"
        ));
    }

    Ok(())
}

/// Validate a key of a Secret's data map
pub fn validate_secret_key(key: &str, field_name: &str) -> Result<()> {
    if key.is_empty() {
        return Err(anyhow::anyhow!("{field_name} cannot be empty"));
    }
    if key.len() > 253 || !SECRET_KEY_REGEX.is_match(key) {
        return Err(anyhow::anyhow!(
            "{field_name} '{key}' must consist of alphanumeric characters, '-', '_' or '.'"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_kubernetes_name() {
        assert!(validate_kubernetes_name("api-credentials", "secretRef.name").is_ok());
        assert!(validate_kubernetes_name("my.secret", "secretRef.name").is_ok());
        assert!(validate_kubernetes_name("", "secretRef.name").is_err());
        assert!(validate_kubernetes_name("Upper", "secretRef.name").is_err());
        assert!(validate_kubernetes_name("-leading", "secretRef.name").is_err());
    }

    #[test]
    fn test_validate_kubernetes_namespace() {
        assert!(validate_kubernetes_namespace("default", "secretRef.namespace").is_ok());
        assert!(validate_kubernetes_namespace("has.dot", "secretRef.namespace").is_err());
        assert!(validate_kubernetes_namespace(&"a".repeat(64), "secretRef.namespace").is_err());
    }

    #[test]
    fn test_validate_secret_key() {
        assert!(validate_secret_key("api_token.v1", "secretKey").is_ok());
        assert!(validate_secret_key("", "secretKey").is_err());
        assert!(validate_secret_key("has space", "secretKey").is_err());
    }
}
