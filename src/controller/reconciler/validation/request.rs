//! # Resource Validation
//!
//! Checks `forProvider` of both kinds before anything is sent. Failures are
//! configuration errors: they are reported in status and retried only at
//! the normal cadence.

use super::duration::parse_kubernetes_duration;
use super::kubernetes::{validate_kubernetes_name, validate_kubernetes_namespace, validate_secret_key};
use crate::crd::{
    DisposableRequestParameters, ExpectedResponseCheckType, RequestParameters,
    SecretInjectionConfig,
};
use anyhow::Result;
use std::collections::HashSet;

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Validate an HTTP method name (case-insensitive)
pub fn validate_http_method(method: &str, field_name: &str) -> Result<()> {
    let upper = method.trim().to_ascii_uppercase();
    if HTTP_METHODS.contains(&upper.as_str()) {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{field_name} '{method}' is not a supported HTTP method (expected one of {})",
            HTTP_METHODS.join(", ")
        ))
    }
}

/// Validate `forProvider` of a `Request`
pub fn validate_request_parameters(for_provider: &RequestParameters) -> Result<()> {
    if for_provider.mappings.is_empty() {
        return Err(anyhow::anyhow!("forProvider.mappings cannot be empty"));
    }

    let mut actions = HashSet::new();
    for (index, mapping) in for_provider.mappings.iter().enumerate() {
        let field = format!("forProvider.mappings[{index}]");
        if mapping.url.trim().is_empty() {
            return Err(anyhow::anyhow!("{field}.url cannot be empty"));
        }
        if let Some(method) = mapping.method.as_deref() {
            validate_http_method(method, &format!("{field}.method"))?;
        }
        if mapping.method.is_none() && mapping.action.is_none() {
            return Err(anyhow::anyhow!("{field} must set a method or an action"));
        }
        if let Some(action) = mapping.action {
            if !actions.insert(action) {
                return Err(anyhow::anyhow!("{field}: duplicate mapping for action {action}"));
            }
        }
    }

    if let Some(check) = &for_provider.expected_response_check {
        if check.r#type == ExpectedResponseCheckType::Custom && check.logic.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "forProvider.expectedResponseCheck.logic is required for CUSTOM checks"
            ));
        }
    }

    validate_common(
        for_provider.wait_timeout.as_deref(),
        for_provider.rollback_retries_limit,
        &for_provider.secret_injection_configs,
    )
}

/// Validate `forProvider` of a `DisposableRequest`
pub fn validate_disposable_request_parameters(for_provider: &DisposableRequestParameters) -> Result<()> {
    if for_provider.url.trim().is_empty() {
        return Err(anyhow::anyhow!("forProvider.url cannot be empty"));
    }
    validate_http_method(&for_provider.method, "forProvider.method")?;
    validate_common(
        for_provider.wait_timeout.as_deref(),
        for_provider.rollback_retries_limit,
        &for_provider.secret_injection_configs,
    )
}

fn validate_common(
    wait_timeout: Option<&str>,
    rollback_retries_limit: Option<i32>,
    configs: &[SecretInjectionConfig],
) -> Result<()> {
    if let Some(wait_timeout) = wait_timeout {
        parse_kubernetes_duration(wait_timeout)
            .map_err(|e| anyhow::anyhow!("forProvider.waitTimeout: {e}"))?;
    }
    if let Some(limit) = rollback_retries_limit {
        if limit < 0 {
            return Err(anyhow::anyhow!(
                "forProvider.rollbackRetriesLimit must not be negative, got {limit}"
            ));
        }
    }
    for (index, config) in configs.iter().enumerate() {
        validate_secret_injection_config(config, &format!("forProvider.secretInjectionConfigs[{index}]"))?;
    }
    Ok(())
}

fn validate_secret_injection_config(config: &SecretInjectionConfig, field: &str) -> Result<()> {
    validate_kubernetes_name(&config.secret_ref.name, &format!("{field}.secretRef.name"))?;
    validate_kubernetes_namespace(
        &config.secret_ref.namespace,
        &format!("{field}.secretRef.namespace"),
    )?;

    let mappings = config.effective_key_mappings();
    if mappings.is_empty() {
        return Err(anyhow::anyhow!(
            "{field} needs keyMappings or both secretKey and responsePath"
        ));
    }
    for (index, mapping) in mappings.iter().enumerate() {
        validate_secret_key(&mapping.secret_key, &format!("{field}.keyMappings[{index}].secretKey"))?;
        if mapping.response_path.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "{field}.keyMappings[{index}].responsePath cannot be empty"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Action, ExpectedResponseCheck, KeyMapping, Mapping, SecretRef};

    fn mapping(method: Option<&str>, action: Option<Action>, url: &str) -> Mapping {
        Mapping {
            method: method.map(str::to_string),
            action,
            url: url.to_string(),
            ..Default::default()
        }
    }

    fn valid() -> RequestParameters {
        RequestParameters {
            mappings: vec![
                mapping(Some("POST"), Some(Action::Create), ".payload.baseUrl"),
                mapping(Some("GET"), Some(Action::Observe), ".payload.baseUrl"),
            ],
            wait_timeout: Some("30s".to_string()),
            ..Default::default()
        }
    }

    fn injection(name: &str, keys: Vec<KeyMapping>) -> SecretInjectionConfig {
        SecretInjectionConfig {
            secret_ref: SecretRef {
                name: name.to_string(),
                namespace: "default".to_string(),
            },
            key_mappings: keys,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_request_parameters() {
        assert!(validate_request_parameters(&valid()).is_ok());
    }

    #[test]
    fn test_empty_url_rejected() {
        let mut params = valid();
        params.mappings[0].url = "  ".to_string();
        let err = validate_request_parameters(&params).unwrap_err();
        assert!(err.to_string().contains("mappings[0].url"));
    }

    #[test]
    fn test_invalid_method_rejected() {
        let mut params = valid();
        params.mappings[1].method = Some("FETCH".to_string());
        assert!(validate_request_parameters(&params).is_err());
    }

    #[test]
    fn test_duplicate_action_rejected() {
        let mut params = valid();
        params
            .mappings
            .push(mapping(Some("PATCH"), Some(Action::Create), ".payload.baseUrl"));
        let err = validate_request_parameters(&params).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_invalid_wait_timeout_rejected() {
        let mut params = valid();
        params.wait_timeout = Some("forever".to_string());
        assert!(validate_request_parameters(&params).is_err());
    }

    #[test]
    fn test_custom_check_requires_logic() {
        let mut params = valid();
        params.expected_response_check = Some(ExpectedResponseCheck {
            r#type: ExpectedResponseCheckType::Custom,
            logic: String::new(),
        });
        assert!(validate_request_parameters(&params).is_err());
    }

    #[test]
    fn test_secret_injection_needs_key_mapping() {
        let mut params = valid();
        params.secret_injection_configs = vec![injection("creds", Vec::new())];
        assert!(validate_request_parameters(&params).is_err());

        params.secret_injection_configs = vec![injection(
            "creds",
            vec![KeyMapping {
                secret_key: "token".to_string(),
                response_path: ".body.token".to_string(),
            }],
        )];
        assert!(validate_request_parameters(&params).is_ok());
    }

    #[test]
    fn test_secret_injection_needs_valid_name() {
        let mut params = valid();
        params.secret_injection_configs = vec![injection(
            "",
            vec![KeyMapping {
                secret_key: "token".to_string(),
                response_path: ".body.token".to_string(),
            }],
        )];
        assert!(validate_request_parameters(&params).is_err());
    }

    #[test]
    fn test_disposable_parameters() {
        let params = DisposableRequestParameters {
            url: "http://h/run".to_string(),
            method: "post".to_string(),
            ..Default::default()
        };
        assert!(validate_disposable_request_parameters(&params).is_ok());

        let params = DisposableRequestParameters {
            url: String::new(),
            method: "POST".to_string(),
            ..Default::default()
        };
        assert!(validate_disposable_request_parameters(&params).is_err());
    }
}
