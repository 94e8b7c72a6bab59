//! # Response Redaction
//!
//! Moves sensitive response fragments into secrets and replaces them in the
//! response with their `{{name:namespace:key}}` placeholder, so only the
//! redacted response is ever recorded in status.
//!
//! For each [`SecretInjectionConfig`]:
//!
//! 1. Render metadata (labels/annotations) from the response, resolving placeholders
//! 2. Extract every key mapping's value; empty values are skipped
//! 3. Replace each extracted value in the body and header values with its placeholder
//! 4. Get or create the secret, write the values and metadata, update only on change
//!
//! Failures are logged per config and never abort the remaining configs.
//! Extracted values are redacted even when writing the secret fails.

use super::placeholder::{resolve_string_map, Placeholder};
use super::store::{OwnerRef, SecretStore};
use super::SecretError;
use crate::crd::SecretInjectionConfig;
use crate::http::HttpResponse;
use crate::json;
use crate::observability::metrics;
use crate::query::QueryEvaluator;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Context that response paths are evaluated against: `{statusCode, body, headers}`
#[must_use]
pub fn response_context(response: &HttpResponse) -> Value {
    json::inflated(json!({
        "statusCode": response.status_code,
        "body": response.body,
        "headers": response.headers,
    }))
}

/// Evaluate `path` against the response
///
/// Strings are used as-is and booleans as `"true"`/`"false"`. Anything else,
/// including evaluation errors, yields an empty value.
#[must_use]
pub fn extract_value(evaluator: &dyn QueryEvaluator, response: &HttpResponse, path: &str) -> String {
    let value = match evaluator.evaluate(path, &response_context(response)) {
        Ok(Value::String(s)) => s,
        Ok(Value::Bool(b)) => b.to_string(),
        Ok(_) => String::new(),
        Err(e) => {
            debug!(response.path = path, error = %e, "Response path did not evaluate");
            String::new()
        }
    };
    if value.is_empty() {
        info!(
            response.path = path,
            "Value at response path is empty, skipping"
        );
    }
    value
}

/// Replace every occurrence of `value` in body and header values with `placeholder`
pub fn redact_value(response: &mut HttpResponse, value: &str, placeholder: &Placeholder) {
    if value.is_empty() {
        return;
    }
    let replacement = placeholder.to_string();
    response.body = response.body.replace(value, &replacement);
    for header_values in response.headers.values_mut() {
        for header in header_values.iter_mut() {
            *header = header.replace(value, &replacement);
        }
    }
}

fn render_metadata(
    evaluator: &dyn QueryEvaluator,
    response: &HttpResponse,
    expressions: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    expressions
        .iter()
        .map(|(key, path)| (key.clone(), extract_value(evaluator, response, path)))
        .collect()
}

/// Applies secret injection rules to responses
#[derive(Debug, Clone, Copy)]
pub struct Redactor<'a> {
    store: &'a dyn SecretStore,
    evaluator: &'a dyn QueryEvaluator,
}

impl<'a> Redactor<'a> {
    #[must_use]
    pub fn new(store: &'a dyn SecretStore, evaluator: &'a dyn QueryEvaluator) -> Self {
        Self { store, evaluator }
    }

    /// Apply every config and return the redacted copy of `response`
    ///
    /// `owner` is attached to secrets whose config sets `setOwnerReference`.
    pub async fn redact(
        &self,
        response: &HttpResponse,
        owner: Option<&OwnerRef>,
        configs: &[SecretInjectionConfig],
    ) -> HttpResponse {
        let mut redacted = response.clone();
        for config in configs {
            let config_owner = if config.set_owner_reference { owner } else { None };
            if let Err(e) = self.apply(&mut redacted, config_owner, config).await {
                warn!(
                    secret.name = %config.secret_ref.name,
                    secret.namespace = %config.secret_ref.namespace,
                    error = %e,
                    "Couldn't patch data from response to secret"
                );
            }
        }
        redacted
    }

    /// Write the extracted values and redact them in `response`
    ///
    /// Returns the number of secret keys whose value was written.
    async fn apply(
        &self,
        response: &mut HttpResponse,
        owner: Option<&OwnerRef>,
        config: &SecretInjectionConfig,
    ) -> Result<usize, SecretError> {
        let secret_ref = &config.secret_ref;

        let labels = render_metadata(self.evaluator, response, &config.metadata.labels);
        let annotations = render_metadata(self.evaluator, response, &config.metadata.annotations);

        let mut values = Vec::new();
        for mapping in config.effective_key_mappings() {
            let value = extract_value(self.evaluator, response, &mapping.response_path);
            if value.is_empty() {
                continue;
            }
            let placeholder =
                Placeholder::new(&secret_ref.name, &secret_ref.namespace, &mapping.secret_key);
            redact_value(response, &value, &placeholder);
            values.push((mapping.secret_key, value));
        }

        let labels = resolve_string_map(self.store, &labels).await?;
        let annotations = resolve_string_map(self.store, &annotations).await?;

        let mut secret = self
            .store
            .get_or_create(&secret_ref.name, &secret_ref.namespace, owner, &labels, &annotations)
            .await?;

        let changed_keys = values
            .iter()
            .filter(|(key, value)| secret.set_value(key, value))
            .count();
        let metadata_changed = secret.reconcile_metadata(&labels, &annotations);

        if changed_keys == 0 && !metadata_changed {
            return Ok(0);
        }
        self.store.update(&secret).await?;
        debug!(
            secret.name = %secret_ref.name,
            secret.namespace = %secret_ref.namespace,
            keys = changed_keys,
            "Updated secret from response"
        );
        metrics::increment_secret_keys_injected(changed_keys);
        Ok(changed_keys)
    }
}
