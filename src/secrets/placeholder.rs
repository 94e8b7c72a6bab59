//! # Placeholder Resolution
//!
//! Replaces `{{name:namespace:key}}` tokens with the value stored in the
//! referenced secret. Every function works on a copy; inputs are never
//! modified.

use super::store::SecretStore;
use super::SecretError;
use crate::http::Headers;
use crate::observability::metrics;
use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^:{}\s]+):([^:{}\s]+):([^:{}\s]+)\s*\}\}")
        .expect("Failed to compile placeholder regex - this should never happen")
});

/// A `{{name:namespace:key}}` reference to a secret value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    pub name: String,
    pub namespace: String,
    pub key: String,
}

impl Placeholder {
    #[must_use]
    pub fn new(name: &str, namespace: &str, key: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }
}

/// Canonical form, without inner whitespace
impl std::fmt::Display for Placeholder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{{{}:{}:{}}}}}", self.name, self.namespace, self.key)
    }
}

/// Distinct placeholders in `text`, in order of first appearance, paired
/// with the exact text that matched
#[must_use]
pub fn find_placeholders(text: &str) -> Vec<(String, Placeholder)> {
    let mut found: Vec<(String, Placeholder)> = Vec::new();
    for captures in PLACEHOLDER_REGEX.captures_iter(text) {
        let raw = captures[0].to_string();
        if found.iter().any(|(seen, _)| *seen == raw) {
            continue;
        }
        let placeholder = Placeholder::new(&captures[1], &captures[2], &captures[3]);
        found.push((raw, placeholder));
    }
    found
}

/// Resolve every placeholder in `text`
///
/// # Errors
///
/// Fails without partial substitution when a referenced secret or key is
/// missing or the store cannot be read.
pub async fn resolve_string(store: &dyn SecretStore, text: &str) -> Result<String, SecretError> {
    let placeholders = find_placeholders(text);
    if placeholders.is_empty() {
        return Ok(text.to_string());
    }

    let mut resolved = text.to_string();
    for (raw, placeholder) in &placeholders {
        let secret = store.get(&placeholder.name, &placeholder.namespace).await?;
        let value = secret
            .value(&placeholder.key)
            .ok_or_else(|| SecretError::MissingKey {
                name: placeholder.name.clone(),
                namespace: placeholder.namespace.clone(),
                key: placeholder.key.clone(),
            })?;
        resolved = resolved.replace(raw.as_str(), &value);
    }

    metrics::increment_placeholders_resolved(placeholders.len());
    Ok(resolved)
}

/// Resolve placeholders in every header value
///
/// # Errors
///
/// See [`resolve_string`].
pub async fn resolve_headers(store: &dyn SecretStore, headers: &Headers) -> Result<Headers, SecretError> {
    let mut resolved = Headers::new();
    for (name, values) in headers {
        let mut resolved_values = Vec::with_capacity(values.len());
        for value in values {
            resolved_values.push(resolve_string(store, value).await?);
        }
        resolved.insert(name.clone(), resolved_values);
    }
    Ok(resolved)
}

/// Resolve placeholders in the values of a string map
///
/// # Errors
///
/// See [`resolve_string`].
pub async fn resolve_string_map(
    store: &dyn SecretStore,
    map: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, SecretError> {
    let mut resolved = BTreeMap::new();
    for (key, value) in map {
        resolved.insert(key.clone(), resolve_string(store, value).await?);
    }
    Ok(resolved)
}

/// Resolve placeholders in every string nested anywhere in `value`
///
/// # Errors
///
/// See [`resolve_string`].
pub fn resolve_value<'a>(
    store: &'a dyn SecretStore,
    value: &'a Value,
) -> BoxFuture<'a, Result<Value, SecretError>> {
    async move {
        match value {
            Value::String(text) => Ok(Value::String(resolve_string(store, text).await?)),
            Value::Array(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(resolve_value(store, item).await?);
                }
                Ok(Value::Array(resolved))
            }
            Value::Object(map) => {
                let mut resolved = serde_json::Map::new();
                for (key, item) in map {
                    resolved.insert(key.clone(), resolve_value(store, item).await?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }
    .boxed()
}
