//! # Shared Resource Types
//!
//! Types shared by `Request` and `DisposableRequest`: recorded responses,
//! the rendered request kept in status, secret injection rules and
//! conditions.

use super::Action;
use crate::http::Headers;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// HTTP response as recorded in status
///
/// Body and header values never hold plaintext secret values: they are
/// redacted to `{{name:namespace:key}}` placeholders before being stored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(default)]
    pub status_code: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: Headers,
    /// HTTP method of the request that produced this response
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    /// Mapping action that sent the request, unset for disposable requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

impl Response {
    /// True when nothing has been recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status_code == 0 && self.body.is_empty() && self.headers.is_empty()
    }
}

/// The last request sent, before secret placeholders were resolved
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SentRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: Headers,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub name: String,
    pub namespace: String,
}

/// One secret key populated from one response path
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyMapping {
    pub secret_key: String,
    /// Query evaluated against `{statusCode, body, headers}` of the response
    pub response_path: String,
}

/// Labels and annotations applied to the target secret
///
/// Values are query expressions evaluated against the response and may
/// contain `{{name:namespace:key}}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretMetadata {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Declares which response fragments are moved into a secret
///
/// # Example
///
/// ```yaml
/// secretInjectionConfigs:
///   - secretRef:
///       name: api-credentials
///       namespace: default
///     keyMappings:
///       - secretKey: token
///         responsePath: .body.token
///     metadata:
///       labels:
///         app: .body.app
///     setOwnerReference: true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretInjectionConfig {
    pub secret_ref: SecretRef,
    /// Single-key form, used when `keyMappings` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// Single-key form, used when `keyMappings` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_mappings: Vec<KeyMapping>,
    #[serde(default)]
    pub metadata: SecretMetadata,
    /// Make the owning resource the secret's owner so it is garbage collected
    #[serde(default)]
    pub set_owner_reference: bool,
}

impl SecretInjectionConfig {
    /// Effective key mappings: `keyMappings` when present, else the single pair
    #[must_use]
    pub fn effective_key_mappings(&self) -> Vec<KeyMapping> {
        if !self.key_mappings.is_empty() {
            return self.key_mappings.clone();
        }
        match (&self.secret_key, &self.response_path) {
            (Some(secret_key), Some(response_path)) => vec![KeyMapping {
                secret_key: secret_key.clone(),
                response_path: response_path.clone(),
            }],
            _ => Vec::new(),
        }
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (Ready, Synced)
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
