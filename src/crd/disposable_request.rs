//! # DisposableRequest
//!
//! A fire-once HTTP call. It is sent until it succeeds (or the retry limit is
//! reached) and never undone.

use super::common::{Condition, Response, SecretInjectionConfig, SentRequest};
use crate::http::Headers;
use serde::{Deserialize, Serialize};

/// DisposableRequest Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: http.resources.io/v1alpha1
/// kind: DisposableRequest
/// metadata:
///   name: issue-token
///   namespace: default
/// spec:
///   forProvider:
///     url: http://auth.example.svc/token
///     method: POST
///     body: '{"user": "{{creds:default:username}}"}'
///     expectedResponse: '.response.statusCode == 200'
///     secretInjectionConfigs:
///       - secretRef: {name: issued-token, namespace: default}
///         secretKey: token
///         responsePath: .body.token
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "DisposableRequest",
    group = "http.resources.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::DisposableRequestStatus",
    shortname = "disreq",
    printcolumn = r#"{"name":"Synced", "type":"boolean", "jsonPath":".status.synced"}, {"name":"Code", "type":"integer", "jsonPath":".status.response.statusCode"}, {"name":"Failed", "type":"integer", "jsonPath":".status.failed"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DisposableRequestSpec {
    pub for_provider: DisposableRequestParameters,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisposableRequestParameters {
    pub url: String,
    pub method: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(default)]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_retries_limit: Option<i32>,
    #[serde(default, rename = "insecureSkipTLSVerify")]
    pub insecure_skip_tls_verify: bool,
    /// Boolean expression over `{response}` deciding whether the call succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_response: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_injection_configs: Vec<SecretInjectionConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisposableRequestStatus {
    #[serde(default)]
    pub response: Response,
    #[serde(default)]
    pub failed: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default)]
    pub synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_details: Option<SentRequest>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile_time: Option<String>,
}
