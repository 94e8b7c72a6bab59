//! # Request
//!
//! A `Request` manages the full lifecycle of a remote HTTP resource: it is
//! created with the `CREATE` mapping, kept in sync through `OBSERVE` and
//! `UPDATE`, and removed with `REMOVE` when the resource is deleted.

use super::common::{Condition, Response, SecretInjectionConfig, SentRequest};
use crate::http::Headers;
use serde::{Deserialize, Serialize};

/// Request Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: http.resources.io/v1alpha2
/// kind: Request
/// metadata:
///   name: user
///   namespace: default
/// spec:
///   forProvider:
///     payload:
///       baseUrl: http://users.example.svc/v1/users
///       body: |
///         {"name": "alice"}
///     headers:
///       Content-Type: ["application/json"]
///     mappings:
///       - action: CREATE
///         method: POST
///         url: .payload.baseUrl
///         body: '{name: .payload.body.name}'
///       - action: OBSERVE
///         method: GET
///         url: '(.payload.baseUrl + "/" + (.response.body.id|tostring))'
///       - action: UPDATE
///         method: PUT
///         url: '(.payload.baseUrl + "/" + (.response.body.id|tostring))'
///         body: '{name: .payload.body.name}'
///       - action: REMOVE
///         method: DELETE
///         url: '(.payload.baseUrl + "/" + (.response.body.id|tostring))'
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Request",
    group = "http.resources.io",
    version = "v1alpha2",
    namespaced,
    status = "crate::crd::RequestStatus",
    shortname = "httpreq",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}, {"name":"Code", "type":"integer", "jsonPath":".status.response.statusCode"}, {"name":"Failed", "type":"integer", "jsonPath":".status.failed"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RequestSpec {
    pub for_provider: RequestParameters,
}

/// Desired state of a managed HTTP resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameters {
    /// Values referenced by mapping expressions as `.payload.*`
    #[serde(default)]
    pub payload: Payload,
    /// Headers applied to every mapping that does not override them
    #[serde(default)]
    pub headers: Headers,
    pub mappings: Vec<Mapping>,
    /// Transport timeout as a Kubernetes duration string (e.g. "30s", "5m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout: Option<String>,
    #[serde(default, rename = "insecureSkipTLSVerify")]
    pub insecure_skip_tls_verify: bool,
    /// Number of failed attempts after which the controller stops retrying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback_retries_limit: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_response_check: Option<ExpectedResponseCheck>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_injection_configs: Vec<SecretInjectionConfig>,
}

impl RequestParameters {
    /// Mapping used for `action`
    ///
    /// The first mapping declaring the action wins. Mappings without an
    /// action are matched by the action's default HTTP method.
    #[must_use]
    pub fn mapping(&self, action: Action) -> Option<&Mapping> {
        self.mappings
            .iter()
            .find(|m| m.action == Some(action))
            .or_else(|| {
                self.mappings.iter().find(|m| {
                    m.action.is_none()
                        && m.method
                            .as_deref()
                            .is_some_and(|method| method.eq_ignore_ascii_case(action.default_method()))
                })
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[serde(default)]
    pub base_url: String,
    /// JSON document (as text) exposed to expressions as `.payload.body`
    #[serde(default)]
    pub body: String,
}

/// Lifecycle step a mapping is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Create,
    Observe,
    Update,
    Remove,
}

impl Action {
    #[must_use]
    pub fn default_method(self) -> &'static str {
        match self {
            Action::Create => "POST",
            Action::Observe => "GET",
            Action::Update => "PUT",
            Action::Remove => "DELETE",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::Create => "CREATE",
            Action::Observe => "OBSERVE",
            Action::Update => "UPDATE",
            Action::Remove => "REMOVE",
        };
        f.write_str(name)
    }
}

/// How one action is turned into an HTTP call
///
/// `url`, `body` and header values are query expressions evaluated against
/// the request context (`forProvider` fields plus `.response`). Values that
/// do not look like expressions are used literally.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub body: String,
    /// Per-mapping header expressions; names not listed fall back to `forProvider.headers`
    #[serde(default, skip_serializing_if = "Headers::is_empty")]
    pub headers: Headers,
}

impl Mapping {
    /// HTTP method to send: the explicit method, else the action's default
    #[must_use]
    pub fn http_method(&self, action: Action) -> String {
        self.method
            .as_deref()
            .filter(|m| !m.is_empty())
            .map_or_else(|| action.default_method().to_string(), str::to_ascii_uppercase)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExpectedResponseCheckType {
    /// Live body must contain the desired body
    #[default]
    Default,
    /// `logic` decides
    Custom,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedResponseCheck {
    #[serde(default)]
    pub r#type: ExpectedResponseCheckType,
    /// Boolean expression over the request context with `.desired` added
    #[serde(default)]
    pub logic: String,
}

/// Last observed response that rendered a valid request
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cache {
    /// RFC3339 timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub response: Response,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatus {
    #[serde(default)]
    pub response: Response,
    #[serde(default)]
    pub cache: Cache,
    /// Failed attempts counted against `rollbackRetriesLimit`
    #[serde(default)]
    pub failed: i32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_details: Option<SentRequest>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile_time: Option<String>,
}
