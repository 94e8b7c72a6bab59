//! # Status Updates
//!
//! Condition bookkeeping and status subresource patches for both kinds.

use crate::constants::FIELD_MANAGER;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::crd::Condition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_SYNCED: &str = "Synced";

pub const REASON_AVAILABLE: &str = "Available";
pub const REASON_UNAVAILABLE: &str = "Unavailable";
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";
pub const REASON_INVALID_CONFIGURATION: &str = "InvalidConfiguration";
pub const REASON_RETRIES_LIMIT_REACHED: &str = "RetriesLimitReached";

/// Set a condition, keeping its transition time when the status is unchanged
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: bool,
    reason: &str,
    message: impl Into<String>,
) {
    let status = if status { "True" } else { "False" }.to_string();
    let message = message.into();
    let now = chrono::Utc::now().to_rfc3339();

    match conditions.iter_mut().find(|c| c.r#type == condition_type) {
        Some(existing) => {
            if existing.status != status {
                existing.last_transition_time = Some(now);
            }
            existing.status = status;
            existing.reason = Some(reason.to_string());
            existing.message = (!message.is_empty()).then_some(message);
        }
        None => conditions.push(Condition {
            r#type: condition_type.to_string(),
            status,
            last_transition_time: Some(now),
            reason: Some(reason.to_string()),
            message: (!message.is_empty()).then_some(message),
        }),
    }
}

/// `Ready` reflects whether the last recorded response was a success
pub fn set_ready_from_response(conditions: &mut Vec<Condition>, status_code: u16, error: &str) {
    if crate::http::is_http_success(status_code) && error.is_empty() {
        set_condition(conditions, CONDITION_READY, true, REASON_AVAILABLE, "");
    } else {
        set_condition(conditions, CONDITION_READY, false, REASON_UNAVAILABLE, error);
    }
}

/// Write `status` to the status subresource of `obj`
///
/// # Errors
///
/// Returns the Kubernetes API error when the patch is rejected.
pub async fn patch_status<K, S>(
    reconciler: &Reconciler,
    obj: &K,
    status: &S,
) -> Result<(), ReconcilerError>
where
    K: Resource<Scope = kube::core::NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug,
    S: Serialize,
{
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let name = obj.name_any();
    let api: Api<K> = Api::namespaced(reconciler.client.clone(), &namespace);

    let patch = serde_json::json!({
        "status": status
    });

    api.patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
        .await?;
    debug!(resource.name = %name, resource.namespace = %namespace, "Status updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_condition_adds_new() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, CONDITION_SYNCED, true, REASON_RECONCILE_SUCCESS, "");
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].status, "True");
        assert!(conditions[0].message.is_none());
        assert!(conditions[0].last_transition_time.is_some());
    }

    #[test]
    fn test_set_condition_keeps_transition_time_when_unchanged() {
        let mut conditions = vec![Condition {
            r#type: CONDITION_READY.to_string(),
            status: "True".to_string(),
            last_transition_time: Some("2024-01-01T00:00:00+00:00".to_string()),
            reason: Some(REASON_AVAILABLE.to_string()),
            message: None,
        }];
        set_condition(&mut conditions, CONDITION_READY, true, REASON_AVAILABLE, "");
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );

        set_condition(&mut conditions, CONDITION_READY, false, REASON_UNAVAILABLE, "status code 500");
        assert_eq!(conditions[0].status, "False");
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
        assert_eq!(conditions[0].message.as_deref(), Some("status code 500"));
    }

    #[test]
    fn test_set_ready_from_response() {
        let mut conditions = Vec::new();
        set_ready_from_response(&mut conditions, 200, "");
        assert_eq!(conditions[0].status, "True");
        set_ready_from_response(&mut conditions, 200, "status code 500");
        assert_eq!(conditions[0].status, "False");
        set_ready_from_response(&mut conditions, 0, "");
        assert_eq!(conditions[0].reason.as_deref(), Some(REASON_UNAVAILABLE));
    }
}
