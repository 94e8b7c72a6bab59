//! # Error Policy
//!
//! Requeue decisions for failed reconciliations. Configuration errors wait
//! for the fixed error requeue interval; everything else backs off per
//! resource with a Fibonacci sequence.

use crate::constants::DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS;
use crate::controller::reconciler::{resource_key, Reconciler, ReconcilerError};
use crate::observability;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle a reconciliation error for any of the managed kinds
pub fn handle_reconciliation_error<K>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        resource.kind = %kind,
        resource.name = %name,
        resource.namespace = %namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("❌ Reconciliation error for {kind} {namespace}/{name}: {error}");
    observability::increment_reconciliation_errors(&kind);

    if error.is_configuration_error() {
        let requeue = ctx.config.reconciliation_error_requeue_duration();
        info!(
            "🔄 Configuration error, retrying in {}s (trigger source: error-requeue)",
            requeue.as_secs()
        );
        return Action::requeue(requeue);
    }

    let (backoff_seconds, error_count) = ctx
        .next_backoff(&resource_key(&kind, &namespace, &name))
        .unwrap_or_else(|| {
            warn!("Failed to lock backoff state, using default backoff");
            (DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS, 0)
        });

    let backoff = Duration::from_secs(backoff_seconds);
    let next_trigger_time = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::from_std(backoff).unwrap_or(chrono::Duration::zero()))
        .map_or_else(|| "unknown".to_string(), |dt| dt.to_rfc3339());

    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: error-backoff)",
        backoff_seconds, error_count
    );
    info!(
        "📅 Next retry scheduled: {} (in {}s, trigger source: error-backoff)",
        next_trigger_time, backoff_seconds
    );

    Action::requeue(backoff)
}
