//! # DisposableRequest Reconciliation
//!
//! Sends a `DisposableRequest` until it succeeds once. Deleting the
//! resource only releases the finalizer.

use crate::constants::FINALIZER;
use crate::controller::reconciler::request::SyncOutcome;
use crate::controller::reconciler::status::{
    patch_status, set_condition, CONDITION_READY, CONDITION_SYNCED, REASON_AVAILABLE,
    REASON_INVALID_CONFIGURATION, REASON_RECONCILE_ERROR, REASON_RECONCILE_SUCCESS,
    REASON_RETRIES_LIMIT_REACHED, REASON_UNAVAILABLE,
};
use crate::controller::reconciler::types::{
    owner_ref, resource_key, Reconciler, ReconcilerError,
};
use crate::controller::reconciler::validation::{
    validate_disposable_request_parameters, wait_timeout,
};
use crate::crd::{DisposableRequest, DisposableRequestParameters, DisposableRequestStatus};
use crate::engine::{DisposableExternal, EngineError, ExternalClient, RetryState};
use crate::observability;
use kube::api::Api;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use kube_runtime::finalizer::{finalizer, Event};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

const KIND: &str = "DisposableRequest";

/// Reconcile one `DisposableRequest`
///
/// # Errors
///
/// Validation, engine, Kubernetes API and finalizer errors.
pub async fn reconcile_disposable(
    request: Arc<DisposableRequest>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let name = request.name_any();
    let namespace = request.namespace().unwrap_or_else(|| "default".to_string());
    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        resource.name = %name,
        resource.namespace = %namespace,
        resource.kind = KIND
    );

    async move {
        info!("🔄 Reconciling DisposableRequest");
        observability::increment_reconciliations(KIND);

        let api: Api<DisposableRequest> = Api::namespaced(ctx.client.clone(), &namespace);
        let reconciler: &Reconciler = &ctx;
        let result = finalizer(&api, FINALIZER, request, |event| async move {
            match event {
                Event::Apply(request) => apply_disposable(request, reconciler).await,
                Event::Cleanup(_) => {
                    info!("DisposableRequest deleted, nothing to undo");
                    Ok(Action::await_change())
                }
            }
        })
        .await
        .map_err(|e| ReconcilerError::Finalizer(Box::new(e)));

        observability::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        if result.is_ok() {
            ctx.reset_backoff(&resource_key(KIND, &namespace, &name));
        }
        result
    }
    .instrument(span)
    .await
}

async fn apply_disposable(
    request: Arc<DisposableRequest>,
    ctx: &Reconciler,
) -> Result<Action, ReconcilerError> {
    let for_provider = &request.spec.for_provider;
    let previous = request.status.clone().unwrap_or_default();
    let mut status = previous.clone();
    status.last_reconcile_time = Some(chrono::Utc::now().to_rfc3339());

    if let Err(e) = validate_disposable_request_parameters(for_provider) {
        error!("❌ Validation failed: {e}");
        let message = format!("Validation failed: {e}");
        status.error.clone_from(&message);
        set_condition(&mut status.conditions, CONDITION_READY, false, REASON_INVALID_CONFIGURATION, &message);
        set_condition(&mut status.conditions, CONDITION_SYNCED, false, REASON_INVALID_CONFIGURATION, &message);
        write_status(ctx, &request, &previous, &status).await?;
        return Err(ReconcilerError::InvalidConfiguration(e.to_string()));
    }

    let timeout = wait_timeout(for_provider.wait_timeout.as_deref(), ctx.config.default_wait_timeout());
    let transport = ctx
        .transport(timeout, for_provider.insecure_skip_tls_verify)
        .map_err(|e| ReconcilerError::Engine(e.into()))?;
    let mut client = ExternalClient::new(
        &transport,
        ctx.secret_store.as_ref(),
        ctx.evaluator.as_ref(),
        ctx.shutdown.child_token(),
    );
    if let Some(owner) = owner_ref(request.as_ref()) {
        client = client.with_owner(owner);
    }
    let external = DisposableExternal::new(client);

    let result = sync_disposable(&external, for_provider, &mut status).await;
    if matches!(result, Err(EngineError::Cancelled)) {
        info!("Reconcile cancelled by shutdown");
        return Ok(Action::await_change());
    }

    record_disposable_result(&mut status, for_provider, &result);
    write_status(ctx, &request, &previous, &status).await?;

    match result {
        Ok(outcome) => {
            info!(outcome = outcome.as_str(), synced = status.synced, "✅ DisposableRequest reconciled");
            Ok(Action::requeue(ctx.config.poll_interval()))
        }
        Err(EngineError::RetriesLimitReached { failed, limit }) => {
            warn!(failed, limit, "Retries limit reached, not sending again");
            Ok(Action::requeue(ctx.config.poll_interval()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Send the request unless it already succeeded
///
/// # Errors
///
/// Any engine error from the send.
pub async fn sync_disposable(
    external: &DisposableExternal<'_>,
    for_provider: &DisposableRequestParameters,
    status: &mut DisposableRequestStatus,
) -> Result<SyncOutcome, EngineError> {
    let observation = external.observe(for_provider, status);
    if observation.resource_exists && observation.resource_up_to_date {
        return Ok(SyncOutcome::UpToDate);
    }
    external.send(for_provider, status).await?;
    if observation.resource_exists {
        Ok(SyncOutcome::Updated)
    } else {
        Ok(SyncOutcome::Created)
    }
}

/// Set `Ready` and `Synced` from the outcome of an apply
pub fn record_disposable_result(
    status: &mut DisposableRequestStatus,
    for_provider: &DisposableRequestParameters,
    result: &Result<SyncOutcome, EngineError>,
) {
    let retry = RetryState::new(status.failed, for_provider.rollback_retries_limit);
    match result {
        Ok(_) if status.synced => {
            set_condition(&mut status.conditions, CONDITION_SYNCED, true, REASON_RECONCILE_SUCCESS, "");
        }
        Ok(_) if retry.limit_reached() => {
            let message = format!("retries limit reached after {} attempts: {}", status.failed, status.error);
            set_condition(&mut status.conditions, CONDITION_SYNCED, false, REASON_RETRIES_LIMIT_REACHED, message);
        }
        Ok(_) => {
            set_condition(&mut status.conditions, CONDITION_SYNCED, false, REASON_RECONCILE_ERROR, status.error.clone());
        }
        Err(e @ EngineError::RetriesLimitReached { .. }) => {
            set_condition(&mut status.conditions, CONDITION_SYNCED, false, REASON_RETRIES_LIMIT_REACHED, e.to_string());
        }
        Err(e) => {
            if status.error.is_empty() {
                status.error = e.to_string();
            }
            set_condition(&mut status.conditions, CONDITION_SYNCED, false, REASON_RECONCILE_ERROR, e.to_string());
        }
    }

    if status.synced {
        set_condition(&mut status.conditions, CONDITION_READY, true, REASON_AVAILABLE, "");
    } else {
        let message = status.error.clone();
        set_condition(&mut status.conditions, CONDITION_READY, false, REASON_UNAVAILABLE, message);
    }
}

/// Whether `next` differs from `previous` in anything but timestamps and response headers
#[must_use]
pub fn disposable_status_changed(previous: &DisposableRequestStatus, next: &DisposableRequestStatus) -> bool {
    fn significant(status: &DisposableRequestStatus) -> DisposableRequestStatus {
        let mut status = status.clone();
        status.last_reconcile_time = None;
        status.response.headers.clear();
        status
    }
    significant(previous) != significant(next)
}

async fn write_status(
    ctx: &Reconciler,
    request: &DisposableRequest,
    previous: &DisposableRequestStatus,
    status: &DisposableRequestStatus,
) -> Result<(), ReconcilerError> {
    if request.status.is_some() && !disposable_status_changed(previous, status) {
        return Ok(());
    }
    patch_status(ctx, request, status).await
}
