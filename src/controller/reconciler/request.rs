//! # Request Reconciliation
//!
//! Drives `Request` resources through the finalizer: apply observes the
//! external resource and creates or updates it, cleanup removes it.

use crate::constants::FINALIZER;
use crate::controller::reconciler::status::{
    patch_status, set_condition, set_ready_from_response, CONDITION_READY, CONDITION_SYNCED,
    REASON_INVALID_CONFIGURATION, REASON_RECONCILE_ERROR, REASON_RECONCILE_SUCCESS,
    REASON_RETRIES_LIMIT_REACHED,
};
use crate::controller::reconciler::types::{
    owner_ref, resource_key, Reconciler, ReconcilerError,
};
use crate::controller::reconciler::validation::{validate_request_parameters, wait_timeout};
use crate::crd::{Action as MappingAction, Request, RequestParameters, RequestStatus};
use crate::engine::{EngineError, ExternalClient, RequestExternal};
use crate::http::{ReqwestTransport, STATUS_NOT_FOUND};
use crate::observability;
use kube::api::Api;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use kube_runtime::finalizer::{finalizer, Event};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

const KIND: &str = "Request";

/// What a successful apply did to the external resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    UpToDate,
}

impl SyncOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncOutcome::Created => "created",
            SyncOutcome::Updated => "updated",
            SyncOutcome::UpToDate => "up-to-date",
        }
    }
}

/// Reconcile one `Request`
///
/// # Errors
///
/// Validation, engine, Kubernetes API and finalizer errors; all of them are
/// handled by the error policy.
pub async fn reconcile_request(
    request: Arc<Request>,
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
        info!("🔄 Reconciling Request");
        observability::increment_reconciliations(KIND);

        let api: Api<Request> = Api::namespaced(ctx.client.clone(), &namespace);
        let reconciler: &Reconciler = &ctx;
        let result = finalizer(&api, FINALIZER, request, |event| async move {
            match event {
                Event::Apply(request) => apply_request(request, reconciler).await,
                Event::Cleanup(request) => cleanup_request(request, reconciler).await,
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

async fn apply_request(request: Arc<Request>, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let for_provider = &request.spec.for_provider;
    let previous = request.status.clone().unwrap_or_default();
    let mut status = previous.clone();

    let generation = request.metadata.generation;
    if status.observed_generation.is_some() && status.observed_generation != generation && status.failed != 0 {
        info!(failed = status.failed, "Spec changed, resetting failed attempts");
        status.failed = 0;
    }
    status.observed_generation = generation;
    status.last_reconcile_time = Some(chrono::Utc::now().to_rfc3339());

    if let Err(e) = validate_request_parameters(for_provider) {
        error!("❌ Validation failed: {e}");
        let message = format!("Validation failed: {e}");
        status.error.clone_from(&message);
        set_condition(&mut status.conditions, CONDITION_READY, false, REASON_INVALID_CONFIGURATION, &message);
        set_condition(&mut status.conditions, CONDITION_SYNCED, false, REASON_INVALID_CONFIGURATION, &message);
        write_status(ctx, &request, &previous, &status).await?;
        return Err(ReconcilerError::InvalidConfiguration(e.to_string()));
    }

    let transport = transport_for(ctx, for_provider)?;
    let external = RequestExternal::new(external_client(ctx, &transport, &request));
    let result = sync_request(&external, for_provider, &mut status).await;

    if matches!(result, Err(EngineError::Cancelled)) {
        info!("Reconcile cancelled by shutdown");
        return Ok(Action::await_change());
    }

    record_sync_result(&mut status, &result);
    write_status(ctx, &request, &previous, &status).await?;

    match result {
        Ok(outcome) => {
            info!(outcome = outcome.as_str(), "✅ Request reconciled");
            Ok(Action::requeue(ctx.config.poll_interval()))
        }
        Err(EngineError::RetriesLimitReached { failed, limit }) => {
            warn!(failed, limit, "Retries limit reached, waiting for a spec change");
            Ok(Action::requeue(ctx.config.poll_interval()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn cleanup_request(request: Arc<Request>, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let for_provider = &request.spec.for_provider;
    if for_provider.mapping(MappingAction::Remove).is_none() {
        warn!("No REMOVE mapping, leaving the external resource in place");
        return Ok(Action::await_change());
    }

    let previous = request.status.clone().unwrap_or_default();
    let mut status = previous.clone();
    let transport = transport_for(ctx, for_provider)?;
    let external = RequestExternal::new(external_client(ctx, &transport, &request));

    match delete_request(&external, for_provider, &mut status).await {
        Ok(true) => {
            info!("🗑️ External resource removed");
            Ok(Action::await_change())
        }
        Ok(false) => {
            info!("External resource does not exist, nothing to remove");
            Ok(Action::await_change())
        }
        Err(EngineError::Cancelled) => Err(EngineError::Cancelled.into()),
        Err(e) => {
            error!("❌ Failed to remove external resource: {e}");
            if status.error.is_empty() {
                status.error = e.to_string();
            }
            set_condition(&mut status.conditions, CONDITION_SYNCED, false, REASON_RECONCILE_ERROR, e.to_string());
            write_status(ctx, &request, &previous, &status).await?;
            Err(e.into())
        }
    }
}

/// Observe, then create or update as needed
///
/// # Errors
///
/// Any engine error from the observe or the write that followed it.
pub async fn sync_request(
    external: &RequestExternal<'_>,
    for_provider: &RequestParameters,
    status: &mut RequestStatus,
) -> Result<SyncOutcome, EngineError> {
    let observation = external.observe(for_provider, status).await?;
    if !observation.resource_exists {
        external.create(for_provider, status).await?;
        return Ok(SyncOutcome::Created);
    }
    if !observation.resource_up_to_date {
        external.update(for_provider, status).await?;
        return Ok(SyncOutcome::Updated);
    }
    Ok(SyncOutcome::UpToDate)
}

/// Observe, then delete when the resource exists
///
/// Returns whether a `REMOVE` call succeeded. A failed observe caused by
/// the resource's own configuration still attempts the delete, and a 404
/// from the delete counts as removed.
///
/// # Errors
///
/// Transport, HTTP status and cancellation errors.
pub async fn delete_request(
    external: &RequestExternal<'_>,
    for_provider: &RequestParameters,
    status: &mut RequestStatus,
) -> Result<bool, EngineError> {
    let exists = match external.observe(for_provider, status).await {
        Ok(observation) => observation.resource_exists,
        Err(e) if e.is_configuration_error() => {
            warn!(error = %e, "Observe failed, deleting anyway");
            true
        }
        Err(e) => return Err(e),
    };
    if !exists {
        return Ok(false);
    }

    match external.delete(for_provider, status).await {
        Ok(()) => Ok(true),
        Err(EngineError::HttpStatus { code }) if code == STATUS_NOT_FOUND => {
            status.error.clear();
            Ok(true)
        }
        Err(e) => Err(e),
    }
}

/// Set `Ready` and `Synced` from the outcome of an apply
pub fn record_sync_result(status: &mut RequestStatus, result: &Result<SyncOutcome, EngineError>) {
    match result {
        Ok(_) => {
            set_condition(&mut status.conditions, CONDITION_SYNCED, true, REASON_RECONCILE_SUCCESS, "");
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
    set_ready_from_response(&mut status.conditions, status.response.status_code, &status.error);
}

/// Whether `next` differs from `previous` in anything but timestamps and response headers
#[must_use]
pub fn status_changed(previous: &RequestStatus, next: &RequestStatus) -> bool {
    fn significant(status: &RequestStatus) -> RequestStatus {
        let mut status = status.clone();
        status.last_reconcile_time = None;
        status.cache.last_updated = None;
        status.response.headers.clear();
        status.cache.response.headers.clear();
        status
    }
    significant(previous) != significant(next)
}

async fn write_status(
    ctx: &Reconciler,
    request: &Request,
    previous: &RequestStatus,
    status: &RequestStatus,
) -> Result<(), ReconcilerError> {
    if request.status.is_some() && !status_changed(previous, status) {
        return Ok(());
    }
    patch_status(ctx, request, status).await
}

fn transport_for(ctx: &Reconciler, for_provider: &RequestParameters) -> Result<ReqwestTransport, ReconcilerError> {
    let timeout = wait_timeout(for_provider.wait_timeout.as_deref(), ctx.config.default_wait_timeout());
    ctx.transport(timeout, for_provider.insecure_skip_tls_verify)
        .map_err(|e| ReconcilerError::Engine(e.into()))
}

fn external_client<'a>(
    ctx: &'a Reconciler,
    transport: &'a ReqwestTransport,
    request: &Request,
) -> ExternalClient<'a> {
    let client = ExternalClient::new(
        transport,
        ctx.secret_store.as_ref(),
        ctx.evaluator.as_ref(),
        ctx.shutdown.child_token(),
    );
    match owner_ref(request) {
        Some(owner) => client.with_owner(owner),
        None => client,
    }
}
