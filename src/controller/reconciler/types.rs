//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::engine::EngineError;
use crate::http::{ReqwestTransport, TransportError};
use crate::query::QueryEvaluator;
use crate::secrets::{OwnerRef, SecretStore};
use kube::{Client, Resource, ResourceExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<kube_runtime::finalizer::Error<ReconcilerError>>),
}

impl ReconcilerError {
    /// Errors that a retry cannot fix until the resource changes
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        match self {
            ReconcilerError::InvalidConfiguration(_) => true,
            ReconcilerError::Engine(e) => e.is_configuration_error(),
            ReconcilerError::Finalizer(e) => matches!(
                e.as_ref(),
                kube_runtime::finalizer::Error::ApplyFailed(inner)
                    | kube_runtime::finalizer::Error::CleanupFailed(inner)
                    if inner.is_configuration_error()
            ),
            _ => false,
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared state of both controllers
#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub config: ControllerConfig,
    pub secret_store: Arc<dyn SecretStore>,
    pub evaluator: Arc<dyn QueryEvaluator>,
    /// Cancelled on shutdown; every reconcile cycle runs on a child token
    pub shutdown: CancellationToken,
    // Backoff state per resource, keyed by kind/namespace/name
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("secret_store", &self.secret_store)
            .field("evaluator", &self.evaluator)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        client: Client,
        config: ControllerConfig,
        secret_store: Arc<dyn SecretStore>,
        evaluator: Arc<dyn QueryEvaluator>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            client,
            config,
            secret_store,
            evaluator,
            shutdown,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Transport for one resource, honoring its timeout and TLS policy
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn transport(
        &self,
        wait_timeout: Duration,
        insecure_skip_tls_verify: bool,
    ) -> Result<ReqwestTransport, TransportError> {
        ReqwestTransport::new(wait_timeout, insecure_skip_tls_verify)
    }

    /// Next backoff for a failing resource
    ///
    /// Returns the delay in seconds and the resource's consecutive error count.
    #[must_use]
    pub fn next_backoff(&self, key: &str) -> Option<(u64, u32)> {
        let mut states = self.backoff_states.lock().ok()?;
        let state = states.entry(key.to_string()).or_insert_with(|| {
            BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
        });
        state.increment_error();
        Some((state.backoff.next_backoff_seconds(), state.error_count))
    }

    /// Forget the backoff of a resource after a clean cycle
    pub fn reset_backoff(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(key) {
                state.reset();
            }
        }
    }
}

/// Key used for per-resource backoff state
#[must_use]
pub fn resource_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind}/{namespace}/{name}")
}

/// Owner reference for secrets written on behalf of `obj`
///
/// `None` until the API server has assigned a uid.
#[must_use]
pub fn owner_ref<K>(obj: &K) -> Option<OwnerRef>
where
    K: Resource<DynamicType = ()>,
{
    let uid = obj.uid()?;
    Some(OwnerRef {
        api_version: K::api_version(&()).into_owned(),
        kind: K::kind(&()).into_owned(),
        name: obj.name_any(),
        uid,
    })
}
