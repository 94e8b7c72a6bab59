//! Shared send path for both resource kinds

use super::cancel::run_cancellable;
use super::EngineError;
use crate::crd::SecretInjectionConfig;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::observability::metrics;
use crate::query::QueryEvaluator;
use crate::requestgen::RequestDetails;
use crate::secrets::{resolve_headers, resolve_string, OwnerRef, Redactor, SecretStore};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// External collaborators of one reconcile cycle
#[derive(Debug, Clone)]
pub struct ExternalClient<'a> {
    pub transport: &'a dyn HttpTransport,
    pub store: &'a dyn SecretStore,
    pub evaluator: &'a dyn QueryEvaluator,
    pub cancel: CancellationToken,
    /// Attached to secrets created with `setOwnerReference`
    pub owner: Option<OwnerRef>,
}

impl<'a> ExternalClient<'a> {
    #[must_use]
    pub fn new(
        transport: &'a dyn HttpTransport,
        store: &'a dyn SecretStore,
        evaluator: &'a dyn QueryEvaluator,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            store,
            evaluator,
            cancel,
            owner: None,
        }
    }

    #[must_use]
    pub fn with_owner(mut self, owner: OwnerRef) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Resolve secret placeholders in `details` and send the request
    ///
    /// `details` is left untouched so the unresolved form can be recorded.
    ///
    /// # Errors
    ///
    /// Fails on placeholder resolution, transport failure or cancellation.
    /// HTTP error statuses are returned as responses.
    pub async fn send(&self, method: &str, details: &RequestDetails) -> Result<HttpResponse, EngineError> {
        let request = HttpRequest {
            method: method.to_string(),
            url: run_cancellable(&self.cancel, resolve_string(self.store, &details.url)).await?,
            body: run_cancellable(&self.cancel, resolve_string(self.store, &details.body)).await?,
            headers: run_cancellable(&self.cancel, resolve_headers(self.store, &details.headers))
                .await?,
        };

        debug!(http.method = method, http.url = %details.url, "Sending request");
        let start = Instant::now();
        let result = run_cancellable(&self.cancel, self.transport.send(&request)).await;
        let elapsed = start.elapsed().as_secs_f64();

        let outcome = match &result {
            Ok(response) if response.is_success() => "success",
            Ok(response) if response.is_error() => "http_error",
            Ok(_) => "other",
            Err(EngineError::Cancelled) => return result,
            Err(_) => "transport_error",
        };
        metrics::record_http_request(method, outcome, elapsed);
        result
    }

    /// Apply secret injection rules to `response`, returning the redacted copy
    ///
    /// # Errors
    ///
    /// Only cancellation; per-rule failures are logged by the redactor.
    pub async fn redact(
        &self,
        response: &HttpResponse,
        configs: &[SecretInjectionConfig],
    ) -> Result<HttpResponse, EngineError> {
        if configs.is_empty() {
            return Ok(response.clone());
        }
        let redactor = Redactor::new(self.store, self.evaluator);
        run_cancellable(
            &self.cancel,
            async { Ok::<_, EngineError>(redactor.redact(response, self.owner.as_ref(), configs).await) },
        )
        .await
    }
}
