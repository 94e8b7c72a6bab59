//! Observe/create/update/delete for `Request` resources

use super::cancel::run_cancellable;
use super::client::ExternalClient;
use super::observe::is_synced;
use super::retry::RetryState;
use super::status::{record_sent_request, set_request_status, to_response};
use super::{EngineError, ExternalObservation};
use crate::crd::{Action, Mapping, RequestParameters, RequestStatus, Response};
use crate::http::{is_http_error, STATUS_NOT_FOUND};
use crate::requestgen::{generate_request_details, is_request_valid, RequestDetails};
use crate::secrets::resolve_string;
use tracing::{debug, info};

/// Drives one `Request` resource towards its desired state
#[derive(Debug, Clone)]
pub struct RequestExternal<'a> {
    client: ExternalClient<'a>,
}

impl<'a> RequestExternal<'a> {
    #[must_use]
    pub fn new(client: ExternalClient<'a>) -> Self {
        Self { client }
    }

    /// Check whether the resource exists and matches its desired state
    ///
    /// Nothing recorded yet, or a recorded failed `CREATE`, means the resource
    /// was never created. Otherwise the `OBSERVE` mapping is sent; a 404
    /// also means it does not exist. The live response is recorded in
    /// `status`.
    ///
    /// # Errors
    ///
    /// Missing `OBSERVE`/`UPDATE` mappings, rendering failures, transport
    /// failures and HTTP error statuses other than 404.
    pub async fn observe(
        &self,
        for_provider: &RequestParameters,
        status: &mut RequestStatus,
    ) -> Result<ExternalObservation, EngineError> {
        if !was_created(&status.response) {
            debug!("No successful create recorded, resource does not exist");
            return Ok(ExternalObservation::not_found());
        }

        let mapping = mapping_for(for_provider, Action::Observe)?;
        let method = mapping.http_method(Action::Observe);
        let details = self.valid_request_details(
            Action::Observe,
            mapping,
            for_provider,
            &status.response,
            &status.cache.response,
        )?;

        let live = match self.client.send(&method, &details).await {
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            result => {
                status.request_details = Some(record_sent_request(&method, &details));
                result
            }
        };
        let live = match live {
            Ok(response) if response.status_code == STATUS_NOT_FOUND => {
                info!(http.url = %details.url, "🔍 External resource not found");
                return Ok(ExternalObservation::not_found());
            }
            Ok(response) => response,
            Err(e) => {
                status.error = e.to_string();
                return Err(e);
            }
        };

        let live_response = to_response(&live, &method, Some(Action::Observe));
        let desired = self.desired_state(for_provider, &live_response, &status.cache.response)?;
        let desired = run_cancellable(&self.client.cancel, resolve_string(self.client.store, &desired)).await?;
        let synced = is_synced(self.client.evaluator, for_provider, &live_response, &desired)?;

        let redacted = self
            .client
            .redact(&live, &for_provider.secret_injection_configs)
            .await?;
        set_request_status(
            self.client.evaluator,
            status,
            for_provider,
            mapping,
            Action::Observe,
            &method,
            Ok(redacted),
        )?;

        let retry = RetryState::new(status.failed, for_provider.rollback_retries_limit);
        let up_to_date = retry.gate(synced);
        debug!(synced, failed = status.failed, up_to_date, "Observed external resource");
        Ok(ExternalObservation::exists(up_to_date))
    }

    /// Send the `CREATE` mapping
    ///
    /// # Errors
    ///
    /// See [`RequestExternal::deploy`].
    pub async fn create(
        &self,
        for_provider: &RequestParameters,
        status: &mut RequestStatus,
    ) -> Result<(), EngineError> {
        self.deploy(Action::Create, for_provider, status).await
    }

    /// Send the `UPDATE` mapping
    ///
    /// # Errors
    ///
    /// See [`RequestExternal::deploy`].
    pub async fn update(
        &self,
        for_provider: &RequestParameters,
        status: &mut RequestStatus,
    ) -> Result<(), EngineError> {
        self.deploy(Action::Update, for_provider, status).await
    }

    /// Send the `REMOVE` mapping
    ///
    /// Deletion is attempted even when the retries limit is reached.
    ///
    /// # Errors
    ///
    /// See [`RequestExternal::deploy`].
    pub async fn delete(
        &self,
        for_provider: &RequestParameters,
        status: &mut RequestStatus,
    ) -> Result<(), EngineError> {
        self.deploy(Action::Remove, for_provider, status).await
    }

    /// Render, resolve, send and record the mapping for `action`
    ///
    /// Failed attempts count against `rollbackRetriesLimit`; once it is
    /// reached create and update are no longer sent.
    ///
    /// # Errors
    ///
    /// Missing mapping, invalid request, secret resolution, transport,
    /// HTTP status and cancellation errors.
    pub async fn deploy(
        &self,
        action: Action,
        for_provider: &RequestParameters,
        status: &mut RequestStatus,
    ) -> Result<(), EngineError> {
        let mut retry = RetryState::new(status.failed, for_provider.rollback_retries_limit);
        if action != Action::Remove && retry.limit_reached() {
            let limit = retry.limit.unwrap_or_default();
            return Err(EngineError::RetriesLimitReached {
                failed: retry.failed,
                limit,
            });
        }

        let mapping = mapping_for(for_provider, action)?;
        let method = mapping.http_method(action);
        let details = self.valid_request_details(
            action,
            mapping,
            for_provider,
            &status.response,
            &status.cache.response,
        )?;

        info!(action = %action, http.method = %method, http.url = %details.url, "🔄 Sending request");
        let result = match self.client.send(&method, &details).await {
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            result => result,
        };
        status.request_details = Some(record_sent_request(&method, &details));

        let result = match result {
            Ok(response) => Ok(self
                .client
                .redact(&response, &for_provider.secret_injection_configs)
                .await?),
            Err(e) => Err(e),
        };

        let outcome = set_request_status(
            self.client.evaluator,
            status,
            for_provider,
            mapping,
            action,
            &method,
            result,
        );
        match &outcome {
            Ok(()) => retry.record_success(),
            Err(_) => retry.record_failure(),
        }
        status.failed = retry.failed;
        outcome
    }

    /// Body the `UPDATE` mapping renders to, first against `live`, then the cache
    fn desired_state(
        &self,
        for_provider: &RequestParameters,
        live: &Response,
        cache: &Response,
    ) -> Result<String, EngineError> {
        let mapping = mapping_for(for_provider, Action::Update)?;
        let details = self.valid_request_details(Action::Update, mapping, for_provider, live, cache)?;
        Ok(details.body)
    }

    /// Render against `primary`; when that fails or is invalid, render against `fallback`
    fn valid_request_details(
        &self,
        action: Action,
        mapping: &Mapping,
        for_provider: &RequestParameters,
        primary: &Response,
        fallback: &Response,
    ) -> Result<RequestDetails, EngineError> {
        let evaluator = self.client.evaluator;
        if let Ok(details) = generate_request_details(evaluator, mapping, for_provider, primary) {
            if is_request_valid(&details) {
                return Ok(details);
            }
        }

        let details = generate_request_details(evaluator, mapping, for_provider, fallback)?;
        if is_request_valid(&details) {
            Ok(details)
        } else {
            Err(EngineError::InvalidRequest {
                action,
                url: details.url,
            })
        }
    }
}

fn mapping_for(for_provider: &RequestParameters, action: Action) -> Result<&Mapping, EngineError> {
    for_provider
        .mapping(action)
        .ok_or(EngineError::MissingMapping { action })
}

/// A resource exists once a response was recorded that is not a failed create
fn was_created(response: &Response) -> bool {
    if response.body.is_empty() {
        return false;
    }
    !(response.action == Some(Action::Create) && is_http_error(response.status_code))
}
