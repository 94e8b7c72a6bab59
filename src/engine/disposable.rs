//! Fire-once requests
//!
//! A `DisposableRequest` is sent until it succeeds once and is never undone.
//! Its URL, body and headers are used as written, apart from secret
//! placeholder resolution.

use super::client::ExternalClient;
use super::retry::RetryState;
use super::status::{record_sent_request, to_response};
use super::{EngineError, ExternalObservation};
use crate::crd::{DisposableRequestParameters, DisposableRequestStatus};
use crate::http::HttpResponse;
use crate::requestgen::RequestDetails;
use crate::secrets::response_context;
use serde_json::json;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct DisposableExternal<'a> {
    client: ExternalClient<'a>,
}

impl<'a> DisposableExternal<'a> {
    #[must_use]
    pub fn new(client: ExternalClient<'a>) -> Self {
        Self { client }
    }

    /// A disposable request exists once it was sent successfully
    ///
    /// When the retries limit is reached the request is reported as existing
    /// and up to date so it is not sent again; the last error stays in status.
    #[must_use]
    pub fn observe(
        &self,
        for_provider: &DisposableRequestParameters,
        status: &DisposableRequestStatus,
    ) -> ExternalObservation {
        let retry = RetryState::new(status.failed, for_provider.rollback_retries_limit);
        if status.synced {
            return ExternalObservation::exists(retry.gate(true));
        }
        if retry.limit_reached() {
            debug!(failed = status.failed, "Retries limit reached, not sending again");
            return ExternalObservation::exists(true);
        }
        ExternalObservation::not_found()
    }

    /// Send the request once and record the outcome
    ///
    /// # Errors
    ///
    /// Secret resolution, transport failures, HTTP error statuses, a failed
    /// `expectedResponse` check and cancellation.
    pub async fn send(
        &self,
        for_provider: &DisposableRequestParameters,
        status: &mut DisposableRequestStatus,
    ) -> Result<(), EngineError> {
        let mut retry = RetryState::new(status.failed, for_provider.rollback_retries_limit);
        if retry.limit_reached() {
            return Err(EngineError::RetriesLimitReached {
                failed: retry.failed,
                limit: retry.limit.unwrap_or_default(),
            });
        }

        let method = for_provider.method.to_ascii_uppercase();
        let details = RequestDetails {
            url: for_provider.url.clone(),
            body: for_provider.body.clone(),
            headers: for_provider.headers.clone(),
        };

        info!(http.method = %method, http.url = %details.url, "🔄 Sending disposable request");
        let result = match self.client.send(&method, &details).await {
            Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
            result => result,
        };
        status.request_details = Some(record_sent_request(&method, &details));

        let outcome = match result {
            Ok(response) => {
                let redacted = self
                    .client
                    .redact(&response, &for_provider.secret_injection_configs)
                    .await?;
                status.response = to_response(&redacted, &method, None);
                self.check_response(for_provider, &response)
            }
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(()) => {
                retry.record_success();
                status.synced = true;
                status.error.clear();
            }
            Err(e) => {
                warn!(error = %e, "Disposable request failed");
                retry.record_failure();
                status.synced = false;
                status.error = e.to_string();
            }
        }
        status.failed = retry.failed;
        outcome
    }

    fn check_response(
        &self,
        for_provider: &DisposableRequestParameters,
        response: &HttpResponse,
    ) -> Result<(), EngineError> {
        if response.is_error() {
            return Err(EngineError::HttpStatus {
                code: response.status_code,
            });
        }

        let Some(check) = for_provider
            .expected_response
            .as_deref()
            .filter(|check| !check.trim().is_empty())
        else {
            return Ok(());
        };

        let context = json!({ "response": response_context(response) });
        if self.client.evaluator.evaluate_bool(check, &context)? {
            Ok(())
        } else {
            Err(EngineError::UnexpectedResponse {
                check: check.to_string(),
            })
        }
    }
}
