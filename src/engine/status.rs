//! Recording request outcomes in `RequestStatus`

use super::EngineError;
use crate::crd::{Action, Cache, Mapping, RequestParameters, RequestStatus, Response, SentRequest};
use crate::http::HttpResponse;
use crate::query::QueryEvaluator;
use crate::requestgen::{generate_request_details, is_request_valid, RequestDetails};
use tracing::debug;

/// Convert a transport response into its recorded form
#[must_use]
pub fn to_response(response: &HttpResponse, method: &str, action: Option<Action>) -> Response {
    Response {
        status_code: response.status_code,
        body: response.body.clone(),
        headers: response.headers.clone(),
        method: method.to_string(),
        action,
    }
}

/// Keep the rendered request, secrets still as placeholders
#[must_use]
pub fn record_sent_request(method: &str, details: &RequestDetails) -> SentRequest {
    SentRequest {
        method: method.to_string(),
        url: details.url.clone(),
        body: details.body.clone(),
        headers: details.headers.clone(),
    }
}

/// Record the outcome of a call in `status`
///
/// `result` must already be redacted. Transport failures only set the
/// error. HTTP error statuses record the response and fail with
/// [`EngineError::HttpStatus`]. A successful response also becomes the
/// cache when `mapping` renders a valid request against it.
///
/// # Errors
///
/// Returns the transport error or the HTTP status error.
pub fn set_request_status(
    evaluator: &dyn QueryEvaluator,
    status: &mut RequestStatus,
    for_provider: &RequestParameters,
    mapping: &Mapping,
    action: Action,
    method: &str,
    result: Result<HttpResponse, EngineError>,
) -> Result<(), EngineError> {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            status.error = e.to_string();
            return Err(e);
        }
    };

    status.response = to_response(&response, method, Some(action));

    if response.is_error() {
        let err = EngineError::HttpStatus {
            code: response.status_code,
        };
        status.error = err.to_string();
        return Err(err);
    }

    status.error.clear();
    if response.is_success() && should_set_cache(evaluator, mapping, for_provider, &status.response) {
        debug!(http.method = method, "Caching response");
        status.cache = Cache {
            last_updated: Some(chrono::Utc::now().to_rfc3339()),
            response: status.response.clone(),
        };
    }
    Ok(())
}

fn should_set_cache(
    evaluator: &dyn QueryEvaluator,
    mapping: &Mapping,
    for_provider: &RequestParameters,
    response: &Response,
) -> bool {
    generate_request_details(evaluator, mapping, for_provider, response)
        .is_ok_and(|details| is_request_valid(&details))
}
