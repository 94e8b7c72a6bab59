//! Up-to-date checks
//!
//! The default check passes when the live body contains every field of the
//! desired body. A `CUSTOM` expected response check replaces it with a
//! boolean expression over the request context plus `.desired`. Either way
//! the live response must be an HTTP success.

use super::EngineError;
use crate::crd::{ExpectedResponseCheckType, RequestParameters, Response};
use crate::json;
use crate::query::QueryEvaluator;
use crate::requestgen::build_context;
use serde_json::Value;

/// Request context for `live` with the desired body added under `desired`
#[must_use]
pub fn desired_context(for_provider: &RequestParameters, live: &Response, desired_body: &str) -> Value {
    let mut context = build_context(for_provider, live);
    let desired = serde_json::from_str::<Value>(desired_body)
        .map_or_else(|_| Value::String(desired_body.to_string()), json::inflated);
    if let Value::Object(map) = &mut context {
        map.insert("desired".to_string(), desired);
    }
    context
}

/// Whether `live` matches `desired_body`
///
/// Bodies that are not JSON objects compare as empty objects.
///
/// # Errors
///
/// A custom check that fails to evaluate or is not boolean.
pub fn is_synced(
    evaluator: &dyn QueryEvaluator,
    for_provider: &RequestParameters,
    live: &Response,
    desired_body: &str,
) -> Result<bool, EngineError> {
    let check = for_provider
        .expected_response_check
        .as_ref()
        .filter(|check| check.r#type == ExpectedResponseCheckType::Custom && !check.logic.trim().is_empty());

    let matches = match check {
        Some(check) => {
            let context = desired_context(for_provider, live, desired_body);
            evaluator.evaluate_bool(&check.logic, &context)?
        }
        None => json::contains(
            &json::parse_loose_object(&live.body),
            &json::parse_loose_object(desired_body),
        ),
    };

    Ok(matches && crate::http::is_http_success(live.status_code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ExpectedResponseCheck;
    use crate::query::{JqEvaluator, QueryError};

    fn live(status_code: u16, body: &str) -> Response {
        Response {
            status_code,
            body: body.to_string(),
            ..Default::default()
        }
    }

    fn custom(logic: &str) -> RequestParameters {
        RequestParameters {
            expected_response_check: Some(ExpectedResponseCheck {
                r#type: ExpectedResponseCheckType::Custom,
                logic: logic.to_string(),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_check_ignores_extra_live_keys() {
        let params = RequestParameters::default();
        assert!(is_synced(&JqEvaluator, &params, &live(200, r#"{"a":1,"b":2}"#), r#"{"a":1}"#).unwrap());
        assert!(!is_synced(&JqEvaluator, &params, &live(200, r#"{"a":1,"b":2}"#), r#"{"a":2}"#).unwrap());
    }

    #[test]
    fn test_default_check_requires_success() {
        let params = RequestParameters::default();
        assert!(!is_synced(&JqEvaluator, &params, &live(500, r#"{"a":1}"#), r#"{"a":1}"#).unwrap());
    }

    #[test]
    fn test_non_json_bodies_compare_as_empty() {
        let params = RequestParameters::default();
        assert!(is_synced(&JqEvaluator, &params, &live(200, "plain text"), "").unwrap());
        assert!(!is_synced(&JqEvaluator, &params, &live(200, "plain text"), r#"{"a":1}"#).unwrap());
    }

    #[test]
    fn test_custom_check_sees_desired_and_response() {
        let params = custom(".response.body.name == .desired.name");
        let live_response = live(200, r#"{"name":"x","id":3}"#);
        assert!(is_synced(&JqEvaluator, &params, &live_response, r#"{"name":"x"}"#).unwrap());
        assert!(!is_synced(&JqEvaluator, &params, &live_response, r#"{"name":"y"}"#).unwrap());
    }

    #[test]
    fn test_custom_check_must_be_boolean() {
        let params = custom(".response.body.name");
        let err = is_synced(&JqEvaluator, &params, &live(200, r#"{"name":"x"}"#), "{}").unwrap_err();
        assert!(matches!(err, EngineError::Query(QueryError::NotBoolean { .. })));
    }

    #[test]
    fn test_desired_context_keeps_non_json_desired_as_text() {
        let context = desired_context(&RequestParameters::default(), &live(200, ""), "raw");
        assert_eq!(context["desired"], Value::String("raw".to_string()));
    }
}
