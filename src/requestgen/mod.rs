//! # Request Generation
//!
//! Turns a [`Mapping`] into concrete request details:
//!
//! 1. [`build_context`] merges `forProvider` with a recorded response under
//!    `.response` and inflates embedded JSON strings
//! 2. [`generate_request_details`] evaluates the mapping's URL, body and
//!    header expressions against that context
//! 3. [`is_request_valid`] rejects requests that reference missing fields
//!
//! Secret placeholders are left untouched here; they are resolved just
//! before the request is sent.

use crate::crd::{Mapping, RequestParameters, Response};
use crate::http::Headers;
use crate::json;
use crate::query::{QueryError, QueryEvaluator};
use serde_json::{Map, Value};

/// Marker left in rendered text when an expression referenced a missing field
pub const NULL_MARKER: &str = "null";

/// Rendered request, before secret resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDetails {
    pub url: String,
    pub body: String,
    pub headers: Headers,
}

/// Build the evaluation context for a mapping
///
/// Top-level keys are the `forProvider` fields (`payload`, `headers`,
/// `mappings`, ...) plus `response`. String values holding JSON documents
/// are replaced with their parsed form so expressions can reach into them,
/// e.g. `.payload.body.name` or `.response.body.id`.
#[must_use]
pub fn build_context(for_provider: &RequestParameters, response: &Response) -> Value {
    let mut context = match serde_json::to_value(for_provider) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    context.insert(
        "response".to_string(),
        serde_json::to_value(response).unwrap_or_default(),
    );
    json::inflated(Value::Object(context))
}

/// Normalize a mapping field into a query
///
/// Fields starting like an expression (`.`, `{`, `[`, `(`, `"`) or consisting
/// of a JSON scalar are queries; whitespace runs inside them are collapsed.
/// Anything else (`http://...`, `Bearer {{token:ns:key}}`) is a literal and
/// is quoted so it evaluates to itself. Returns `None` for an empty field.
#[must_use]
pub fn to_query(field: &str) -> Option<String> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return None;
    }
    if looks_like_query(trimmed) {
        return Some(trimmed.split_whitespace().collect::<Vec<_>>().join(" "));
    }
    Some(Value::String(trimmed.to_string()).to_string())
}

fn looks_like_query(text: &str) -> bool {
    if text.starts_with(['.', '{', '[', '(', '"']) {
        return true;
    }
    matches!(text, "true" | "false" | "null") || text.parse::<f64>().is_ok()
}

/// Evaluate a mapping field as text; empty fields render as empty text
///
/// # Errors
///
/// Propagates query errors.
pub fn render_field(
    evaluator: &dyn QueryEvaluator,
    field: &str,
    context: &Value,
) -> Result<String, QueryError> {
    match to_query(field) {
        Some(query) => evaluator.evaluate_string(&query, context),
        None => Ok(String::new()),
    }
}

/// Headers for a mapping: the mapping's own entries, with `forProvider.headers`
/// filling in every header name the mapping does not set
#[must_use]
pub fn coalesce_headers(mapping_headers: &Headers, default_headers: &Headers) -> Headers {
    let mut headers = default_headers.clone();
    headers.extend(
        mapping_headers
            .iter()
            .map(|(name, values)| (name.clone(), values.clone())),
    );
    headers
}

/// Render every header value
///
/// # Errors
///
/// Propagates the first query error.
pub fn render_headers(
    evaluator: &dyn QueryEvaluator,
    headers: &Headers,
    context: &Value,
) -> Result<Headers, QueryError> {
    headers
        .iter()
        .map(|(name, values)| {
            let rendered = values
                .iter()
                .map(|value| render_field(evaluator, value, context))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((name.clone(), rendered))
        })
        .collect()
}

/// Render `mapping` against `forProvider` and `response`
///
/// # Errors
///
/// Returns the first [`QueryError`] raised by the URL, body or header expressions.
pub fn generate_request_details(
    evaluator: &dyn QueryEvaluator,
    mapping: &Mapping,
    for_provider: &RequestParameters,
    response: &Response,
) -> Result<RequestDetails, QueryError> {
    let context = build_context(for_provider, response);
    let url = render_field(evaluator, &mapping.url, &context)?;
    let body = render_field(evaluator, &mapping.body, &context)?;
    let headers = render_headers(
        evaluator,
        &coalesce_headers(&mapping.headers, &for_provider.headers),
        &context,
    )?;
    Ok(RequestDetails { url, body, headers })
}

/// A request is valid when it has a URL and no rendered part carries the null marker
#[must_use]
pub fn is_request_valid(details: &RequestDetails) -> bool {
    if details.url.is_empty() {
        return false;
    }
    let header_has_null = details.headers.iter().any(|(name, values)| {
        name.contains(NULL_MARKER) || values.iter().any(|v| v.contains(NULL_MARKER))
    });
    !(details.url.contains(NULL_MARKER) || details.body.contains(NULL_MARKER) || header_has_null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Action, Payload};
    use crate::query::JqEvaluator;
    use serde_json::json;

    fn params() -> RequestParameters {
        RequestParameters {
            payload: Payload {
                base_url: "http://h/items".to_string(),
                body: r#"{"name": "x"}"#.to_string(),
            },
            headers: Headers::from([(
                "Content-Type".to_string(),
                vec!["application/json".to_string()],
            )]),
            ..Default::default()
        }
    }

    fn mapping(url: &str, body: &str) -> Mapping {
        Mapping {
            action: Some(Action::Create),
            url: url.to_string(),
            body: body.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_build_context_inflates_payload_and_response() {
        let response = Response {
            status_code: 200,
            body: r#"{"id": "abc"}"#.to_string(),
            ..Default::default()
        };
        let context = build_context(&params(), &response);
        assert_eq!(context["payload"]["body"]["name"], json!("x"));
        assert_eq!(context["response"]["body"]["id"], json!("abc"));
        assert_eq!(context["response"]["statusCode"], json!(200));
    }

    #[test]
    fn test_generate_create_request() {
        let details = generate_request_details(
            &JqEvaluator,
            &mapping(".payload.baseUrl", r#"{"name": .payload.body.name}"#),
            &params(),
            &Response::default(),
        )
        .unwrap();
        assert_eq!(details.url, "http://h/items");
        assert_eq!(details.body, r#"{"name":"x"}"#);
        assert_eq!(details.headers["Content-Type"], vec!["application/json".to_string()]);
        assert!(is_request_valid(&details));
    }

    #[test]
    fn test_generate_request_with_response_reference() {
        let response = Response {
            status_code: 201,
            body: r#"{"id": 42}"#.to_string(),
            ..Default::default()
        };
        let details = generate_request_details(
            &JqEvaluator,
            &mapping(r#"(.payload.baseUrl + "/" + (.response.body.id | tostring))"#, ""),
            &params(),
            &response,
        )
        .unwrap();
        assert_eq!(details.url, "http://h/items/42");
        assert_eq!(details.body, "");
    }

    #[test]
    fn test_missing_field_makes_request_invalid() {
        let details = generate_request_details(
            &JqEvaluator,
            &mapping(r#"(.payload.baseUrl + "/" + (.response.body.id | tostring))"#, ""),
            &params(),
            &Response::default(),
        )
        .unwrap();
        assert_eq!(details.url, "http://h/items/null");
        assert!(!is_request_valid(&details));
    }

    #[test]
    fn test_literal_fields_pass_through() {
        let details = generate_request_details(
            &JqEvaluator,
            &mapping("http://literal/path", "plain text body"),
            &params(),
            &Response::default(),
        )
        .unwrap();
        assert_eq!(details.url, "http://literal/path");
        assert_eq!(details.body, "plain text body");
    }

    #[test]
    fn test_to_query_detection() {
        assert_eq!(to_query("  .a   |  .b "), Some(".a | .b".to_string()));
        assert_eq!(to_query("Bearer {{t:ns:k}}"), Some(r#""Bearer {{t:ns:k}}""#.to_string()));
        assert_eq!(to_query("42"), Some("42".to_string()));
        assert_eq!(to_query("   "), None);
    }

    #[test]
    fn test_coalesce_headers_per_name() {
        let defaults = Headers::from([
            ("Accept".to_string(), vec!["application/json".to_string()]),
            ("X-Team".to_string(), vec!["a".to_string()]),
        ]);
        let mapping_headers = Headers::from([("X-Team".to_string(), vec!["b".to_string()])]);
        let headers = coalesce_headers(&mapping_headers, &defaults);
        assert_eq!(headers["Accept"], vec!["application/json".to_string()]);
        assert_eq!(headers["X-Team"], vec!["b".to_string()]);
    }

    #[test]
    fn test_header_expressions_are_evaluated() {
        let mut m = mapping(".payload.baseUrl", "");
        m.headers = Headers::from([(
            "X-Name".to_string(),
            vec![".payload.body.name".to_string(), "Bearer {{t:ns:k}}".to_string()],
        )]);
        let details =
            generate_request_details(&JqEvaluator, &m, &params(), &Response::default()).unwrap();
        assert_eq!(
            details.headers["X-Name"],
            vec!["x".to_string(), "Bearer {{t:ns:k}}".to_string()]
        );
    }

    #[test]
    fn test_is_request_valid_requires_url() {
        assert!(!is_request_valid(&RequestDetails::default()));
        let details = RequestDetails {
            url: "http://h".to_string(),
            body: r#"{"a":null}"#.to_string(),
            ..Default::default()
        };
        assert!(!is_request_valid(&details));
    }

    #[test]
    fn test_query_errors_propagate() {
        let result = generate_request_details(
            &JqEvaluator,
            &mapping(".payload.baseUrl +", ""),
            &params(),
            &Response::default(),
        );
        assert!(matches!(result, Err(QueryError::Parse { .. })));
    }
}
