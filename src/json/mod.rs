//! # JSON Helpers
//!
//! Operations over loosely-typed JSON used by the context builder and the
//! up-to-date check:
//!
//! - [`inflate`]: replace strings holding JSON objects/arrays with their parsed form
//! - [`parse_loose_object`]: parse a body as an object, falling back to empty
//! - [`contains`]: structural "desired is a subset of live" comparison

use crate::query::values_equal;
use serde_json::{Map, Value};

/// Recursively replace string values that hold a JSON object or array with
/// the parsed structure.
///
/// Scalar-looking strings (`"42"`, `"true"`) are left alone so that values
/// the author wrote as text stay text. Newly parsed structures are inflated
/// as well, which makes the operation idempotent.
pub fn inflate(value: &mut Value) {
    match value {
        Value::String(text) => {
            if let Some(parsed) = parse_embedded(text) {
                *value = parsed;
                inflate(value);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(inflate),
        Value::Object(map) => map.values_mut().for_each(inflate),
        _ => {}
    }
}

/// Owned variant of [`inflate`]
#[must_use]
pub fn inflated(mut value: Value) -> Value {
    inflate(&mut value);
    value
}

fn parse_embedded(text: &str) -> Option<Value> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    match serde_json::from_str::<Value>(text) {
        Ok(parsed @ (Value::Object(_) | Value::Array(_))) => Some(parsed),
        _ => None,
    }
}

/// Parse `text` as a JSON object
///
/// Anything that is not a JSON object (invalid JSON, arrays, scalars,
/// empty text) yields an empty map.
#[must_use]
pub fn parse_loose_object(text: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Check that every key of `desired` is present in `live` with an equal value
///
/// Nested objects are compared recursively, so extra keys at any depth of
/// `live` are ignored. Arrays and scalars must be equal (numbers compare by
/// value, `1 == 1.0`).
#[must_use]
pub fn contains(live: &Map<String, Value>, desired: &Map<String, Value>) -> bool {
    desired.iter().all(|(key, desired_value)| {
        let Some(live_value) = live.get(key) else {
            return false;
        };
        match (live_value, desired_value) {
            (Value::Object(live_map), Value::Object(desired_map)) => {
                contains(live_map, desired_map)
            }
            (live_value, desired_value) => values_equal(live_value, desired_value),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_inflate_nested_json_strings() {
        let mut value = json!({
            "body": "{\"id\": 1, \"inner\": \"{\\\"deep\\\": true}\"}",
            "plain": "hello",
            "number_text": "42",
            "list": ["[1, 2]", "x"]
        });
        inflate(&mut value);
        assert_eq!(
            value,
            json!({
                "body": {"id": 1, "inner": {"deep": true}},
                "plain": "hello",
                "number_text": "42",
                "list": [[1, 2], "x"]
            })
        );
    }

    #[test]
    fn test_inflate_is_idempotent() {
        let original = json!({
            "a": "{\"b\": \"[\\\"{}\\\"]\"}",
            "c": [{"d": "{\"e\": 1}"}],
            "f": "{not json"
        });
        let once = inflated(original);
        let twice = inflated(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_parse_loose_object() {
        assert_eq!(parse_loose_object(r#"{"a": 1}"#), object(json!({"a": 1})));
        assert!(parse_loose_object("not json").is_empty());
        assert!(parse_loose_object("[1, 2]").is_empty());
        assert!(parse_loose_object("").is_empty());
    }

    #[test]
    fn test_contains_ignores_extra_live_keys() {
        let live = object(json!({"a": 1, "b": 2}));
        assert!(contains(&live, &object(json!({"a": 1}))));
        assert!(!contains(&live, &object(json!({"a": 2}))));
        assert!(!contains(&live, &object(json!({"c": 1}))));
    }

    #[test]
    fn test_contains_recurses_into_objects() {
        let live = object(json!({"user": {"name": "x", "age": 3}, "tags": ["a", "b"]}));
        assert!(contains(&live, &object(json!({"user": {"name": "x"}}))));
        assert!(!contains(&live, &object(json!({"user": {"name": "y"}}))));
        assert!(contains(&live, &object(json!({"tags": ["a", "b"]}))));
        assert!(!contains(&live, &object(json!({"tags": ["a"]}))));
    }

    #[test]
    fn test_contains_normalizes_numbers() {
        let live = object(json!({"n": 1.0}));
        assert!(contains(&live, &object(json!({"n": 1}))));
    }

    #[test]
    fn test_empty_desired_is_always_contained() {
        assert!(contains(&Map::new(), &Map::new()));
        assert!(contains(&object(json!({"a": 1})), &Map::new()));
    }
}
