//! # Engine Lifecycle Tests
//!
//! Drives `Request` parameters through create, observe, update and delete
//! against a scripted transport and the in-memory secret store.

mod common;

use common::{item_parameters, ScriptedTransport};
use http_resource_controller::controller::reconciler::{delete_request, sync_request, SyncOutcome};
use http_resource_controller::crd::{KeyMapping, RequestStatus, SecretInjectionConfig, SecretRef};
use http_resource_controller::engine::{EngineError, ExternalClient, RequestExternal};
use http_resource_controller::query::JqEvaluator;
use http_resource_controller::secrets::{MemorySecretStore, StoredSecret};
use tokio_util::sync::CancellationToken;

const BASE_URL: &str = "http://api.test/items";

#[tokio::test]
async fn test_create_observe_update_delete() {
    let transport = ScriptedTransport::new();
    let store = MemorySecretStore::new();
    let client = ExternalClient::new(&transport, &store, &JqEvaluator, CancellationToken::new());
    let external = RequestExternal::new(client);
    let params = item_parameters(BASE_URL);
    let mut status = RequestStatus::default();

    // Nothing recorded yet: created without observing
    transport.respond(201, r#"{"id": 7, "name": "widget"}"#);
    let outcome = sync_request(&external, &params, &mut status).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Created);
    assert_eq!(status.response.status_code, 201);
    assert!(status.cache.last_updated.is_some());
    let details = status.request_details.clone().unwrap();
    assert_eq!(details.method, "POST");
    assert_eq!(details.url, BASE_URL);
    assert_eq!(details.body, r#"{"name":"widget"}"#);

    // Live state matches
    transport.respond(200, r#"{"id": 7, "name": "widget", "createdAt": "today"}"#);
    let outcome = sync_request(&external, &params, &mut status).await.unwrap();
    assert_eq!(outcome, SyncOutcome::UpToDate);
    assert_eq!(status.response.method, "GET");

    // Drift is corrected with the UPDATE mapping
    transport
        .respond(200, r#"{"id": 7, "name": "gadget"}"#)
        .respond(200, r#"{"id": 7, "name": "widget"}"#);
    let outcome = sync_request(&external, &params, &mut status).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Updated);
    let sent = transport.sent();
    let update = sent.last().unwrap();
    assert_eq!(update.method, "PUT");
    assert_eq!(update.url, format!("{BASE_URL}/7"));

    // Delete observes first, then removes
    transport.respond(200, r#"{"id": 7, "name": "widget"}"#).respond(204, "");
    assert!(delete_request(&external, &params, &mut status).await.unwrap());
    assert_eq!(
        transport.sent_methods(),
        vec!["POST", "GET", "GET", "PUT", "GET", "DELETE"]
    );
    assert_eq!(transport.sent().last().unwrap().url, format!("{BASE_URL}/7"));
    assert_eq!(transport.remaining(), 0);
}

#[tokio::test]
async fn test_observe_not_found_recreates() {
    let transport = ScriptedTransport::new();
    let store = MemorySecretStore::new();
    let client = ExternalClient::new(&transport, &store, &JqEvaluator, CancellationToken::new());
    let external = RequestExternal::new(client);
    let params = item_parameters(BASE_URL);
    let mut status = RequestStatus::default();

    transport.respond(201, r#"{"id": 1}"#);
    sync_request(&external, &params, &mut status).await.unwrap();

    transport.respond(404, "not found").respond(201, r#"{"id": 2}"#);
    let outcome = sync_request(&external, &params, &mut status).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Created);
    assert_eq!(status.response.body, r#"{"id": 2}"#);
}

#[tokio::test]
async fn test_response_secrets_are_redacted_and_stored() {
    let transport = ScriptedTransport::new();
    let store = MemorySecretStore::new();
    let client = ExternalClient::new(&transport, &store, &JqEvaluator, CancellationToken::new());
    let external = RequestExternal::new(client);
    let mut params = item_parameters(BASE_URL);
    params.secret_injection_configs = vec![SecretInjectionConfig {
        secret_ref: SecretRef {
            name: "api-creds".to_string(),
            namespace: "default".to_string(),
        },
        key_mappings: vec![KeyMapping {
            secret_key: "token".to_string(),
            response_path: ".body.token".to_string(),
        }],
        ..Default::default()
    }];
    let mut status = RequestStatus::default();

    transport.respond(201, r#"{"id": 7, "token": "s3cr3t"}"#);
    sync_request(&external, &params, &mut status).await.unwrap();

    assert!(!status.response.body.contains("s3cr3t"));
    assert!(status.response.body.contains("{{api-creds:default:token}}"));
    assert!(!status.cache.response.body.contains("s3cr3t"));
    let secret = store.snapshot("api-creds", "default").unwrap();
    assert_eq!(secret.value("token").as_deref(), Some("s3cr3t"));
}

#[tokio::test]
async fn test_placeholders_resolved_only_on_the_wire() {
    let transport = ScriptedTransport::new();
    let store = MemorySecretStore::new();
    let mut secret = StoredSecret::new("api-creds", "default");
    secret.set_value("token", "s3cr3t");
    store.insert(secret);

    let client = ExternalClient::new(&transport, &store, &JqEvaluator, CancellationToken::new());
    let external = RequestExternal::new(client);
    let mut params = item_parameters(BASE_URL);
    params.headers.insert(
        "Authorization".to_string(),
        vec!["Bearer {{api-creds:default:token}}".to_string()],
    );
    let mut status = RequestStatus::default();

    transport.respond(201, r#"{"id": 7}"#);
    sync_request(&external, &params, &mut status).await.unwrap();

    let wire = &transport.sent()[0];
    assert_eq!(wire.headers["Authorization"], vec!["Bearer s3cr3t".to_string()]);
    let recorded = status.request_details.unwrap();
    assert_eq!(
        recorded.headers["Authorization"],
        vec!["Bearer {{api-creds:default:token}}".to_string()]
    );
}

#[tokio::test]
async fn test_retries_limit_stops_create() {
    let transport = ScriptedTransport::new();
    let store = MemorySecretStore::new();
    let client = ExternalClient::new(&transport, &store, &JqEvaluator, CancellationToken::new());
    let external = RequestExternal::new(client);
    let mut params = item_parameters(BASE_URL);
    params.rollback_retries_limit = Some(2);
    let mut status = RequestStatus::default();

    transport.respond(500, "oops").respond(500, "oops");
    for expected_failed in 1..=2 {
        let err = sync_request(&external, &params, &mut status).await.unwrap_err();
        assert!(matches!(err, EngineError::HttpStatus { code: 500 }));
        assert_eq!(status.failed, expected_failed);
        assert_eq!(status.error, "status code 500");
    }

    let err = sync_request(&external, &params, &mut status).await.unwrap_err();
    assert!(matches!(err, EngineError::RetriesLimitReached { failed: 2, limit: 2 }));
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn test_transport_failure_is_recorded() {
    let transport = ScriptedTransport::new();
    let store = MemorySecretStore::new();
    let client = ExternalClient::new(&transport, &store, &JqEvaluator, CancellationToken::new());
    let external = RequestExternal::new(client);
    let params = item_parameters(BASE_URL);
    let mut status = RequestStatus::default();

    transport.fail("connection refused");
    let err = sync_request(&external, &params, &mut status).await.unwrap_err();
    assert!(matches!(err, EngineError::Transport(_)));
    assert!(status.error.contains("connection refused"));
    assert_eq!(status.response.status_code, 0);
}

#[tokio::test]
async fn test_cancelled_cycle_sends_nothing() {
    let transport = ScriptedTransport::new();
    let store = MemorySecretStore::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let client = ExternalClient::new(&transport, &store, &JqEvaluator, cancel);
    let external = RequestExternal::new(client);
    let params = item_parameters(BASE_URL);
    let mut status = RequestStatus::default();

    let err = sync_request(&external, &params, &mut status).await.unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert!(transport.sent().is_empty());
    assert!(status.request_details.is_none());
}

#[tokio::test]
async fn test_failed_create_with_put_is_retried() {
    let transport = ScriptedTransport::new();
    let store = MemorySecretStore::new();
    let client = ExternalClient::new(&transport, &store, &JqEvaluator, CancellationToken::new());
    let external = RequestExternal::new(client);
    let mut params = item_parameters(BASE_URL);
    params.mappings[0].method = Some("PUT".to_string());
    let mut status = RequestStatus::default();

    transport.respond(409, r#"{"message": "conflict"}"#);
    let err = sync_request(&external, &params, &mut status).await.unwrap_err();
    assert!(matches!(err, EngineError::HttpStatus { code: 409 }));

    // The failed create means nothing exists yet: create again instead of observing
    transport.respond(201, r#"{"id": 7}"#);
    let outcome = sync_request(&external, &params, &mut status).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Created);
    assert_eq!(transport.sent_methods(), vec!["PUT", "PUT"]);
    assert_eq!(status.response.status_code, 201);
}

#[tokio::test]
async fn test_failed_update_observes_through_cache_until_limit() {
    let transport = ScriptedTransport::new();
    let store = MemorySecretStore::new();
    let client = ExternalClient::new(&transport, &store, &JqEvaluator, CancellationToken::new());
    let external = RequestExternal::new(client);
    let mut params = item_parameters(BASE_URL);
    params.rollback_retries_limit = Some(2);
    let mut status = RequestStatus::default();

    transport.respond(201, r#"{"id": 7, "name": "widget"}"#);
    sync_request(&external, &params, &mut status).await.unwrap();
    assert!(status.cache.last_updated.is_some());

    // Drift, and the update fails
    transport
        .respond(200, r#"{"id": 7, "name": "gadget"}"#)
        .respond(500, r#"{"error": "boom"}"#);
    let err = sync_request(&external, &params, &mut status).await.unwrap_err();
    assert!(matches!(err, EngineError::HttpStatus { code: 500 }));
    assert_eq!(status.failed, 1);
    assert_eq!(status.response.body, r#"{"error": "boom"}"#);

    // The error body has no id, so the cached response addresses the resource.
    // Live state matches, but a pending retry keeps it out of date.
    transport
        .respond(200, r#"{"id": 7, "name": "widget"}"#)
        .respond(500, r#"{"error": "boom"}"#);
    let err = sync_request(&external, &params, &mut status).await.unwrap_err();
    assert!(matches!(err, EngineError::HttpStatus { code: 500 }));
    assert_eq!(status.failed, 2);

    // Limit reached: observed as up to date, no further update
    transport.respond(200, r#"{"id": 7, "name": "widget"}"#);
    let outcome = sync_request(&external, &params, &mut status).await.unwrap();
    assert_eq!(outcome, SyncOutcome::UpToDate);
    assert_eq!(status.failed, 2);

    assert_eq!(
        transport.sent_methods(),
        vec!["POST", "GET", "PUT", "GET", "PUT", "GET"]
    );
    let item_url = format!("{BASE_URL}/7");
    for request in &transport.sent()[1..] {
        assert_eq!(request.url, item_url);
    }
    assert_eq!(transport.remaining(), 0);
}
