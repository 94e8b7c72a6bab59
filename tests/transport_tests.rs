//! # Transport Tests
//!
//! Exercises `ReqwestTransport` and the engine against a wiremock server.

mod common;

use common::item_parameters;
use http_resource_controller::controller::reconciler::{sync_request, SyncOutcome};
use http_resource_controller::crd::RequestStatus;
use http_resource_controller::engine::{ExternalClient, RequestExternal};
use http_resource_controller::http::{
    Headers, HttpRequest, HttpTransport, ReqwestTransport, TransportError,
};
use http_resource_controller::query::JqEvaluator;
use http_resource_controller::secrets::MemorySecretStore;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport() -> ReqwestTransport {
    ReqwestTransport::new(Duration::from_secs(5), false).unwrap()
}

#[tokio::test]
async fn test_send_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(header("authorization", "Bearer t"))
        .and(body_string(r#"{"a":1}"#))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_string(r#"{"id":1}"#)
                .insert_header("x-request-id", "abc"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = HttpRequest {
        method: "post".to_string(),
        url: format!("{}/items", server.uri()),
        body: r#"{"a":1}"#.to_string(),
        headers: Headers::from([("Authorization".to_string(), vec!["Bearer t".to_string()])]),
    };
    let response = transport().send(&request).await.unwrap();

    assert_eq!(response.status_code, 201);
    assert_eq!(response.body, r#"{"id":1}"#);
    assert_eq!(response.headers["x-request-id"], vec!["abc".to_string()]);
}

#[tokio::test]
async fn test_error_status_is_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let request = HttpRequest {
        method: "GET".to_string(),
        url: server.uri(),
        ..Default::default()
    };
    let response = transport().send(&request).await.unwrap();
    assert_eq!(response.status_code, 503);
    assert!(response.is_error());
    assert_eq!(response.body, "busy");
}

#[tokio::test]
async fn test_invalid_method_is_rejected() {
    let request = HttpRequest {
        method: "NOT A METHOD".to_string(),
        url: "http://127.0.0.1:9".to_string(),
        ..Default::default()
    };
    let err = transport().send(&request).await.unwrap_err();
    assert!(matches!(err, TransportError::InvalidMethod { .. }));
}

#[tokio::test]
async fn test_unreachable_host_is_a_transport_error() {
    let request = HttpRequest {
        method: "GET".to_string(),
        url: "http://127.0.0.1:9/unreachable".to_string(),
        ..Default::default()
    };
    let err = transport().send(&request).await.unwrap_err();
    assert!(matches!(err, TransportError::Send { .. }));
}

#[tokio::test]
async fn test_engine_against_live_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(body_string(r#"{"name":"widget"}"#))
        .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id": 42, "name": "widget"}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items/42"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id": 42, "name": "widget"}"#))
        .mount(&server)
        .await;

    let transport = transport();
    let store = MemorySecretStore::new();
    let client = ExternalClient::new(&transport, &store, &JqEvaluator, CancellationToken::new());
    let external = RequestExternal::new(client);
    let params = item_parameters(&format!("{}/items", server.uri()));
    let mut status = RequestStatus::default();

    assert_eq!(
        sync_request(&external, &params, &mut status).await.unwrap(),
        SyncOutcome::Created
    );
    assert_eq!(
        sync_request(&external, &params, &mut status).await.unwrap(),
        SyncOutcome::UpToDate
    );
    assert_eq!(status.response.status_code, 200);
    assert_eq!(
        status.request_details.unwrap().url,
        format!("{}/items/42", server.uri())
    );
}
