//! Common test utilities for engine integration tests
//!
//! Provides a scripted transport that replays queued responses and records
//! every request it was asked to send, plus fixtures for `Request` parameters.

#![allow(dead_code)]

use async_trait::async_trait;
use http_resource_controller::crd::{Action, Mapping, Payload, RequestParameters};
use http_resource_controller::http::{Headers, HttpRequest, HttpResponse, HttpTransport, TransportError};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays queued responses in order
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    sent: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with a JSON or text body
    pub fn respond(&self, status_code: u16, body: &str) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(HttpResponse {
            status_code,
            body: body.to_string(),
            headers: Headers::new(),
        }));
        self
    }

    /// Queue a transport failure
    pub fn fail(&self, message: &str) -> &Self {
        self.responses.lock().unwrap().push_back(Err(TransportError::Send {
            method: "?".to_string(),
            url: "?".to_string(),
            message: message.to_string(),
        }));
        self
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_methods(&self) -> Vec<String> {
        self.sent().into_iter().map(|r| r.method).collect()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.sent.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Send {
                    method: request.method.clone(),
                    url: request.url.clone(),
                    message: "no scripted response left".to_string(),
                })
            })
    }
}

pub const ITEM_URL: &str = r#"(.payload.baseUrl + "/" + (.response.body.id | tostring))"#;

fn mapping(method: &str, action: Action, url: &str, body: &str) -> Mapping {
    Mapping {
        method: Some(method.to_string()),
        action: Some(action),
        url: url.to_string(),
        body: body.to_string(),
        headers: Headers::new(),
    }
}

/// CRUD mappings for `{base_url}/{id}` style APIs
pub fn item_parameters(base_url: &str) -> RequestParameters {
    RequestParameters {
        payload: Payload {
            base_url: base_url.to_string(),
            body: r#"{"name": "widget"}"#.to_string(),
        },
        headers: Headers::from([(
            "Content-Type".to_string(),
            vec!["application/json".to_string()],
        )]),
        mappings: vec![
            mapping("POST", Action::Create, ".payload.baseUrl", ".payload.body"),
            mapping("GET", Action::Observe, ITEM_URL, ""),
            mapping("PUT", Action::Update, ITEM_URL, ".payload.body"),
            mapping("DELETE", Action::Remove, ITEM_URL, ""),
        ],
        ..Default::default()
    }
}
