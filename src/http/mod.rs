//! # HTTP Transport
//!
//! Boundary between the reconciliation engine and the network. The engine
//! only sees [`HttpTransport`]; [`ReqwestTransport`] is the production
//! implementation.
//!
//! Status codes are classified once here:
//! - success: `[200, 300)`
//! - error: `[400, 600)` (application-level failure, distinct from a [`TransportError`])

mod client;

pub use client::ReqwestTransport;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Multi-valued headers, ordered by name
pub type Headers = BTreeMap<String, Vec<String>>;

pub const STATUS_NOT_FOUND: u16 = 404;

/// A fully rendered request with secrets already resolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub body: String,
    pub headers: Headers,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: String,
    pub headers: Headers,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        is_http_success(self.status_code)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        is_http_error(self.status_code)
    }
}

#[must_use]
pub fn is_http_success(status_code: u16) -> bool {
    (200..300).contains(&status_code)
}

#[must_use]
pub fn is_http_error(status_code: u16) -> bool {
    (400..600).contains(&status_code)
}

/// Failure to complete an HTTP exchange at all
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("invalid HTTP method '{method}': {message}")]
    InvalidMethod { method: String, message: String },
    #[error("invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },
    #[error("{method} {url} failed: {message}")]
    Send {
        method: String,
        url: String,
        message: String,
    },
}

/// Sends rendered requests
#[async_trait]
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    /// Send `request` and return the response, whatever its status code
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}
