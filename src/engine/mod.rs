//! # Reconciliation Engine
//!
//! Decides what to do with an external HTTP resource and does it.
//!
//! The engine works on a resource's parameters and a mutable copy of its
//! status. It never persists anything itself: callers write the status back
//! after every operation, whether it succeeded or not.
//!
//! ## Module Structure
//!
//! - `client.rs` - Shared send path: placeholder resolution, transport, redaction
//! - `request.rs` - `RequestExternal`: observe/create/update/delete for `Request`
//! - `observe.rs` - Desired state and up-to-date checks
//! - `status.rs` - Recording responses, errors and the cache in status
//! - `retry.rs` - Failure counting against `rollbackRetriesLimit`
//! - `disposable.rs` - `DisposableExternal`: fire-once requests
//! - `cancel.rs` - Racing external calls against cancellation

mod cancel;
mod client;
mod disposable;
mod observe;
mod request;
mod retry;
mod status;

pub use cancel::run_cancellable;
pub use client::ExternalClient;
pub use disposable::DisposableExternal;
pub use observe::{desired_context, is_synced};
pub use request::RequestExternal;
pub use retry::RetryState;
pub use status::{record_sent_request, set_request_status, to_response};

use crate::crd::Action;
use crate::http::TransportError;
use crate::query::QueryError;
use crate::secrets::SecretError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{action} mapping doesn't exist in request")]
    MissingMapping { action: Action },
    #[error("{action} request is invalid: rendered url '{url}' is empty or references missing fields")]
    InvalidRequest { action: Action, url: String },
    #[error("failed to render request: {0}")]
    Query(#[from] QueryError),
    #[error("failed to resolve secrets: {0}")]
    Secret(#[from] SecretError),
    #[error("failed to send http request: {0}")]
    Transport(#[from] TransportError),
    #[error("status code {code}")]
    HttpStatus { code: u16 },
    #[error("response did not match expected response check '{check}'")]
    UnexpectedResponse { check: String },
    #[error("retries limit reached ({failed}/{limit}), not sending request")]
    RetriesLimitReached { failed: i32, limit: i32 },
    #[error("reconcile was cancelled")]
    Cancelled,
}

impl EngineError {
    /// Errors caused by the resource's own configuration; retrying without a
    /// spec change cannot fix them
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            EngineError::MissingMapping { .. } | EngineError::Query(QueryError::Parse { .. })
        )
    }

    /// Conflicts on the secret store resolve themselves on the next attempt
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Secret(SecretError::Store(e)) => e.is_retryable(),
            EngineError::Transport(_) | EngineError::HttpStatus { .. } => true,
            _ => false,
        }
    }
}

/// Result of observing an external resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
}

impl ExternalObservation {
    #[must_use]
    pub fn not_found() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn exists(up_to_date: bool) -> Self {
        Self {
            resource_exists: true,
            resource_up_to_date: up_to_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretStoreError;

    #[test]
    fn test_configuration_errors() {
        assert!(EngineError::MissingMapping {
            action: Action::Observe
        }
        .is_configuration_error());
        assert!(!EngineError::HttpStatus { code: 500 }.is_configuration_error());
    }

    #[test]
    fn test_missing_mapping_message() {
        let err = EngineError::MissingMapping {
            action: Action::Update,
        };
        assert_eq!(err.to_string(), "UPDATE mapping doesn't exist in request");
    }

    #[test]
    fn test_secret_conflict_is_retryable() {
        let err = EngineError::Secret(SecretError::Store(SecretStoreError::Conflict {
            name: "s".to_string(),
            namespace: "n".to_string(),
        }));
        assert!(err.is_retryable());
        assert!(!EngineError::Cancelled.is_retryable());
    }

    #[test]
    fn test_observation_constructors() {
        assert!(!ExternalObservation::not_found().resource_exists);
        let observation = ExternalObservation::exists(true);
        assert!(observation.resource_exists && observation.resource_up_to_date);
    }
}
