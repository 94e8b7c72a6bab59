//! # Reconciler
//!
//! Kubernetes-facing reconciliation for `Request` and `DisposableRequest`.
//!
//! Each cycle:
//! 1. Adds or honors the finalizer
//! 2. Validates `forProvider`
//! 3. Builds a transport from `waitTimeout` and `insecureSkipTLSVerify`
//! 4. Observes the external resource, then creates or updates it
//! 5. Writes status back when it changed
//!
//! Deleting a `Request` sends its `REMOVE` mapping before the finalizer is
//! released.

pub mod disposable;
pub mod request;
pub mod status;
pub mod types;
pub mod validation;

pub use disposable::{reconcile_disposable, sync_disposable};
pub use request::{delete_request, reconcile_request, sync_request, SyncOutcome};
pub use types::{owner_ref, resource_key, BackoffState, Reconciler, ReconcilerError};
