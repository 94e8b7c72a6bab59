//! # Controller
//!
//! Kubernetes-facing modules of the HTTP resource controller.
//!
//! - `backoff`: Fibonacci backoff for failing resources
//! - `reconciler`: Reconcile functions for `Request` and `DisposableRequest`
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod server;
