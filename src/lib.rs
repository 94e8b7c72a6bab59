//! HTTP Resource Controller Library
//!
//! Reconciles `Request` and `DisposableRequest` custom resources against
//! HTTP APIs. The engine is independent of Kubernetes: it talks to the
//! outside world through the `HttpTransport`, `SecretStore` and
//! `QueryEvaluator` traits, so it can be driven in tests with in-memory
//! implementations.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod engine;
pub mod http;
pub mod json;
pub mod observability;
pub mod query;
pub mod requestgen;
pub mod runtime;
pub mod secrets;
