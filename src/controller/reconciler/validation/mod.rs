//! # Validation
//!
//! Validates `Request` and `DisposableRequest` parameters and duration strings.

mod duration;
mod kubernetes;
mod request;

pub use duration::{parse_kubernetes_duration, wait_timeout};
pub use kubernetes::{validate_kubernetes_name, validate_kubernetes_namespace, validate_secret_key};
pub use request::{
    validate_disposable_request_parameters, validate_http_method, validate_request_parameters,
};
