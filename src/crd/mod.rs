//! # Custom Resource Definitions
//!
//! CRD types for the HTTP resource controller.
//!
//! ## Module Structure
//!
//! - `request.rs` - `Request`: a managed HTTP resource with create/observe/update/remove mappings
//! - `disposable_request.rs` - `DisposableRequest`: a fire-once HTTP call
//! - `common.rs` - Responses, secret injection rules and conditions shared by both kinds

mod common;
mod disposable_request;
mod request;

// Re-export all public types
pub use common::{
    Condition, KeyMapping, Response, SecretInjectionConfig, SecretMetadata, SecretRef,
    SentRequest,
};
pub use disposable_request::{
    DisposableRequest, DisposableRequestParameters, DisposableRequestSpec,
    DisposableRequestStatus,
};
pub use request::{
    Action, Cache, ExpectedResponseCheck, ExpectedResponseCheckType, Mapping, Payload,
    Request, RequestParameters, RequestSpec, RequestStatus,
};
