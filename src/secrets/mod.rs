//! # Secrets
//!
//! Secret injection in both directions:
//!
//! - **Resolution**: `{{name:namespace:key}}` placeholders in URLs, bodies,
//!   headers and metadata are replaced with stored values right before use
//! - **Redaction**: values extracted from responses are written to secrets
//!   and replaced by their placeholder before the response is recorded
//!
//! ## Module Structure
//!
//! - `store.rs` - `SecretStore` trait and the `StoredSecret` entity
//! - `kubernetes.rs` - Store backed by Kubernetes `Secret` objects
//! - `memory.rs` - In-memory store with optimistic concurrency
//! - `placeholder.rs` - Placeholder parsing and resolution
//! - `redaction.rs` - Response-to-secret pipeline

mod kubernetes;
mod memory;
mod placeholder;
mod redaction;
mod store;

pub use kubernetes::KubeSecretStore;
pub use memory::MemorySecretStore;
pub use placeholder::{
    find_placeholders, resolve_headers, resolve_string, resolve_string_map, resolve_value,
    Placeholder,
};
pub use redaction::{extract_value, redact_value, response_context, Redactor};
pub use store::{OwnerRef, SecretStore, SecretStoreError, StoredSecret};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error(transparent)]
    Store(#[from] SecretStoreError),
    #[error("secret {name}:{namespace} has no key '{key}'")]
    MissingKey {
        name: String,
        namespace: String,
        key: String,
    },
}
