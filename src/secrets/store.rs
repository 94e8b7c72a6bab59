//! # Secret Store
//!
//! Minimal key-value view of a secret entity and the store operations the
//! engine needs. [`SecretStore::get_or_create`] is implemented once on top of
//! `get`/`create`/`update` so every backend shares the owner-reference rules.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Owner reference attached to secrets created for a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

/// A secret as seen by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSecret {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerRef>,
    pub data: BTreeMap<String, Vec<u8>>,
    /// Version token used to reject stale updates
    pub resource_version: Option<String>,
}

impl StoredSecret {
    #[must_use]
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }

    /// Value at `key` as text
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.data
            .get(key)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Set `key` to `value`, reporting whether the stored bytes changed
    pub fn set_value(&mut self, key: &str, value: &str) -> bool {
        if self.data.get(key).map(Vec::as_slice) == Some(value.as_bytes()) {
            return false;
        }
        self.data.insert(key.to_string(), value.as_bytes().to_vec());
        true
    }

    #[must_use]
    pub fn has_owner(&self, uid: &str) -> bool {
        self.owner_references.iter().any(|r| r.uid == uid)
    }

    /// Make labels and annotations exactly the desired sets
    ///
    /// Keys missing from the desired maps are removed, desired values are
    /// upserted. Returns whether anything changed, so callers can skip a
    /// no-op write.
    pub fn reconcile_metadata(
        &mut self,
        labels: &BTreeMap<String, String>,
        annotations: &BTreeMap<String, String>,
    ) -> bool {
        let labels_changed = reconcile_map(&mut self.labels, labels);
        let annotations_changed = reconcile_map(&mut self.annotations, annotations);
        labels_changed || annotations_changed
    }
}

fn reconcile_map(current: &mut BTreeMap<String, String>, desired: &BTreeMap<String, String>) -> bool {
    if current == desired {
        return false;
    }
    current.clone_from(desired);
    true
}

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("secret {name}:{namespace} not found")]
    NotFound { name: String, namespace: String },
    #[error("secret {name}:{namespace} was modified concurrently")]
    Conflict { name: String, namespace: String },
    #[error("failed to {operation} secret {name}:{namespace}: {message}")]
    Api {
        operation: &'static str,
        name: String,
        namespace: String,
        message: String,
    },
}

impl SecretStoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SecretStoreError::NotFound { .. })
    }

    /// Conflicts clear up on the next cycle once the secret is re-read
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SecretStoreError::Conflict { .. })
    }
}

/// Get/create/update over secrets keyed by (name, namespace)
#[async_trait]
pub trait SecretStore: Send + Sync + std::fmt::Debug {
    /// # Errors
    ///
    /// [`SecretStoreError::NotFound`] when the secret does not exist.
    async fn get(&self, name: &str, namespace: &str) -> Result<StoredSecret, SecretStoreError>;

    /// # Errors
    ///
    /// Returns an error if the secret cannot be created.
    async fn create(&self, secret: &StoredSecret) -> Result<StoredSecret, SecretStoreError>;

    /// Replace the secret, failing with [`SecretStoreError::Conflict`] when
    /// `resource_version` is stale
    ///
    /// # Errors
    ///
    /// Returns an error if the secret cannot be written.
    async fn update(&self, secret: &StoredSecret) -> Result<StoredSecret, SecretStoreError>;

    /// Fetch the secret, creating it when missing
    ///
    /// A new secret gets `labels`, `annotations` and `owner`. An existing
    /// secret that lacks `owner` is updated to add it.
    ///
    /// # Errors
    ///
    /// Propagates store errors other than "not found" on the initial read.
    async fn get_or_create(
        &self,
        name: &str,
        namespace: &str,
        owner: Option<&OwnerRef>,
        labels: &BTreeMap<String, String>,
        annotations: &BTreeMap<String, String>,
    ) -> Result<StoredSecret, SecretStoreError> {
        let mut secret = match self.get(name, namespace).await {
            Ok(secret) => secret,
            Err(e) if e.is_not_found() => {
                debug!(secret.name = name, secret.namespace = namespace, "Creating secret");
                let mut secret = StoredSecret::new(name, namespace);
                secret.labels.clone_from(labels);
                secret.annotations.clone_from(annotations);
                secret.owner_references.extend(owner.cloned());
                return self.create(&secret).await;
            }
            Err(e) => return Err(e),
        };

        if let Some(owner) = owner {
            if !secret.has_owner(&owner.uid) {
                debug!(
                    secret.name = name,
                    secret.namespace = namespace,
                    owner.name = %owner.name,
                    "Adding owner reference to existing secret"
                );
                secret.owner_references.push(owner.clone());
                secret = self.update(&secret).await?;
            }
        }

        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_reconcile_metadata_replaces_sets() {
        let mut secret = StoredSecret::new("s", "n");
        secret.labels = map(&[("a", "1"), ("b", "2")]);
        let changed = secret.reconcile_metadata(&map(&[("b", "2"), ("c", "3")]), &BTreeMap::new());
        assert!(changed);
        assert_eq!(secret.labels, map(&[("b", "2"), ("c", "3")]));
    }

    #[test]
    fn test_reconcile_metadata_no_change() {
        let mut secret = StoredSecret::new("s", "n");
        secret.labels = map(&[("a", "1")]);
        secret.annotations = map(&[("note", "x")]);
        assert!(!secret.reconcile_metadata(&map(&[("a", "1")]), &map(&[("note", "x")])));
    }

    #[test]
    fn test_reconcile_metadata_annotations_only() {
        let mut secret = StoredSecret::new("s", "n");
        secret.annotations = map(&[("old", "x")]);
        assert!(secret.reconcile_metadata(&BTreeMap::new(), &BTreeMap::new()));
        assert!(secret.annotations.is_empty());
    }

    #[test]
    fn test_set_value_reports_change() {
        let mut secret = StoredSecret::new("s", "n");
        assert!(secret.set_value("token", "abc"));
        assert!(!secret.set_value("token", "abc"));
        assert!(secret.set_value("token", "def"));
        assert_eq!(secret.value("token").as_deref(), Some("def"));
    }
}
