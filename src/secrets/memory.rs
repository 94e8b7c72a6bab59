//! In-memory [`SecretStore`] with optimistic concurrency
//!
//! Every write bumps a numeric resource version; updates carrying a stale
//! version are rejected with [`SecretStoreError::Conflict`], mirroring the
//! Kubernetes API.

use super::store::{SecretStore, SecretStoreError, StoredSecret};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Key = (String, String);

#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    secrets: Arc<Mutex<HashMap<Key, StoredSecret>>>,
}

impl MemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a secret, overwriting any existing one
    pub fn insert(&self, mut secret: StoredSecret) {
        secret.resource_version = Some("1".to_string());
        if let Ok(mut secrets) = self.secrets.lock() {
            secrets.insert((secret.namespace.clone(), secret.name.clone()), secret);
        }
    }

    /// Snapshot of a stored secret
    #[must_use]
    pub fn snapshot(&self, name: &str, namespace: &str) -> Option<StoredSecret> {
        self.secrets
            .lock()
            .ok()
            .and_then(|secrets| secrets.get(&key(name, namespace)).cloned())
    }

    fn lock(
        &self,
        operation: &'static str,
        name: &str,
        namespace: &str,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<Key, StoredSecret>>, SecretStoreError> {
        self.secrets.lock().map_err(|e| SecretStoreError::Api {
            operation,
            name: name.to_string(),
            namespace: namespace.to_string(),
            message: e.to_string(),
        })
    }
}

fn key(name: &str, namespace: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn next_version(current: Option<&str>) -> String {
    let version = current.and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
    (version + 1).to_string()
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, name: &str, namespace: &str) -> Result<StoredSecret, SecretStoreError> {
        self.lock("get", name, namespace)?
            .get(&key(name, namespace))
            .cloned()
            .ok_or_else(|| SecretStoreError::NotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })
    }

    async fn create(&self, secret: &StoredSecret) -> Result<StoredSecret, SecretStoreError> {
        let mut secrets = self.lock("create", &secret.name, &secret.namespace)?;
        let k = key(&secret.name, &secret.namespace);
        if secrets.contains_key(&k) {
            return Err(SecretStoreError::Conflict {
                name: secret.name.clone(),
                namespace: secret.namespace.clone(),
            });
        }
        let mut created = secret.clone();
        created.resource_version = Some(next_version(None));
        secrets.insert(k, created.clone());
        Ok(created)
    }

    async fn update(&self, secret: &StoredSecret) -> Result<StoredSecret, SecretStoreError> {
        let mut secrets = self.lock("update", &secret.name, &secret.namespace)?;
        let k = key(&secret.name, &secret.namespace);
        let Some(current) = secrets.get(&k) else {
            return Err(SecretStoreError::NotFound {
                name: secret.name.clone(),
                namespace: secret.namespace.clone(),
            });
        };
        if secret.resource_version.is_some() && secret.resource_version != current.resource_version {
            return Err(SecretStoreError::Conflict {
                name: secret.name.clone(),
                namespace: secret.namespace.clone(),
            });
        }
        let mut updated = secret.clone();
        updated.resource_version = Some(next_version(current.resource_version.as_deref()));
        secrets.insert(k, updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::store::OwnerRef;
    use std::collections::BTreeMap;

    fn owner() -> OwnerRef {
        OwnerRef {
            api_version: "http.resources.io/v1alpha2".to_string(),
            kind: "Request".to_string(),
            name: "req".to_string(),
            uid: "uid-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemorySecretStore::new();
        let err = store.get("missing", "default").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = MemorySecretStore::new();
        store.insert(StoredSecret::new("s", "default"));

        let first = store.get("s", "default").await.unwrap();
        let mut second = first.clone();

        let mut updated = first;
        updated.set_value("k", "v1");
        store.update(&updated).await.unwrap();

        second.set_value("k", "v2");
        let err = store.update(&second).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_get_or_create_creates_with_owner_and_metadata() {
        let store = MemorySecretStore::new();
        let labels = BTreeMap::from([("app".to_string(), "demo".to_string())]);
        let secret = store
            .get_or_create("s", "default", Some(&owner()), &labels, &BTreeMap::new())
            .await
            .unwrap();
        assert!(secret.has_owner("uid-1"));
        assert_eq!(secret.labels, labels);
        assert!(store.snapshot("s", "default").is_some());
    }

    #[tokio::test]
    async fn test_get_or_create_adds_missing_owner() {
        let store = MemorySecretStore::new();
        let mut existing = StoredSecret::new("s", "default");
        existing.labels.insert("keep".to_string(), "me".to_string());
        store.insert(existing);

        let secret = store
            .get_or_create("s", "default", Some(&owner()), &BTreeMap::new(), &BTreeMap::new())
            .await
            .unwrap();
        assert!(secret.has_owner("uid-1"));
        // Metadata of an existing secret is left for reconcile_metadata
        assert_eq!(secret.labels.get("keep").map(String::as_str), Some("me"));
        assert!(store.snapshot("s", "default").unwrap().has_owner("uid-1"));
    }

    #[tokio::test]
    async fn test_get_or_create_without_owner_does_not_write() {
        let store = MemorySecretStore::new();
        store.insert(StoredSecret::new("s", "default"));
        let secret = store
            .get_or_create("s", "default", None, &BTreeMap::new(), &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(secret.resource_version.as_deref(), Some("1"));
    }
}
