//! [`SecretStore`] backed by Kubernetes `Secret` objects

use super::store::{OwnerRef, SecretStore, SecretStoreError, StoredSecret};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use k8s_openapi::ByteString;
use kube::api::PostParams;
use kube::{Api, Client};
use std::collections::BTreeMap;

#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn map_error(operation: &'static str, name: &str, namespace: &str, error: kube::Error) -> SecretStoreError {
    match error {
        kube::Error::Api(api_err) if api_err.code == 404 => SecretStoreError::NotFound {
            name: name.to_string(),
            namespace: namespace.to_string(),
        },
        kube::Error::Api(api_err) if api_err.code == 409 => SecretStoreError::Conflict {
            name: name.to_string(),
            namespace: namespace.to_string(),
        },
        other => SecretStoreError::Api {
            operation,
            name: name.to_string(),
            namespace: namespace.to_string(),
            message: other.to_string(),
        },
    }
}

fn from_k8s(secret: Secret) -> StoredSecret {
    let meta = secret.metadata;
    StoredSecret {
        name: meta.name.unwrap_or_default(),
        namespace: meta.namespace.unwrap_or_default(),
        labels: meta.labels.unwrap_or_default(),
        annotations: meta.annotations.unwrap_or_default(),
        owner_references: meta
            .owner_references
            .unwrap_or_default()
            .into_iter()
            .map(|r| OwnerRef {
                api_version: r.api_version,
                kind: r.kind,
                name: r.name,
                uid: r.uid,
            })
            .collect(),
        data: secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k, v.0))
            .collect(),
        resource_version: meta.resource_version,
    }
}

fn owner_references(secret: &StoredSecret) -> Option<Vec<OwnerReference>> {
    if secret.owner_references.is_empty() {
        return None;
    }
    Some(
        secret
            .owner_references
            .iter()
            .map(|r| OwnerReference {
                api_version: r.api_version.clone(),
                kind: r.kind.clone(),
                name: r.name.clone(),
                uid: r.uid.clone(),
                ..Default::default()
            })
            .collect(),
    )
}

fn non_empty(map: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!map.is_empty()).then(|| map.clone())
}

fn data(secret: &StoredSecret) -> Option<BTreeMap<String, ByteString>> {
    (!secret.data.is_empty()).then(|| {
        secret
            .data
            .iter()
            .map(|(k, v)| (k.clone(), ByteString(v.clone())))
            .collect()
    })
}

/// Copy the engine-managed fields onto an existing Kubernetes secret,
/// keeping everything else (type, finalizers, other metadata) intact
fn apply_to_k8s(target: &mut Secret, secret: &StoredSecret) {
    target.metadata.labels = non_empty(&secret.labels);
    target.metadata.annotations = non_empty(&secret.annotations);
    target.metadata.owner_references = owner_references(secret);
    target.metadata.resource_version.clone_from(&secret.resource_version);
    target.data = data(secret);
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, name: &str, namespace: &str) -> Result<StoredSecret, SecretStoreError> {
        self.api(namespace)
            .get(name)
            .await
            .map(from_k8s)
            .map_err(|e| map_error("get", name, namespace, e))
    }

    async fn create(&self, secret: &StoredSecret) -> Result<StoredSecret, SecretStoreError> {
        let mut k8s_secret = Secret {
            metadata: ObjectMeta {
                name: Some(secret.name.clone()),
                namespace: Some(secret.namespace.clone()),
                ..Default::default()
            },
            ..Default::default()
        };
        apply_to_k8s(&mut k8s_secret, secret);
        k8s_secret.metadata.resource_version = None;

        self.api(&secret.namespace)
            .create(&PostParams::default(), &k8s_secret)
            .await
            .map(from_k8s)
            .map_err(|e| map_error("create", &secret.name, &secret.namespace, e))
    }

    async fn update(&self, secret: &StoredSecret) -> Result<StoredSecret, SecretStoreError> {
        let api = self.api(&secret.namespace);
        let mut current = api
            .get(&secret.name)
            .await
            .map_err(|e| map_error("update", &secret.name, &secret.namespace, e))?;
        apply_to_k8s(&mut current, secret);

        api.replace(&secret.name, &PostParams::default(), &current)
            .await
            .map(from_k8s)
            .map_err(|e| map_error("update", &secret.name, &secret.namespace, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_keeps_engine_fields() {
        let mut stored = StoredSecret::new("s", "default");
        stored.labels.insert("app".to_string(), "demo".to_string());
        stored.set_value("token", "abc");
        stored.owner_references.push(OwnerRef {
            api_version: "http.resources.io/v1alpha2".to_string(),
            kind: "Request".to_string(),
            name: "req".to_string(),
            uid: "uid-1".to_string(),
        });
        stored.resource_version = Some("7".to_string());

        let mut k8s_secret = Secret {
            metadata: ObjectMeta {
                name: Some("s".to_string()),
                namespace: Some("default".to_string()),
                finalizers: Some(vec!["keep".to_string()]),
                ..Default::default()
            },
            type_: Some("Opaque".to_string()),
            ..Default::default()
        };
        apply_to_k8s(&mut k8s_secret, &stored);

        assert_eq!(k8s_secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(k8s_secret.metadata.finalizers, Some(vec!["keep".to_string()]));
        assert_eq!(from_k8s(k8s_secret), stored);
    }

    #[test]
    fn test_empty_metadata_is_cleared() {
        let stored = StoredSecret::new("s", "default");
        let mut k8s_secret = Secret::default();
        k8s_secret.metadata.labels = Some(BTreeMap::from([("old".to_string(), "x".to_string())]));
        apply_to_k8s(&mut k8s_secret, &stored);
        assert!(k8s_secret.metadata.labels.is_none());
    }
}
