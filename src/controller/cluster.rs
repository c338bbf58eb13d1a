//! # Cluster Object Store
//!
//! Narrow view of the Kubernetes API used by the reconciler.
//!
//! Not-found is never an error here: getters return `None` and deletes return `false`.
//! Optimistic-concurrency conflicts surface as [`ClusterError::Conflict`] so callers can
//! tell them apart from transport or authorization failures.

use crate::constants::FIELD_MANAGER;
use crate::crd::{VaultSecret, VaultSecretStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Secret};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use thiserror::Error;

/// Errors returned by a cluster store
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The object changed since it was read (HTTP 409)
    #[error("conflict writing {kind} {namespace}/{name}: object was modified concurrently")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    /// Any other Kubernetes API failure
    #[error("kubernetes API call {operation} failed: {source}")]
    Api {
        operation: &'static str,
        #[source]
        source: kube::Error,
    },
    /// Failure reported by a non-kube backend
    #[error("cluster operation {operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },
}

/// Typed cluster operations needed by the reconciler
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Fetch a `VaultSecret`; `None` when it does not exist
    async fn get_vault_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VaultSecret>, ClusterError>;

    /// Replace a `VaultSecret` (metadata and spec), guarded by its resource version
    async fn replace_vault_secret(&self, object: &VaultSecret) -> Result<VaultSecret, ClusterError>;

    /// Write the status subresource only
    async fn update_vault_secret_status(
        &self,
        namespace: &str,
        name: &str,
        status: &VaultSecretStatus,
    ) -> Result<(), ClusterError>;

    /// Fetch a Secret; `None` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str)
        -> Result<Option<Secret>, ClusterError>;

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError>;

    /// Replace a Secret, guarded by its resource version
    async fn replace_secret(&self, namespace: &str, secret: &Secret)
        -> Result<Secret, ClusterError>;

    /// Delete a Secret; `false` when it was already gone
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;

    /// List every pod in a namespace
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError>;

    /// Delete a pod; `false` when it was already gone
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;
}

/// `ClusterStore` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeClusterStore {
    client: Client,
}

impl std::fmt::Debug for KubeClusterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterStore").finish_non_exhaustive()
    }
}

impl KubeClusterStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn vault_secrets(&self, namespace: &str) -> Api<VaultSecret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn is_status(error: &kube::Error, code: u16) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == code)
}

fn classify(
    operation: &'static str,
    kind: &'static str,
    namespace: &str,
    name: &str,
    source: kube::Error,
) -> ClusterError {
    if is_status(&source, 409) {
        ClusterError::Conflict {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    } else {
        ClusterError::Api { operation, source }
    }
}

#[async_trait]
impl ClusterStore for KubeClusterStore {
    async fn get_vault_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VaultSecret>, ClusterError> {
        self.vault_secrets(namespace)
            .get_opt(name)
            .await
            .map_err(|source| ClusterError::Api {
                operation: "get_vault_secret",
                source,
            })
    }

    async fn replace_vault_secret(&self, object: &VaultSecret) -> Result<VaultSecret, ClusterError> {
        let namespace = object.metadata.namespace.as_deref().unwrap_or_default();
        let name = object.metadata.name.as_deref().unwrap_or_default();
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        self.vault_secrets(namespace)
            .replace(name, &pp, object)
            .await
            .map_err(|e| classify("replace_vault_secret", "VaultSecret", namespace, name, e))
    }

    async fn update_vault_secret_status(
        &self,
        namespace: &str,
        name: &str,
        status: &VaultSecretStatus,
    ) -> Result<(), ClusterError> {
        let patch = json!({ "status": status });
        self.vault_secrets(namespace)
            .patch_status(
                name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await
            .map_err(|e| classify("update_vault_secret_status", "VaultSecret", namespace, name, e))?;
        Ok(())
    }

    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, ClusterError> {
        self.secrets(namespace)
            .get_opt(name)
            .await
            .map_err(|source| ClusterError::Api {
                operation: "get_secret",
                source,
            })
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        let name = secret.metadata.name.as_deref().unwrap_or_default();
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        self.secrets(namespace)
            .create(&pp, secret)
            .await
            .map_err(|e| classify("create_secret", "Secret", namespace, name, e))
    }

    async fn replace_secret(
        &self,
        namespace: &str,
        secret: &Secret,
    ) -> Result<Secret, ClusterError> {
        let name = secret.metadata.name.as_deref().unwrap_or_default();
        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        self.secrets(namespace)
            .replace(name, &pp, secret)
            .await
            .map_err(|e| classify("replace_secret", "Secret", namespace, name, e))
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        match self
            .secrets(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, 404) => Ok(false),
            Err(source) => Err(ClusterError::Api {
                operation: "delete_secret",
                source,
            }),
        }
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError> {
        self.pods(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|source| ClusterError::Api {
                operation: "list_pods",
                source,
            })
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        match self
            .pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_status(&e, 404) => Ok(false),
            Err(source) => Err(ClusterError::Api {
                operation: "delete_pod",
                source,
            }),
        }
    }
}
