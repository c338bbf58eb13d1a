//! Common test utilities
//!
//! - rustls crypto provider setup for the Pact tests
//! - `FakeCluster`: in-memory `ClusterStore` with write counters and failure injection
//! - `FakeVault`: in-memory `VaultProvider`
//! - Builders for `VaultSecret`s, vault items and pods

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::api::core::v1::{Pod, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use vault_secret_controller::config::ControllerConfig;
use vault_secret_controller::controller::cluster::{ClusterError, ClusterStore};
use vault_secret_controller::controller::reconciler::Reconciler;
use vault_secret_controller::crd::{
    KeyMapping, SecretConfig, SecretKind, SourceConfig, VaultSecret, VaultSecretSpec,
    VaultSecretStatus,
};
use vault_secret_controller::provider::{
    Field, FileRef, Item, Section, VaultError, VaultProvider,
};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// Write counters, reset with `FakeCluster::reset_counters`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Counters {
    pub secret_creates: usize,
    pub secret_replaces: usize,
    pub secret_deletes: usize,
    pub status_writes: usize,
    pub vault_secret_replaces: usize,
    pub pod_deletes: Vec<String>,
}

impl Counters {
    /// Creates, replaces and deletes of destination secrets
    pub fn secret_mutations(&self) -> usize {
        self.secret_creates + self.secret_replaces + self.secret_deletes
    }
}

#[derive(Default)]
struct ClusterState {
    vault_secrets: BTreeMap<Key, VaultSecret>,
    secrets: BTreeMap<Key, Secret>,
    pods: BTreeMap<Key, Pod>,
    counters: Counters,
    resource_version: u64,
    failing_secret_deletes: HashSet<Key>,
    failing_secret_writes: HashSet<String>,
    failing_pod_deletes: HashSet<String>,
}

impl ClusterState {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

/// In-memory cluster
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<ClusterState>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with<T>(&self, f: impl FnOnce(&mut ClusterState) -> T) -> T {
        let mut state = self.state.lock().expect("cluster state lock");
        f(&mut state)
    }

    pub fn insert_vault_secret(&self, mut object: VaultSecret) {
        self.with(|s| {
            object.metadata.resource_version = Some(s.next_version());
            let k = key(
                object.metadata.namespace.as_deref().unwrap_or_default(),
                object.metadata.name.as_deref().unwrap_or_default(),
            );
            s.vault_secrets.insert(k, object);
        });
    }

    pub fn vault_secret(&self, namespace: &str, name: &str) -> Option<VaultSecret> {
        self.with(|s| s.vault_secrets.get(&key(namespace, name)).cloned())
    }

    pub fn status(&self, namespace: &str, name: &str) -> VaultSecretStatus {
        self.vault_secret(namespace, name)
            .and_then(|o| o.status)
            .unwrap_or_default()
    }

    /// User edit of the spec; bumps `metadata.generation` like the API server does
    pub fn edit_spec(&self, namespace: &str, name: &str, edit: impl FnOnce(&mut VaultSecretSpec)) {
        self.with(|s| {
            let version = s.next_version();
            let object = s
                .vault_secrets
                .get_mut(&key(namespace, name))
                .expect("VaultSecret exists");
            edit(&mut object.spec);
            object.metadata.generation = Some(object.metadata.generation.unwrap_or(1) + 1);
            object.metadata.resource_version = Some(version);
        });
    }

    /// User deletion: marks the object when finalizers are present, removes it otherwise
    pub fn request_delete(&self, namespace: &str, name: &str) {
        self.with(|s| {
            let k = key(namespace, name);
            let has_finalizers = s
                .vault_secrets
                .get(&k)
                .and_then(|o| o.metadata.finalizers.as_ref())
                .is_some_and(|f| !f.is_empty());
            if has_finalizers {
                if let Some(object) = s.vault_secrets.get_mut(&k) {
                    object.metadata.deletion_timestamp = Some(Time(Utc::now()));
                }
            } else {
                s.vault_secrets.remove(&k);
            }
        });
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.with(|s| s.secrets.get(&key(namespace, name)).cloned())
    }

    /// Decoded value of `data[data_key]`
    pub fn secret_value(&self, namespace: &str, name: &str, data_key: &str) -> Option<String> {
        self.secret(namespace, name)
            .and_then(|secret| secret.data)
            .and_then(|data| data.get(data_key).cloned())
            .map(|bytes| String::from_utf8(bytes.0).expect("utf8 secret value"))
    }

    pub fn insert_secret(&self, namespace: &str, mut secret: Secret) {
        self.with(|s| {
            secret.metadata.namespace = Some(namespace.to_string());
            secret.metadata.resource_version = Some(s.next_version());
            let name = secret.metadata.name.clone().unwrap_or_default();
            s.secrets.insert(key(namespace, &name), secret);
        });
    }

    pub fn insert_pod(&self, pod: Pod) {
        self.with(|s| {
            let k = key(
                pod.metadata.namespace.as_deref().unwrap_or_default(),
                pod.metadata.name.as_deref().unwrap_or_default(),
            );
            s.pods.insert(k, pod);
        });
    }

    pub fn pod_exists(&self, namespace: &str, name: &str) -> bool {
        self.with(|s| s.pods.contains_key(&key(namespace, name)))
    }

    pub fn fail_secret_delete(&self, namespace: &str, name: &str) {
        self.with(|s| s.failing_secret_deletes.insert(key(namespace, name)));
    }

    pub fn allow_secret_delete(&self, namespace: &str, name: &str) {
        self.with(|s| s.failing_secret_deletes.remove(&key(namespace, name)));
    }

    /// Every create or replace of a secret in `namespace` fails
    pub fn fail_secret_writes_in(&self, namespace: &str) {
        self.with(|s| s.failing_secret_writes.insert(namespace.to_string()));
    }

    pub fn fail_pod_delete(&self, name: &str) {
        self.with(|s| s.failing_pod_deletes.insert(name.to_string()));
    }

    pub fn counters(&self) -> Counters {
        self.with(|s| s.counters.clone())
    }

    pub fn reset_counters(&self) {
        self.with(|s| s.counters = Counters::default());
    }
}

fn request_error(operation: &'static str, message: impl Into<String>) -> ClusterError {
    ClusterError::Request {
        operation,
        message: message.into(),
    }
}

#[async_trait]
impl ClusterStore for FakeCluster {
    async fn get_vault_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<VaultSecret>, ClusterError> {
        Ok(self.vault_secret(namespace, name))
    }

    async fn replace_vault_secret(&self, object: &VaultSecret) -> Result<VaultSecret, ClusterError> {
        self.with(|s| {
            let k = key(
                object.metadata.namespace.as_deref().unwrap_or_default(),
                object.metadata.name.as_deref().unwrap_or_default(),
            );
            let Some(stored) = s.vault_secrets.get(&k) else {
                return Err(request_error("replace_vault_secret", "not found"));
            };
            if stored.metadata.resource_version != object.metadata.resource_version {
                return Err(ClusterError::Conflict {
                    kind: "VaultSecret",
                    namespace: k.0,
                    name: k.1,
                });
            }
            s.counters.vault_secret_replaces += 1;
            let mut updated = object.clone();
            // Status is only writable through the subresource
            updated.status = stored.status.clone();
            updated.metadata.resource_version = Some(s.next_version());

            let released = updated.metadata.deletion_timestamp.is_some()
                && updated.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
            if released {
                s.vault_secrets.remove(&k);
            } else {
                s.vault_secrets.insert(k, updated.clone());
            }
            Ok(updated)
        })
    }

    async fn update_vault_secret_status(
        &self,
        namespace: &str,
        name: &str,
        status: &VaultSecretStatus,
    ) -> Result<(), ClusterError> {
        self.with(|s| {
            let version = s.next_version();
            let object = s
                .vault_secrets
                .get_mut(&key(namespace, name))
                .ok_or_else(|| request_error("update_vault_secret_status", "not found"))?;
            object.status = Some(status.clone());
            object.metadata.resource_version = Some(version);
            s.counters.status_writes += 1;
            Ok(())
        })
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError> {
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        self.with(|s| {
            if s.failing_secret_writes.contains(namespace) {
                return Err(request_error("create_secret", "injected failure"));
            }
            let name = secret.metadata.name.clone().unwrap_or_default();
            let k = key(namespace, &name);
            if s.secrets.contains_key(&k) {
                return Err(request_error("create_secret", "already exists"));
            }
            let mut created = secret.clone();
            created.metadata.namespace = Some(namespace.to_string());
            created.metadata.resource_version = Some(s.next_version());
            s.secrets.insert(k, created.clone());
            s.counters.secret_creates += 1;
            Ok(created)
        })
    }

    async fn replace_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, ClusterError> {
        self.with(|s| {
            if s.failing_secret_writes.contains(namespace) {
                return Err(request_error("replace_secret", "injected failure"));
            }
            let name = secret.metadata.name.clone().unwrap_or_default();
            let k = key(namespace, &name);
            let Some(stored) = s.secrets.get(&k) else {
                return Err(request_error("replace_secret", "not found"));
            };
            if stored.metadata.resource_version != secret.metadata.resource_version {
                return Err(ClusterError::Conflict {
                    kind: "Secret",
                    namespace: k.0,
                    name: k.1,
                });
            }
            let mut replaced = secret.clone();
            replaced.metadata.resource_version = Some(s.next_version());
            s.secrets.insert(k, replaced.clone());
            s.counters.secret_replaces += 1;
            Ok(replaced)
        })
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.with(|s| {
            let k = key(namespace, name);
            if s.failing_secret_deletes.contains(&k) {
                return Err(request_error("delete_secret", "injected failure"));
            }
            let deleted = s.secrets.remove(&k).is_some();
            if deleted {
                s.counters.secret_deletes += 1;
            }
            Ok(deleted)
        })
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, ClusterError> {
        Ok(self.with(|s| {
            s.pods
                .iter()
                .filter(|((ns, _), _)| ns == namespace)
                .map(|(_, pod)| pod.clone())
                .collect()
        }))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.with(|s| {
            if s.failing_pod_deletes.contains(name) {
                return Err(request_error("delete_pod", "injected failure"));
            }
            let deleted = s.pods.remove(&key(namespace, name)).is_some();
            if deleted {
                s.counters.pod_deletes.push(name.to_string());
            }
            Ok(deleted)
        })
    }
}

/// In-memory vault keyed by (vault, item)
#[derive(Default)]
pub struct FakeVault {
    items: Mutex<BTreeMap<Key, Item>>,
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    failure: Mutex<Option<u16>>,
    pub item_reads: AtomicUsize,
}

impl FakeVault {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put_item(&self, vault: &str, item: Item) {
        self.items
            .lock()
            .expect("vault lock")
            .insert(key(vault, &item.title), item);
    }

    pub fn put_file(&self, file_id: &str, content: &[u8]) {
        self.files
            .lock()
            .expect("vault lock")
            .insert(file_id.to_string(), content.to_vec());
    }

    /// Set a field value and its timestamp, creating the section if needed
    pub fn set_field(
        &self,
        vault: &str,
        item: &str,
        section: &str,
        field: &str,
        value: &str,
        modified: DateTime<Utc>,
    ) {
        let mut items = self.items.lock().expect("vault lock");
        let entry = items.entry(key(vault, item)).or_insert_with(|| Item {
            id: format!("{item}-id"),
            title: item.to_string(),
            ..Item::default()
        });
        let section = entry
            .sections
            .entry(section.to_string())
            .or_insert_with(|| Section {
                id: format!("{section}-id"),
                label: section.to_string(),
                ..Section::default()
            });
        section
            .values
            .insert(field.to_string(), Field::new(value, Some(modified)));
        section.last_modified = section.last_modified.max(Some(modified));
        entry.last_modified = entry.last_modified.max(Some(modified));
    }

    /// Attach a file to a section, creating the section if needed
    pub fn attach_file(
        &self,
        vault: &str,
        item: &str,
        section: &str,
        name: &str,
        content: &[u8],
        modified: DateTime<Utc>,
    ) {
        let file_id = format!("{item}-{section}-{name}");
        self.put_file(&file_id, content);
        let mut items = self.items.lock().expect("vault lock");
        let entry = items.entry(key(vault, item)).or_insert_with(|| Item {
            id: format!("{item}-id"),
            title: item.to_string(),
            ..Item::default()
        });
        let item_id = entry.id.clone();
        let section = entry
            .sections
            .entry(section.to_string())
            .or_insert_with(|| Section {
                id: format!("{section}-id"),
                label: section.to_string(),
                ..Section::default()
            });
        section.files.insert(
            name.to_string(),
            FileRef {
                id: file_id,
                name: name.to_string(),
                vault_id: vault.to_string(),
                item_id,
                content_path: None,
            },
        );
        section.last_modified = section.last_modified.max(Some(modified));
        entry.last_modified = entry.last_modified.max(Some(modified));
    }

    /// Every subsequent lookup fails with this HTTP status
    pub fn fail_with(&self, status: u16) {
        *self.failure.lock().expect("vault lock") = Some(status);
    }

    pub fn recover(&self) {
        *self.failure.lock().expect("vault lock") = None;
    }
}

#[async_trait]
impl VaultProvider for FakeVault {
    async fn get_item(&self, vault: &str, item: &str) -> Result<Item, VaultError> {
        self.item_reads.fetch_add(1, Ordering::Relaxed);
        if let Some(status) = *self.failure.lock().expect("vault lock") {
            return Err(VaultError::Http {
                status,
                message: "injected failure".to_string(),
            });
        }
        self.items
            .lock()
            .expect("vault lock")
            .get(&key(vault, item))
            .cloned()
            .ok_or_else(|| VaultError::not_found("item", item))
    }

    async fn file_content(&self, file: &FileRef) -> Result<Vec<u8>, VaultError> {
        self.files
            .lock()
            .expect("vault lock")
            .get(&file.id)
            .cloned()
            .ok_or_else(|| VaultError::not_found("file", file.name.clone()))
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
}

/// Opaque `VaultSecret` reading `platform/db/prod`
pub fn vault_secret(
    namespace: &str,
    name: &str,
    namespaces: &[&str],
    keys: &[(&str, &str)],
) -> VaultSecret {
    let mut object = VaultSecret::new(
        name,
        VaultSecretSpec {
            source: SourceConfig {
                vault: "platform".to_string(),
                item: "db".to_string(),
                section: "prod".to_string(),
                key: None,
            },
            secret: SecretConfig {
                name: "db-creds".to_string(),
                namespaces: namespaces.iter().map(|ns| (*ns).to_string()).collect(),
                secret_type: SecretKind::Opaque,
                keys: keys
                    .iter()
                    .map(|(from, to)| KeyMapping::new(*from, *to))
                    .collect(),
                refresh_seconds: 60,
            },
        },
    );
    object.metadata.namespace = Some(namespace.to_string());
    object.metadata.uid = Some(format!("{namespace}-{name}-uid"));
    object.metadata.generation = Some(1);
    object
}

/// Pod in `namespace` consuming `secret` through the given reference kind
pub fn pod_using_secret(namespace: &str, name: &str, secret: &str, via: &str) -> Pod {
    let spec = match via {
        "env" => json!({"containers": [{
            "name": "app",
            "env": [{"name": "X", "valueFrom": {"secretKeyRef": {"name": secret, "key": "k"}}}]
        }]}),
        "envFrom" => json!({"containers": [{
            "name": "app",
            "envFrom": [{"secretRef": {"name": secret}}]
        }]}),
        "volume" => json!({
            "containers": [{"name": "app"}],
            "volumes": [{"name": "creds", "secret": {"secretName": secret}}]
        }),
        "imagePull" => json!({
            "containers": [{"name": "app"}],
            "imagePullSecrets": [{"name": secret}]
        }),
        _ => json!({"containers": [{"name": "app"}]}),
    };
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": name, "namespace": namespace},
        "spec": spec
    }))
    .expect("valid pod")
}

/// Reconciler over the fakes with a 300s minimum refresh
pub fn reconciler(cluster: &Arc<FakeCluster>, vault: &Arc<FakeVault>) -> Reconciler {
    let config = ControllerConfig {
        min_refresh_interval_secs: 300,
        ..ControllerConfig::default()
    };
    Reconciler::new(
        Arc::clone(cluster) as Arc<dyn ClusterStore>,
        Arc::clone(vault) as Arc<dyn VaultProvider>,
        &config,
    )
}
