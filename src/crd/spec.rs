//! # VaultSecret Spec
//!
//! Main CRD specification types and default values.

use serde::{Deserialize, Serialize};

/// VaultSecret Custom Resource Definition
///
/// Declares that a 1Password item section should be mirrored into one Kubernetes
/// Secret per destination namespace.
///
/// # Example
///
/// ```yaml
/// apiVersion: secret-management.octopilot.io/v1
/// kind: VaultSecret
/// metadata:
///   name: payments-db
///   namespace: payments
/// spec:
///   source:
///     vault: platform
///     item: payments-database
///     section: production
///   secret:
///     name: payments-db-credentials
///     namespaces: [payments, payments-jobs]
///     secretType: opaque
///     refreshSeconds: 300
///     keys:
///       - from: username
///         to: DB_USER
///       - from: password
///         to: DB_PASSWORD
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "VaultSecret",
    group = "secret-management.octopilot.io",
    version = "v1",
    namespaced,
    status = "crate::crd::VaultSecretStatus",
    shortname = "vsec",
    printcolumn = r#"{"name":"Vault", "type":"string", "jsonPath":".spec.source.vault"}, {"name":"Item", "type":"string", "jsonPath":".spec.source.item"}, {"name":"Section", "type":"string", "jsonPath":".spec.source.section"}, {"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Last Synced", "type":"string", "jsonPath":".status.lastSynced"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VaultSecretSpec {
    /// Location of the secret material in the vault
    pub source: SourceConfig,
    /// Shape and placement of the destination secrets
    pub secret: SecretConfig,
}

/// Vault coordinate: vault → item → section (→ key)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    /// Vault name or Connect id
    pub vault: String,
    /// Item title or Connect id
    pub item: String,
    /// Section label (or id) inside the item
    pub section: String,
    /// Single field to fetch instead of the whole section
    /// When set and `secret.keys` is empty, the field is written under its own name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Destination secret configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretConfig {
    /// Name of the destination Secret in every destination namespace
    pub name: String,
    /// Destination namespaces, processed in declaration order
    /// Empty means the VaultSecret's own namespace
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Kind of secret to materialize
    #[serde(default)]
    pub secret_type: SecretKind,
    /// Ordered field mapping from vault field name to secret data key
    #[serde(default)]
    pub keys: Vec<KeyMapping>,
    /// Desired poll interval in seconds
    /// Values below the controller minimum (and 0) use the controller minimum
    #[serde(default)]
    pub refresh_seconds: u64,
}

/// Kind of destination secret
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SecretKind {
    /// Plain key/value secret (`Opaque`)
    #[default]
    Opaque,
    /// Registry pull credential (`kubernetes.io/dockerconfigjson`)
    DockerRegistry,
}

impl SecretKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretKind::Opaque => "opaque",
            SecretKind::DockerRegistry => "docker-registry",
        }
    }
}

/// Maps a vault field to a destination secret key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyMapping {
    /// Vault field label (or file name)
    pub from: String,
    /// Destination secret data key
    pub to: String,
}

impl KeyMapping {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl VaultSecretSpec {
    /// Key mappings with the single-key variant folded in
    ///
    /// An empty `keys` list with `source.key` set maps that key onto itself.
    #[must_use]
    pub fn effective_keys(&self) -> Vec<KeyMapping> {
        match (&self.source.key, self.secret.keys.is_empty()) {
            (Some(key), true) => vec![KeyMapping::new(key.clone(), key.clone())],
            _ => self.secret.keys.clone(),
        }
    }

    /// Destination namespaces in declaration order, de-duplicated
    ///
    /// `own_namespace` is used when no namespace is declared.
    #[must_use]
    pub fn destination_namespaces(&self, own_namespace: &str) -> Vec<String> {
        if self.secret.namespaces.is_empty() {
            return vec![own_namespace.to_string()];
        }
        let mut seen = std::collections::HashSet::new();
        self.secret
            .namespaces
            .iter()
            .filter(|ns| seen.insert(ns.as_str()))
            .cloned()
            .collect()
    }
}
