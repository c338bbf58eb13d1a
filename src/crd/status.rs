//! # VaultSecret Status
//!
//! Controller-owned status: synchronization timestamp, event history and the set of
//! destination secrets the controller believes it has written.

use serde::{Deserialize, Serialize};

/// Status of the VaultSecret resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultSecretStatus {
    /// Current phase
    /// Values: Pending, Synced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Human-readable description of current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Generation of the spec last acted upon
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Last successful synchronization (RFC3339), never moves backwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<String>,
    /// Append-only synchronization history
    #[serde(default)]
    pub events: Vec<SyncEvent>,
    /// Destination secrets currently believed to exist
    #[serde(default)]
    pub secrets: Vec<SecretRef>,
}

/// One synchronization event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    /// Wall-clock time the write completed (RFC3339)
    pub timestamp: String,
    /// Vault-side last-modified time that caused the write (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_timestamp: Option<String>,
    /// What happened to the destination secret
    #[serde(rename = "type")]
    pub event_type: SyncEventType,
    pub message: String,
}

/// Synchronization event type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SyncEventType {
    Create,
    Update,
    Delete,
}

impl SyncEventType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncEventType::Create => "create",
            SyncEventType::Update => "update",
            SyncEventType::Delete => "delete",
        }
    }
}

/// A destination secret tracked in status
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub name: String,
    pub namespace: String,
}

impl SecretRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl std::fmt::Display for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
