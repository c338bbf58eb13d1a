//! # Status Updates
//!
//! Builds sync events and writes the status subresource.

use crate::controller::cluster::ClusterStore;
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{SyncEvent, SyncEventType, VaultSecret, VaultSecretStatus};
use chrono::{DateTime, Utc};
use tracing::debug;

pub const PHASE_PENDING: &str = "Pending";
pub const PHASE_SYNCED: &str = "Synced";

/// Event stamped with the current time
#[must_use]
pub fn sync_event(
    event_type: SyncEventType,
    vault_modified: Option<DateTime<Utc>>,
    message: impl Into<String>,
) -> SyncEvent {
    SyncEvent {
        timestamp: Utc::now().to_rfc3339(),
        vault_timestamp: vault_modified.map(|ts| ts.to_rfc3339()),
        event_type,
        message: message.into(),
    }
}

/// Write `status` if it differs from what `object` carries
///
/// Returns whether a write happened. Skipping identical writes keeps the pass from
/// triggering its own watch event.
pub async fn persist_status(
    cluster: &dyn ClusterStore,
    object: &VaultSecret,
    status: &VaultSecretStatus,
) -> Result<bool, ReconcilerError> {
    if object.status.as_ref() == Some(status) {
        debug!("Skipping status update - status unchanged");
        return Ok(false);
    }

    let namespace = object
        .metadata
        .namespace
        .as_deref()
        .ok_or(ReconcilerError::MissingObjectKey("namespace"))?;
    let name = object
        .metadata
        .name
        .as_deref()
        .ok_or(ReconcilerError::MissingObjectKey("name"))?;

    cluster
        .update_vault_secret_status(namespace, name, status)
        .await
        .map_err(ReconcilerError::from)
        .map(|()| true)
}
