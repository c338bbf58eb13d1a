//! # Finalizer
//!
//! The cleanup finalizer keeps a `VaultSecret` in the API server until every destination
//! secret it produced has been deleted.
//!
//! The finalizer is attached before the first destination write and removed only after
//! cleanup ran, so a destination secret never exists without a finalizer guarding it.

use crate::constants::FINALIZER;
use crate::controller::cluster::ClusterStore;
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{SecretRef, VaultSecret};
use crate::observability;
use tracing::{info, warn};

/// Result of deleting the destination secrets of a `VaultSecret`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: Vec<SecretRef>,
    /// Already gone when cleanup ran
    pub missing: Vec<SecretRef>,
    /// Secret and error message for each failed deletion
    pub failed: Vec<(SecretRef, String)>,
}

impl CleanupReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[must_use]
pub fn has_finalizer(object: &VaultSecret) -> bool {
    object
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|finalizers| finalizers.iter().any(|f| f == FINALIZER))
}

/// Add the cleanup finalizer; returns `false` when it was already present
pub async fn attach(cluster: &dyn ClusterStore, object: &VaultSecret) -> Result<bool, ReconcilerError> {
    if has_finalizer(object) {
        return Ok(false);
    }
    let mut updated = object.clone();
    updated
        .metadata
        .finalizers
        .get_or_insert_with(Vec::new)
        .push(FINALIZER.to_string());
    cluster.replace_vault_secret(&updated).await?;
    Ok(true)
}

/// Remove the cleanup finalizer, leaving any other finalizer in place
pub async fn detach(cluster: &dyn ClusterStore, object: &VaultSecret) -> Result<bool, ReconcilerError> {
    if !has_finalizer(object) {
        return Ok(false);
    }
    let mut updated = object.clone();
    if let Some(finalizers) = updated.metadata.finalizers.as_mut() {
        finalizers.retain(|f| f != FINALIZER);
    }
    cluster.replace_vault_secret(&updated).await?;
    Ok(true)
}

/// Secrets to delete on cleanup: every declared destination plus anything still tracked
#[must_use]
pub fn cleanup_targets(object: &VaultSecret, own_namespace: &str) -> Vec<SecretRef> {
    let declared = object
        .spec
        .destination_namespaces(own_namespace)
        .into_iter()
        .map(|ns| SecretRef::new(object.spec.secret.name.clone(), ns));
    let tracked = object
        .status
        .iter()
        .flat_map(|status| status.secrets.iter().cloned());

    let mut targets: Vec<SecretRef> = Vec::new();
    for target in declared.chain(tracked) {
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}

/// Delete every destination secret of `object`
///
/// Each deletion is attempted even when an earlier one failed.
pub async fn cleanup(
    cluster: &dyn ClusterStore,
    object: &VaultSecret,
    own_namespace: &str,
) -> CleanupReport {
    let mut report = CleanupReport::default();
    for target in cleanup_targets(object, own_namespace) {
        match cluster.delete_secret(&target.namespace, &target.name).await {
            Ok(true) => {
                info!("🗑️  Deleted destination secret {}", target);
                observability::metrics::increment_secrets_deleted();
                report.deleted.push(target);
            }
            Ok(false) => report.missing.push(target),
            Err(e) => {
                warn!("Failed to delete destination secret {}: {}", target, e);
                report.failed.push((target, e.to_string()));
            }
        }
    }
    report
}
