//! # Reconciliation Logic
//!
//! One pass over one `VaultSecret`. Each step is a hard gate: a failure aborts the pass
//! and surfaces to the error policy, and nothing after the failing step runs.
//!
//! 1. Re-read the object; a missing object needs nothing.
//! 2. Deletion requested: run cleanup and release the finalizer.
//! 3. Finalizer absent: attach it, mark a fresh object `Pending` and stop; the write
//!    triggers the next pass.
//! 4. Fetch the vault section (or single key). Not-found is a no-op, not an error.
//! 5. Ask the change detector whether anything has to be written.
//! 6. Materialize the payload and write it to every declared namespace, evicting
//!    dependents of updated secrets, then delete secrets no longer declared.
//! 7. Persist status when it changed.
//! 8. Requeue after the scheduler's delay.

use crate::constants::{MANAGED_BY_LABEL, MANAGED_BY_VALUE, OWNER_ANNOTATION, SECRET_TYPE_OPAQUE};
use crate::controller::reconciler::change::{
    advance_last_synced, detect_change, ChangeInput, SyncReason,
};
use crate::controller::reconciler::eviction::evict_dependents;
use crate::controller::reconciler::finalizer;
use crate::controller::reconciler::materialize::{materialize, MaterializeError, SecretPayload};
use crate::controller::reconciler::status::{
    persist_status, sync_event, PHASE_PENDING, PHASE_SYNCED,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError, TriggerSource};
use crate::crd::{SecretRef, SourceConfig, SyncEventType, VaultSecret, VaultSecretStatus};
use crate::observability;
use crate::provider::{Section, VaultError, VaultProvider};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use kube_runtime::controller::Action;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// How a pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The object no longer exists
    Absent,
    /// Deletion requested but the finalizer is not ours to run
    AwaitingDeletion,
    /// Destination secrets removed and the finalizer released
    Finalized,
    /// The finalizer was attached; no vault access happened
    FinalizerAttached { requeue_after: Duration },
    /// The vault section or key does not exist
    SourceMissing { requeue_after: Duration },
    /// Nothing changed since the last sync
    UpToDate { requeue_after: Duration },
    /// Destination secrets were reconciled
    Synced {
        requeue_after: Duration,
        reason: SyncReason,
        events: usize,
    },
}

impl PassOutcome {
    #[must_use]
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            PassOutcome::Absent | PassOutcome::AwaitingDeletion | PassOutcome::Finalized => None,
            PassOutcome::FinalizerAttached { requeue_after }
            | PassOutcome::SourceMissing { requeue_after }
            | PassOutcome::UpToDate { requeue_after }
            | PassOutcome::Synced { requeue_after, .. } => Some(*requeue_after),
        }
    }

    #[must_use]
    pub fn trigger(&self) -> TriggerSource {
        match self {
            PassOutcome::FinalizerAttached { .. } => TriggerSource::FinalizerAttached,
            _ => TriggerSource::TimerBased,
        }
    }

    #[must_use]
    pub fn action(&self) -> Action {
        self.requeue_after()
            .map_or_else(Action::await_change, Action::requeue)
    }
}

/// Controller entry point
///
/// Errors are handled by the error policy in the runtime, which owns the backoff.
pub async fn reconcile(
    object: Arc<VaultSecret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let namespace = object
        .metadata
        .namespace
        .clone()
        .ok_or(ReconcilerError::MissingObjectKey("namespace"))?;
    let name = object
        .metadata
        .name
        .clone()
        .ok_or(ReconcilerError::MissingObjectKey("name"))?;

    let span = info_span!(
        "reconcile",
        resource.name = %name,
        resource.namespace = %namespace,
        resource.kind = "VaultSecret",
    );

    async move {
        let start = Instant::now();
        observability::metrics::increment_reconciliations();
        info!("🔄 Reconciling VaultSecret {}/{}", namespace, name);

        let result = reconcile_pass(&ctx, &namespace, &name).await;
        observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        match result {
            Ok(outcome) => {
                let resource_key = format!("{namespace}/{name}");
                if ctx.reset_backoff(&resource_key) {
                    info!("✅ {} recovered, error backoff reset", resource_key);
                }
                if let Some(delay) = outcome.requeue_after() {
                    let trigger = outcome.trigger();
                    observability::metrics::increment_requeues_total(trigger.as_str());
                    info!(
                        "⏰ Next reconcile for {} in {}s (trigger source: {})",
                        resource_key,
                        delay.as_secs(),
                        trigger.as_str()
                    );
                } else {
                    debug!("No further reconcile scheduled for {}", resource_key);
                }
                Ok(outcome.action())
            }
            Err(e) => {
                observability::metrics::increment_reconciliation_errors();
                error!("❌ Reconciliation of {}/{} failed: {}", namespace, name, e);
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}

/// Run one reconciliation pass for `namespace/name`
pub async fn reconcile_pass(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<PassOutcome, ReconcilerError> {
    let cluster = ctx.cluster.as_ref();

    // 1. Fresh read; the cached copy may predate our own last write
    let Some(object) = cluster.get_vault_secret(namespace, name).await? else {
        debug!("VaultSecret {}/{} is gone", namespace, name);
        return Ok(PassOutcome::Absent);
    };

    // 2. Deletion
    if object.metadata.deletion_timestamp.is_some() {
        if !finalizer::has_finalizer(&object) {
            return Ok(PassOutcome::AwaitingDeletion);
        }
        let report = finalizer::cleanup(cluster, &object, namespace).await;
        if !report.is_complete() {
            return Err(ReconcilerError::CleanupIncomplete {
                resource: format!("{namespace}/{name}"),
                failed: report.failed.len(),
            });
        }
        finalizer::detach(cluster, &object).await?;
        info!(
            "🧹 VaultSecret {}/{} finalized ({} deleted, {} already gone)",
            namespace,
            name,
            report.deleted.len(),
            report.missing.len()
        );
        return Ok(PassOutcome::Finalized);
    }

    let requeue_after = ctx.scheduler.delay_for(&object.spec);

    // 3. Finalizer before any destination write
    if finalizer::attach(cluster, &object).await? {
        info!("🔒 Attached finalizer to VaultSecret {}/{}", namespace, name);
        if object.status.is_none() {
            let pending = VaultSecretStatus {
                phase: Some(PHASE_PENDING.to_string()),
                description: Some("Waiting for first sync".to_string()),
                ..VaultSecretStatus::default()
            };
            persist_status(cluster, &object, &pending).await?;
        }
        return Ok(PassOutcome::FinalizerAttached { requeue_after });
    }

    // 4. Vault lookup
    let source = &object.spec.source;
    let Some(section) = fetch_section(ctx.vault.as_ref(), source)
        .await
        .map_err(|source_err| ReconcilerError::Vault {
            location: source_location(source),
            source: source_err,
        })?
    else {
        warn!(
            "Vault location {} not found for VaultSecret {}/{}, nothing to sync",
            source_location(source),
            namespace,
            name
        );
        return Ok(PassOutcome::SourceMissing { requeue_after });
    };

    // 5. Change detection
    let keys = object.spec.effective_keys();
    let vault_modified = section.newest_timestamp(keys.iter().map(|k| k.from.as_str()));
    let declared = object.spec.destination_namespaces(namespace);
    let previous = object.status.clone().unwrap_or_default();
    let secret_name = object.spec.secret.name.as_str();

    let Some(reason) = detect_change(&ChangeInput {
        last_synced: previous.last_synced.as_deref(),
        vault_modified,
        secret_name,
        declared_namespaces: &declared,
        tracked: &previous.secrets,
        generation: object.metadata.generation,
        observed_generation: previous.observed_generation,
    }) else {
        debug!("VaultSecret {}/{} is up to date", namespace, name);
        return Ok(PassOutcome::UpToDate { requeue_after });
    };
    info!("VaultSecret {}/{} needs sync: {}", namespace, name, reason);

    // 6. Materialize, then write every declared destination in order
    let payload = materialize(&object.spec, &section, ctx.vault.as_ref())
        .await
        .map_err(|e| match e {
            MaterializeError::File { source: err, .. } => ReconcilerError::Vault {
                location: source_location(source),
                source: err,
            },
            other => ReconcilerError::Configuration {
                resource: format!("{namespace}/{name}"),
                source: other,
            },
        })?;

    let mut status = previous.clone();
    let events_before = status.events.len();
    let mut tracked: Vec<SecretRef> = Vec::with_capacity(declared.len());

    for destination in &declared {
        let target = SecretRef::new(secret_name, destination.as_str());
        let desired = desired_secret(&object, destination, &payload);
        write_destination(ctx, &target, desired, &payload, vault_modified, &mut status).await?;
        tracked.push(target);
    }

    // Shrink: anything tracked that is no longer declared
    let stale_entries: Vec<SecretRef> = previous
        .secrets
        .iter()
        .filter(|t| !tracked.contains(t))
        .cloned()
        .collect();
    for stale in stale_entries {
        match cluster.delete_secret(&stale.namespace, &stale.name).await {
            Ok(deleted) => {
                if deleted {
                    info!("🗑️  Deleted undeclared destination secret {}", stale);
                    observability::metrics::increment_secrets_deleted();
                    status.events.push(sync_event(
                        SyncEventType::Delete,
                        vault_modified,
                        format!("deleted secret {stale}, no longer declared"),
                    ));
                }
            }
            Err(e) => {
                warn!(
                    "Failed to delete undeclared destination secret {}: {} (kept in status for retry)",
                    stale, e
                );
                tracked.push(stale);
            }
        }
    }

    let events = status.events.len() - events_before;
    status.secrets = tracked;
    status.last_synced = Some(
        advance_last_synced(previous.last_synced.as_deref(), Utc::now(), vault_modified)
            .to_rfc3339(),
    );
    status.observed_generation = object.metadata.generation;
    status.phase = Some(PHASE_SYNCED.to_string());
    status.description = Some(format!(
        "Synced {} from {} to {} namespace(s)",
        secret_name,
        source_location(source),
        declared.len()
    ));

    // 7. Status
    persist_status(cluster, &object, &status).await?;

    // 8. Requeue
    Ok(PassOutcome::Synced {
        requeue_after,
        reason,
        events,
    })
}

/// `vault/item/section[/key]`
fn source_location(source: &SourceConfig) -> String {
    match &source.key {
        Some(key) => format!("{}/{}/{}/{}", source.vault, source.item, source.section, key),
        None => format!("{}/{}/{}", source.vault, source.item, source.section),
    }
}

/// Fetch the configured section; `Ok(None)` when any part of the path does not exist
async fn fetch_section(
    vault: &dyn VaultProvider,
    source: &SourceConfig,
) -> Result<Option<Section>, VaultError> {
    let fetched = match &source.key {
        Some(key) => vault
            .get_key(&source.vault, &source.item, &source.section, key)
            .await
            .map(|field| Some(Section::from_field(&source.section, key, field))),
        None => vault
            .get_item(&source.vault, &source.item)
            .await
            .map(|item| item.section(&source.section).cloned()),
    };
    match fetched {
        Err(e) if e.is_not_found() => Ok(None),
        other => other,
    }
}

/// Full desired state of the destination secret in `namespace`
///
/// The owner reference is only set in the `VaultSecret`'s own namespace; other namespaces
/// rely on the owner annotation and the tracked set in status.
fn desired_secret(object: &VaultSecret, namespace: &str, payload: &SecretPayload) -> Secret {
    let owner_namespace = object.metadata.namespace.as_deref().unwrap_or_default();
    let owner_name = object.metadata.name.as_deref().unwrap_or_default();
    let owner_references = (namespace == owner_namespace)
        .then(|| object.controller_owner_ref(&()))
        .flatten()
        .map(|owner| vec![owner]);

    Secret {
        metadata: ObjectMeta {
            name: Some(object.spec.secret.name.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                MANAGED_BY_VALUE.to_string(),
            )])),
            annotations: Some(BTreeMap::from([(
                OWNER_ANNOTATION.to_string(),
                format!("{owner_namespace}/{owner_name}"),
            )])),
            owner_references,
            ..ObjectMeta::default()
        },
        type_: Some(payload.secret_type.clone()),
        data: Some(payload.data.clone()),
        ..Secret::default()
    }
}

fn payload_matches(existing: &Secret, payload: &SecretPayload) -> bool {
    existing.type_.as_deref().unwrap_or(SECRET_TYPE_OPAQUE) == payload.secret_type
        && existing.data.as_ref().map_or(payload.data.is_empty(), |data| *data == payload.data)
}

/// Create or update one destination secret, recording events and evicting dependents
async fn write_destination(
    ctx: &Reconciler,
    target: &SecretRef,
    desired: Secret,
    payload: &SecretPayload,
    vault_modified: Option<DateTime<Utc>>,
    status: &mut VaultSecretStatus,
) -> Result<(), ReconcilerError> {
    let cluster = ctx.cluster.as_ref();

    let Some(existing) = cluster.get_secret(&target.namespace, &target.name).await? else {
        cluster.create_secret(&target.namespace, &desired).await?;
        info!("✨ Created destination secret {}", target);
        observability::metrics::increment_secrets_created();
        status.events.push(sync_event(
            SyncEventType::Create,
            vault_modified,
            format!("created secret {target}"),
        ));
        return Ok(());
    };

    if payload_matches(&existing, payload) {
        debug!("Destination secret {} already up to date", target);
        return Ok(());
    }

    let type_changed =
        existing.type_.as_deref().unwrap_or(SECRET_TYPE_OPAQUE) != payload.secret_type;
    if type_changed {
        // Secret type is immutable: recreate
        cluster.delete_secret(&target.namespace, &target.name).await?;
        cluster.create_secret(&target.namespace, &desired).await?;
    } else {
        let mut updated = existing;
        let metadata = &mut updated.metadata;
        metadata
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(desired.metadata.labels.unwrap_or_default());
        metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(desired.metadata.annotations.unwrap_or_default());
        updated.data = desired.data;
        updated.string_data = None;
        cluster.replace_secret(&target.namespace, &updated).await?;
    }
    info!("♻️  Updated destination secret {}", target);
    observability::metrics::increment_secrets_updated();
    status.events.push(sync_event(
        SyncEventType::Update,
        vault_modified,
        format!("updated secret {target}"),
    ));

    let report = evict_dependents(cluster, &target.namespace, &target.name).await;
    if !report.evicted.is_empty() || !report.failed.is_empty() {
        info!(
            "Evicted {} pod(s) depending on {} ({} failed)",
            report.evicted.len(),
            target,
            report.failed.len()
        );
    }
    Ok(())
}
