//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError, TriggerSource};
use crate::crd::VaultSecret;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Kind of watch stream failure, derived from the rendered error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// 404: the CRD or a watched object is missing
    NotFound,
    /// 401: credentials revoked or expired
    Unauthorized,
    /// 410: resource version too old
    Expired,
    /// 429: API server storage (re)initializing
    Throttled,
    Other,
}

/// Classify a watch stream error
///
/// 404 is checked before 401: a plain-text 404 body surfaces as a decode error whose chain
/// also mentions the failed watch.
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorKind {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    if is_not_found {
        return WatchErrorKind::NotFound;
    }
    if error_string.contains("401") || error_string.contains("Unauthorized") {
        return WatchErrorKind::Unauthorized;
    }
    if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        return WatchErrorKind::Expired;
    }
    if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        return WatchErrorKind::Throttled;
    }
    WatchErrorKind::Other
}

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing `VaultSecret` does not slow down
/// the others.
pub fn handle_reconciliation_error(
    obj: Arc<VaultSecret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {:?}", namespace, name, error);

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) =
        ctx.next_error_backoff(&resource_key).unwrap_or_else(|| {
            warn!(
                "Failed to lock backoff state for {}, using minimum backoff",
                resource_key
            );
            (ctx.backoff_min_secs, 0)
        });

    let trigger = TriggerSource::ErrorBackoff.as_str();
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));

    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: {})",
        backoff_seconds, error_count, trigger
    );
    info!(
        "📅 Next retry scheduled: {} (in {}s, trigger source: {})",
        next_trigger_time.to_rfc3339(),
        backoff_seconds,
        trigger
    );

    observability::metrics::increment_requeues_total(trigger);
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Handle watch stream errors with appropriate classification and backoff
///
/// Returns `None` to filter out the error (allow restart) or `Some(())` to continue.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    match classify_watch_error(error_string) {
        WatchErrorKind::Unauthorized => {
            error!(
                "❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
            );
            error!("🔍 SRE Diagnostics:");
            error!("   1. Verify the ClusterRole still grants access to vaultsecrets, secrets and pods:");
            error!("      kubectl get clusterrole vault-secret-controller -o yaml");
            error!("   2. Verify the ServiceAccount can list VaultSecrets:");
            error!(
                "      kubectl auth can-i list vaultsecrets --as=system:serviceaccount:octopilot-system:vault-secret-controller --all-namespaces"
            );
            error!("   3. If RBAC was recently changed, restart the controller pod");
            warn!(
                "⏳ Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                watch_restart_delay_secs
            );
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
        WatchErrorKind::Expired => {
            warn!(
                "Watch resource version expired (410) - this is normal during pod restarts, watch will restart"
            );
            None
        }
        WatchErrorKind::Throttled => {
            let current_backoff = backoff.load(Ordering::Relaxed);
            warn!(
                "API server storage reinitializing (429), backing off for {}ms before restart...",
                current_backoff
            );
            tokio::time::sleep(Duration::from_millis(current_backoff)).await;
            backoff.store(
                current_backoff.saturating_mul(2).min(max_backoff_ms),
                Ordering::Relaxed,
            );
            None
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Resource not found (404) - normal if a VaultSecret was deleted, otherwise check that the CRD is installed. Error: {}",
                error_string
            );
            Some(())
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
    }
}
