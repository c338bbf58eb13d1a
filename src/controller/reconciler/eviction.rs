//! # Dependent Workload Eviction
//!
//! After a destination secret changes, pods that consume it are deleted so their owning
//! controller recreates them with the new values. Deletion is best-effort per pod.

use crate::controller::cluster::ClusterStore;
use crate::observability;
use k8s_openapi::api::core::v1::{Container, Pod};
use tracing::{info, warn};

/// Outcome of one eviction sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub evicted: Vec<String>,
    /// Pod name and error message for each failed deletion
    pub failed: Vec<(String, String)>,
}

/// Whether `pod` references `secret_name` as a pull secret, env source, or volume
#[must_use]
pub fn pod_references_secret(pod: &Pod, secret_name: &str) -> bool {
    let Some(spec) = pod.spec.as_ref() else {
        return false;
    };

    let pull_secret = spec
        .image_pull_secrets
        .iter()
        .flatten()
        .any(|reference| reference.name == secret_name);

    let volume = spec.volumes.iter().flatten().any(|volume| {
        let direct = volume
            .secret
            .as_ref()
            .and_then(|source| source.secret_name.as_deref())
            == Some(secret_name);
        let projected = volume
            .projected
            .as_ref()
            .and_then(|projected| projected.sources.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|projection| projection.secret.as_ref())
            .any(|secret| secret.name == secret_name);
        direct || projected
    });

    let container = spec
        .containers
        .iter()
        .chain(spec.init_containers.iter().flatten())
        .any(|container| container_references_secret(container, secret_name));

    pull_secret || volume || container
}

fn container_references_secret(container: &Container, secret_name: &str) -> bool {
    let env_from = container
        .env_from
        .iter()
        .flatten()
        .filter_map(|source| source.secret_ref.as_ref())
        .any(|secret| secret.name == secret_name);

    let env = container
        .env
        .iter()
        .flatten()
        .filter_map(|var| var.value_from.as_ref())
        .filter_map(|source| source.secret_key_ref.as_ref())
        .any(|selector| selector.name == secret_name);

    env_from || env
}

/// Delete every running pod in `namespace` that depends on `secret_name`
///
/// Pods already terminating are skipped. A failed listing yields an empty report.
pub async fn evict_dependents(
    cluster: &dyn ClusterStore,
    namespace: &str,
    secret_name: &str,
) -> EvictionReport {
    let mut report = EvictionReport::default();

    let pods = match cluster.list_pods(namespace).await {
        Ok(pods) => pods,
        Err(e) => {
            warn!(
                "Could not list pods in {} to evict dependents of secret {}: {}",
                namespace, secret_name, e
            );
            return report;
        }
    };

    for pod in pods
        .iter()
        .filter(|pod| pod.metadata.deletion_timestamp.is_none())
        .filter(|pod| pod_references_secret(pod, secret_name))
    {
        let Some(pod_name) = pod.metadata.name.as_deref() else {
            continue;
        };
        match cluster.delete_pod(namespace, pod_name).await {
            Ok(_) => {
                info!(
                    "Deleted pod {}/{} to pick up new values of secret {}",
                    namespace, pod_name, secret_name
                );
                report.evicted.push(pod_name.to_string());
            }
            Err(e) => {
                warn!(
                    "Failed to delete pod {}/{} using secret {}: {}",
                    namespace, pod_name, secret_name, e
                );
                report.failed.push((pod_name.to_string(), e.to_string()));
            }
        }
    }

    observability::metrics::increment_pods_evicted(report.evicted.len() as u64);
    observability::metrics::increment_pod_eviction_errors(report.failed.len() as u64);
    report
}
