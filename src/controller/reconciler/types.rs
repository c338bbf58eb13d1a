//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::cluster::{ClusterError, ClusterStore};
use crate::controller::reconciler::materialize::MaterializeError;
use crate::controller::reconciler::requeue::RequeueScheduler;
use crate::provider::{VaultError, VaultProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// Vault lookup failed for a reason other than not-found
    #[error("vault lookup for {location} failed: {source}")]
    Vault {
        location: String,
        #[source]
        source: VaultError,
    },
    /// Kubernetes API call failed
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    /// The VaultSecret cannot be materialized as declared
    #[error("VaultSecret {resource} is misconfigured: {source}")]
    Configuration {
        resource: String,
        #[source]
        source: MaterializeError,
    },
    /// Some destination secrets could not be deleted; the finalizer stays in place
    #[error("cleanup of VaultSecret {resource} left {failed} destination secret(s) behind")]
    CleanupIncomplete { resource: String, failed: usize },
    #[error("VaultSecret has no metadata.{0}")]
    MissingObjectKey(&'static str),
}

/// Trigger source for reconciliation
/// Tracks why the next pass was scheduled for debugging and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Periodic refresh (`refreshSeconds` or the controller minimum)
    TimerBased,
    /// Retry after a failed pass (Fibonacci backoff)
    ErrorBackoff,
    /// Finalizer was just attached; the resulting watch event runs the first sync
    FinalizerAttached,
}

impl TriggerSource {
    /// Get human-readable string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::TimerBased => "timer-based",
            TriggerSource::ErrorBackoff => "error-backoff",
            TriggerSource::FinalizerAttached => "finalizer-attached",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared reconciliation context
///
/// Both external systems are reached through trait objects so passes can run against
/// in-memory doubles.
#[derive(Clone)]
pub struct Reconciler {
    pub cluster: Arc<dyn ClusterStore>,
    pub vault: Arc<dyn VaultProvider>,
    pub scheduler: RequeueScheduler,
    // Backoff state per resource (identified by namespace/name)
    // Owned by the error policy; reset here after a successful pass
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("scheduler", &self.scheduler)
            .field("backoff_min_secs", &self.backoff_min_secs)
            .field("backoff_max_secs", &self.backoff_max_secs)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        cluster: Arc<dyn ClusterStore>,
        vault: Arc<dyn VaultProvider>,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            cluster,
            vault,
            scheduler: RequeueScheduler::new(config.min_refresh_interval_secs),
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
            backoff_min_secs: config.backoff_min_secs,
            backoff_max_secs: config.backoff_max_secs,
        }
    }

    /// Record a failure for `resource_key` and return (backoff seconds, error count)
    pub fn next_error_backoff(&self, resource_key: &str) -> Option<(u64, u32)> {
        let mut states = self.backoff_states.lock().ok()?;
        let state = states
            .entry(resource_key.to_string())
            .or_insert_with(|| BackoffState::new(self.backoff_min_secs, self.backoff_max_secs));
        state.increment_error();
        Some((state.backoff.next_backoff_seconds(), state.error_count))
    }

    /// Clear the error backoff for `resource_key`; returns whether it had failed before
    pub fn reset_backoff(&self, resource_key: &str) -> bool {
        let Ok(mut states) = self.backoff_states.lock() else {
            return false;
        };
        states.get_mut(resource_key).is_some_and(|state| {
            let had_errors = state.error_count > 0;
            state.reset();
            had_errors
        })
    }
}
