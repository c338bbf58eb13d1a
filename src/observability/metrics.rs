//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `vault_secret_reconciliations_total` - Total number of reconciliation passes
//! - `vault_secret_reconciliation_errors_total` - Total number of failed passes
//! - `vault_secret_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `vault_secret_secrets_created_total` - Destination secrets created
//! - `vault_secret_secrets_updated_total` - Destination secrets updated
//! - `vault_secret_secrets_deleted_total` - Destination secrets deleted (shrink and finalization)
//! - `vault_secret_pods_evicted_total` - Dependent pods deleted after a secret update
//! - `vault_secret_pod_eviction_errors_total` - Dependent pod deletions that failed
//! - `vault_secret_vault_requests_total{operation}` - Requests sent to the vault
//! - `vault_secret_vault_request_errors_total{operation}` - Failed vault requests
//! - `vault_secret_vault_request_duration_seconds{operation}` - Vault request latency
//! - `vault_secret_requeues_total{trigger}` - Requeues by trigger source

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vault_secret_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vault_secret_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "vault_secret_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static SECRETS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vault_secret_secrets_created_total",
        "Total number of destination secrets created",
    )
    .expect("Failed to create SECRETS_CREATED_TOTAL metric - this should never happen")
});

static SECRETS_UPDATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vault_secret_secrets_updated_total",
        "Total number of destination secrets updated from the vault",
    )
    .expect("Failed to create SECRETS_UPDATED_TOTAL metric - this should never happen")
});

static SECRETS_DELETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vault_secret_secrets_deleted_total",
        "Total number of destination secrets deleted",
    )
    .expect("Failed to create SECRETS_DELETED_TOTAL metric - this should never happen")
});

static PODS_EVICTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vault_secret_pods_evicted_total",
        "Total number of dependent pods deleted after a secret update",
    )
    .expect("Failed to create PODS_EVICTED_TOTAL metric - this should never happen")
});

static POD_EVICTION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "vault_secret_pod_eviction_errors_total",
        "Total number of dependent pod deletions that failed",
    )
    .expect("Failed to create POD_EVICTION_ERRORS_TOTAL metric - this should never happen")
});

static VAULT_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_secret_vault_requests_total",
            "Total number of requests sent to the vault by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create VAULT_REQUESTS_TOTAL metric - this should never happen")
});

static VAULT_REQUEST_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_secret_vault_request_errors_total",
            "Total number of failed vault requests by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create VAULT_REQUEST_ERRORS_TOTAL metric - this should never happen")
});

static VAULT_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "vault_secret_vault_request_duration_seconds",
            "Duration of vault requests in seconds by operation",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["operation"],
    )
    .expect("Failed to create VAULT_REQUEST_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "vault_secret_requeues_total",
            "Total number of requeues by trigger source",
        ),
        &["trigger"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(SECRETS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_UPDATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PODS_EVICTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(POD_EVICTION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_REQUEST_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(VAULT_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_secrets_created() {
    SECRETS_CREATED_TOTAL.inc();
}

pub fn increment_secrets_updated() {
    SECRETS_UPDATED_TOTAL.inc();
}

pub fn increment_secrets_deleted() {
    SECRETS_DELETED_TOTAL.inc();
}

pub fn increment_pods_evicted(count: u64) {
    PODS_EVICTED_TOTAL.inc_by(count);
}

pub fn increment_pod_eviction_errors(count: u64) {
    POD_EVICTION_ERRORS_TOTAL.inc_by(count);
}

pub fn increment_vault_requests(operation: &str) {
    VAULT_REQUESTS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_vault_errors(operation: &str) {
    VAULT_REQUEST_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn observe_vault_request_duration(operation: &str, duration: f64) {
    VAULT_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_requeues_total(trigger: &str) {
    REQUEUES_TOTAL.with_label_values(&[trigger]).inc();
}

/// Gather everything registered with the controller registry
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    REGISTRY.gather()
}
