//! # Change Detection
//!
//! Decides whether a pass has to write anything. A pass resynchronizes when the vault moved
//! past the recorded sync time, when the tracked secrets do not match the declared
//! destinations, or when the spec was edited since the last sync.

use crate::crd::SecretRef;
use chrono::{DateTime, Utc};

/// Everything the detector looks at, borrowed from the object and the vault lookup
#[derive(Debug, Clone, Copy)]
pub struct ChangeInput<'a> {
    /// `status.lastSynced` as stored (RFC3339)
    pub last_synced: Option<&'a str>,
    /// Newest vault-side timestamp among the section and the mapped fields
    pub vault_modified: Option<DateTime<Utc>>,
    pub secret_name: &'a str,
    pub declared_namespaces: &'a [String],
    pub tracked: &'a [SecretRef],
    pub generation: Option<i64>,
    pub observed_generation: Option<i64>,
}

/// Why a resync is needed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncReason {
    /// Never synchronized, or the stored timestamp cannot be read
    NeverSynced,
    /// A declared namespace has no tracked secret yet
    MissingDestination(String),
    /// The vault reports a change after the last sync
    VaultChanged(DateTime<Utc>),
    /// A tracked secret is no longer declared
    StaleDestination(SecretRef),
    /// The spec generation moved since the last sync
    SpecChanged(i64),
}

impl std::fmt::Display for SyncReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncReason::NeverSynced => write!(f, "never synchronized"),
            SyncReason::MissingDestination(ns) => write!(f, "no secret tracked in namespace {ns}"),
            SyncReason::VaultChanged(ts) => write!(f, "vault changed at {}", ts.to_rfc3339()),
            SyncReason::StaleDestination(secret) => {
                write!(f, "{secret} is no longer declared")
            }
            SyncReason::SpecChanged(generation) => write!(f, "spec generation {generation}"),
        }
    }
}

/// Parse a stored RFC3339 timestamp
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Return the first reason a resync is required, or `None` for a no-op pass
#[must_use]
pub fn detect_change(input: &ChangeInput<'_>) -> Option<SyncReason> {
    if let Some(namespace) = input.declared_namespaces.iter().find(|ns| {
        !input
            .tracked
            .iter()
            .any(|t| t.name == input.secret_name && &t.namespace == *ns)
    }) {
        return Some(SyncReason::MissingDestination(namespace.clone()));
    }

    if let Some(stale) = input
        .tracked
        .iter()
        .find(|t| t.name != input.secret_name || !input.declared_namespaces.contains(&t.namespace))
    {
        return Some(SyncReason::StaleDestination(stale.clone()));
    }

    let Some(last_synced) = input.last_synced.and_then(parse_timestamp) else {
        return Some(SyncReason::NeverSynced);
    };

    if let Some(modified) = input.vault_modified.filter(|m| *m > last_synced) {
        return Some(SyncReason::VaultChanged(modified));
    }

    match input.generation {
        Some(generation) if input.observed_generation != Some(generation) => {
            Some(SyncReason::SpecChanged(generation))
        }
        _ => None,
    }
}

/// Next value of `lastSynced`: never earlier than the stored one or the vault change it covers
#[must_use]
pub fn advance_last_synced(
    previous: Option<&str>,
    now: DateTime<Utc>,
    vault_modified: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    previous
        .and_then(parse_timestamp)
        .into_iter()
        .chain(vault_modified)
        .fold(now, |latest, ts| latest.max(ts))
}
