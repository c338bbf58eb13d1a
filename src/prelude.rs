//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use vault_secret_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (VaultSecret, SecretKind, etc.)
//! - The vault provider trait and its 1Password Connect implementation
//! - The cluster store trait
//! - Reconciler types (Reconciler, ReconcilerError, etc.)
//! - Config types (ControllerConfig, ServerConfig, VaultConfig)

// CRD types - most commonly used
pub use crate::crd::*;

// Provider trait and model
pub use crate::provider::{
    Field, FileRef, Item, OnePasswordConnect, Section, VaultError, VaultProvider,
};

// Cluster access
pub use crate::controller::cluster::{ClusterError, ClusterStore, KubeClusterStore};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, reconcile_pass, BackoffState, PassOutcome, Reconciler, ReconcilerError,
    RequeueScheduler, TriggerSource,
};

// Config types - for configuration management
pub use crate::config::{ControllerConfig, ServerConfig, VaultConfig};
