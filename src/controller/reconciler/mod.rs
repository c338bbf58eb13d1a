//! # Reconciler
//!
//! Core reconciliation logic for `VaultSecret` resources.
//!
//! The reconciler:
//! - Guards every `VaultSecret` with a cleanup finalizer
//! - Reads the referenced 1Password item section
//! - Decides whether the destination secrets are stale
//! - Writes opaque or registry credential secrets into each declared namespace
//! - Deletes pods that consume a secret whose content changed
//! - Records sync events and the tracked destination set in status
//!
//! ## Module Structure
//!
//! - `change` - Change detection and sync timestamp bookkeeping
//! - `eviction` - Dependent pod eviction
//! - `finalizer` - Finalizer attach, cleanup and detach
//! - `materialize` - Payload synthesis for each secret kind
//! - `reconcile` - The reconciliation pass
//! - `requeue` - Requeue delay
//! - `status` - Status writes and sync events
//! - `types` - Shared context and error types

pub mod change;
pub mod eviction;
pub mod finalizer;
pub mod materialize;
pub mod reconcile;
pub mod requeue;
pub mod status;
pub mod types;

// Re-export public API
pub use reconcile::{reconcile, reconcile_pass, PassOutcome};
pub use requeue::RequeueScheduler;
pub use types::{BackoffState, Reconciler, ReconcilerError, TriggerSource};
