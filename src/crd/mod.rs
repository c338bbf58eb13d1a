//! # Custom Resource Definitions
//!
//! CRD types for the Vault Secret Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `VaultSecret` specification (vault source and destination secret)
//! - `status.rs` - Status types (sync timestamp, event log, tracked secrets)

mod spec;
mod status;

pub use spec::{KeyMapping, SecretConfig, SecretKind, SourceConfig, VaultSecret, VaultSecretSpec};
pub use status::{SecretRef, SyncEvent, SyncEventType, VaultSecretStatus};
