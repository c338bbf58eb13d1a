//! Vault Secret Controller Library
//!
//! Kubernetes controller that mirrors 1Password Connect item sections into Kubernetes
//! Secrets, one per declared destination namespace, and restarts the pods that consume them
//! when the content changes.
//!
//! ## Quick Start
//!
//! ```rust
//! use vault_secret_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
