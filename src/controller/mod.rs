//! # Controller
//!
//! Core controller modules for the Vault Secret Controller.
//!
//! - `backoff`: Fibonacci backoff mechanism for retries
//! - `cluster`: Kubernetes API access used by the reconciler
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod cluster;
pub mod reconciler;
pub mod server;
