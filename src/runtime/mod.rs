//! # Runtime
//!
//! Process wiring around the reconciler.
//!
//! - `initialization`: tracing, metrics, HTTP server and client setup
//! - `watch_loop`: the `kube_runtime::Controller` loop with restart handling
//! - `error_policy`: per-resource error backoff and watch error classification

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
