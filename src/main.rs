//! # Vault Secret Controller
//!
//! A Kubernetes controller that syncs 1Password Connect vault items into Kubernetes Secrets.
//!
//! ## Overview
//!
//! For every `VaultSecret` the controller:
//!
//! 1. **Guards cleanup** - Attaches a finalizer so destination secrets are deleted with it
//! 2. **Reads the vault** - Fetches the item section (or a single field) from 1Password Connect
//! 3. **Detects changes** - Compares vault timestamps and declared namespaces with its status
//! 4. **Writes secrets** - Creates or updates an opaque or registry credential secret per namespace
//! 5. **Restarts consumers** - Deletes pods that use a secret whose content changed
//!
//! ## Features
//!
//! - **Multi-namespace**: One `VaultSecret` fans out to any number of namespaces
//! - **Registry credentials**: Builds `.dockerconfigjson` from registry/token/email fields
//! - **Prometheus metrics**: Exposes metrics for monitoring and observability
//! - **Health probes**: HTTP endpoints for liveness and readiness checks

use anyhow::Result;
use vault_secret_controller::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.vault_secrets,
        init.reconciler,
        init.server_state,
        init.controller_config,
    )
    .await
}
