//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, the 1Password Connect client and Kubernetes client setup.

use crate::config::{load_config, ControllerConfig, ServerConfig, VaultConfig};
use crate::controller::cluster::KubeClusterStore;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::VaultSecret;
use crate::observability;
use crate::provider::OnePasswordConnect;
use anyhow::{Context, Result};
use kube::{api::Api, Client};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// API for the VaultSecret CRD across all namespaces
    pub vault_secrets: Api<VaultSecret>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub controller_config: ControllerConfig,
    pub server_config: ServerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self.server_state.is_ready.load(Ordering::Relaxed),
            )
            .field("controller_config", &self.controller_config)
            .field("server_config", &self.server_config)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - 1Password Connect client creation
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything opens a TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let (controller_config, server_config) = load_config();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| controller_config.default_log_filter().into()),
        )
        .init();

    info!("Starting Vault Secret Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        "Minimum refresh interval: {}s, error backoff: {}s..{}s",
        controller_config.min_refresh_interval_secs,
        controller_config.backoff_min_secs,
        controller_config.backoff_max_secs
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());

    // Start HTTP server for metrics and probes
    // Readiness must pass before reconciling starts
    let server_port = server_config.metrics_port;
    let server_state_clone = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let vault_config = VaultConfig::from_env().context("Failed to load vault configuration")?;
    info!("Using 1Password Connect at {}", vault_config.url);
    let vault = OnePasswordConnect::new(&vault_config)
        .context("Failed to create 1Password Connect client")?;

    let client = Client::try_default().await?;

    // Watch all namespaces
    let vault_secrets: Api<VaultSecret> = Api::all(client.clone());

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeClusterStore::new(client.clone())),
        Arc::new(vault),
        &controller_config,
    ));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        vault_secrets,
        reconciler,
        server_state,
        controller_config,
        server_config,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let poll_interval = server_config.poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        // Set by start_server once bound
        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}
