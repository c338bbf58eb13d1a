//! # Watch Loop
//!
//! Controller watch loop that monitors `VaultSecret` resources and triggers
//! reconciliation when changes are detected.
//!
//! `kube_runtime::Controller` never runs two passes for the same object at once, which the
//! reconciler relies on: a pass owns the object's status and destination secrets while it runs.

use crate::config::ControllerConfig;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::VaultSecret;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{watcher, Controller};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Run the controller watch loop
///
/// Restarts the controller stream when it ends or fails, until a shutdown signal clears
/// the readiness flag.
pub async fn run_watch_loop(
    vault_secrets: Api<VaultSecret>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: ControllerConfig,
) -> Result<(), anyhow::Error> {
    info!("Starting controller watch loop...");

    let backoff_duration_ms = Arc::new(AtomicU64::new(config.watch_backoff_start_ms));

    spawn_shutdown_handler(Arc::clone(&server_state), shutdown_signal());

    let backoff_start_ms = config.watch_backoff_start_ms;
    let backoff_max_ms = config.watch_backoff_max_ms;
    let restart_delay_secs = config.watch_restart_delay_secs;

    let runs = supervise_watch(
        &server_state.is_ready,
        config.watch_restart_delay_after_end_duration(),
        || {
            let backoff = Arc::clone(&backoff_duration_ms);
            Controller::new(
                vault_secrets.clone(),
                watcher::Config::default().any_semantic(),
            )
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .filter_map(move |event| {
                let backoff = Arc::clone(&backoff);
                async move {
                    match &event {
                        Ok((object, action)) => {
                            backoff.store(backoff_start_ms, Ordering::Relaxed);
                            debug!(
                                resource.name = object.name.as_str(),
                                resource.namespace = object.namespace.as_deref().unwrap_or_default(),
                                action = ?action,
                                "watch.event.reconciled"
                            );
                            Some(event)
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                backoff_max_ms,
                                restart_delay_secs,
                            )
                            .await
                            .map(|()| event)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
        },
    )
    .await;

    info!("Controller stopped gracefully after {} watch run(s)", runs);
    Ok(())
}

/// Restart `run_once` whenever it returns, until `is_ready` is cleared
///
/// The flag is checked before every run and again after the restart delay, so a signal
/// that lands while the stream is winding down never starts another controller.
/// Returns the number of runs.
pub async fn supervise_watch<F, Fut>(
    is_ready: &AtomicBool,
    restart_delay: Duration,
    mut run_once: F,
) -> usize
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut runs = 0;
    loop {
        if !is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        run_once().await;
        runs += 1;

        if !is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }
    runs
}

/// Clear the readiness flag once `signal` resolves
pub fn spawn_shutdown_handler<S>(server_state: Arc<ServerState>, signal: S) -> JoinHandle<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;
        server_state.is_ready.store(false, Ordering::Relaxed);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    })
}

/// Resolves on SIGINT or SIGTERM
///
/// A handler that cannot be installed is logged and never fires; the other one still does.
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install SIGINT handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("Received SIGINT, initiating graceful shutdown..."),
        () = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn ready_state() -> Arc<ServerState> {
        let state = Arc::new(ServerState::new());
        state.is_ready.store(true, Ordering::Relaxed);
        state
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_during_run_stops_without_restart() {
        let state = ready_state();

        let runs = supervise_watch(&state.is_ready, Duration::from_secs(1), || {
            let state = Arc::clone(&state);
            async move {
                state.is_ready.store(false, Ordering::Relaxed);
            }
        })
        .await;

        assert_eq!(runs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_during_restart_delay_stops_without_restart() {
        let state = ready_state();

        let runs = supervise_watch(&state.is_ready, Duration::from_secs(1), || {
            let state = Arc::clone(&state);
            async move {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    state.is_ready.store(false, Ordering::Relaxed);
                });
            }
        })
        .await;

        assert_eq!(runs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_stream_restarts_until_shutdown() {
        let state = ready_state();
        let calls = AtomicUsize::new(0);

        let runs = supervise_watch(&state.is_ready, Duration::from_secs(1), || {
            let n = calls.fetch_add(1, Ordering::Relaxed) + 1;
            let state = Arc::clone(&state);
            async move {
                if n == 3 {
                    state.is_ready.store(false, Ordering::Relaxed);
                }
            }
        })
        .await;

        assert_eq!(runs, 3);
    }

    #[tokio::test]
    async fn test_shutdown_handler_clears_readiness() {
        let state = ready_state();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = spawn_shutdown_handler(Arc::clone(&state), async move {
            let _ = rx.await;
        });
        assert!(state.is_ready.load(Ordering::Relaxed));

        tx.send(()).expect("handler waiting");
        handle.await.expect("handler task");

        assert!(!state.is_ready.load(Ordering::Relaxed));
    }
}
