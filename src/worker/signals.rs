//! # Cross-platform OS signal handling.
//!
//! Provides [`wait_for_shutdown_signal`], an async helper that completes
//! when the process receives a termination signal, and
//! [`bind_shutdown_signals`], which turns the first such signal into a
//! `FinishAction` dispatch so the store and worker wind down through the
//! ordinary finish path.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGINT` (Ctrl-C in terminal)
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes)
//! - `SIGQUIT` (quit signal, often used for core dumps or hard stop)
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`]

use crate::error::WorkerError;
use crate::messages::FinishAction;
use crate::store::Store;

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal
/// registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal.
///
/// Each call creates independent signal listeners.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal
/// registration fails.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Schedules a worker task that dispatches `FinishAction` on the first
/// termination signal.
///
/// The dispatch runs the normal finish path: reducers see the action,
/// `FinishEvent` is delivered to subscribers, then the worker stops.
pub fn bind_shutdown_signals(store: &Store) -> Result<(), WorkerError> {
    let store = store.clone();
    store.worker().create_task(async move {
        match wait_for_shutdown_signal().await {
            Ok(()) => {
                tracing::info!("shutdown signal received");
                if let Err(err) = store.dispatch(FinishAction) {
                    tracing::warn!(error = %err, "finish dispatch after signal failed");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "signal listener registration failed");
            }
        }
    })
}
