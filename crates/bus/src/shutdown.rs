// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `SIGINT`/`SIGTERM` handling shared by every agent binary (spec §6:
//! "Signal handling: SIGINT/SIGTERM invoke the agent's stop(), which is
//! idempotent").

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Spawn a task that cancels `shutdown` on the first `SIGINT`/`SIGTERM`, and
/// force-exits the process on a second one.
pub fn install_signal_handlers(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async { if let Some(s) = sigterm.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGTERM");
            }
            _ = async { if let Some(s) = sigint.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGINT");
            }
        }
        shutdown.cancel();

        tokio::select! {
            _ = async { if let Some(s) = sigterm.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGTERM again, forcing exit");
            }
            _ = async { if let Some(s) = sigint.as_mut() { s.recv().await } else { std::future::pending().await } } => {
                info!("received SIGINT again, forcing exit");
            }
        }
        std::process::exit(130);
    });
}
