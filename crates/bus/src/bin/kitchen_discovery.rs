// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kitchen-discovery`: the well-known node-bus directory every agent
//! registers with and queries (spec §4.1, §6).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use kitchen_bus::discovery::{DiscoveryRegistry, DiscoveryService, DEFAULT_LEASE_SECONDS};
use kitchen_bus::install_signal_handlers;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// `kitchen-discovery`: in-memory registration directory every agent dials
/// first.
#[derive(Debug, Parser)]
#[command(name = "kitchen-discovery", version, about)]
struct DiscoveryConfig {
    /// Address this directory's gRPC server listens on.
    #[arg(long, env = "KITCHEN_DISCOVERY_LISTEN", default_value = "127.0.0.1:4840")]
    listen_addr: String,

    /// Registration lease duration, in seconds (spec §4.1: T_RENEW).
    #[arg(long, env = "KITCHEN_LEASE_SECONDS", default_value_t = DEFAULT_LEASE_SECONDS)]
    lease_seconds: u32,

    /// Log level passed to the tracing env-filter.
    #[arg(long, env = "KITCHEN_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = DiscoveryConfig::parse();
    kitchen_bus::logging::init_tracing(&config.log_level);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    let local_addr = listener.local_addr()?;

    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone());

    let registry = Arc::new(DiscoveryRegistry::new(Duration::from_secs(config.lease_seconds as u64)));
    let sweeper_registry = Arc::clone(&registry);
    let sweeper_shutdown = shutdown.clone();
    let sweeper_handle =
        tokio::spawn(async move { sweeper_registry.run_lease_sweeper(sweeper_shutdown).await });

    let service = DiscoveryService::new(registry);
    let serve_shutdown = shutdown.clone();
    info!(%local_addr, "discovery directory listening");
    let serve = service.into_router().serve_with_incoming_shutdown(
        tokio_stream::wrappers::TcpListenerStream::new(listener),
        async move { serve_shutdown.cancelled().await },
    );

    if let Err(e) = serve.await {
        warn!(err = %e, "discovery directory server exited with error");
    }

    shutdown.cancel();
    let _ = sweeper_handle.await;
    Ok(())
}
