// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kitchen_bus::discovery::RegistrationConfig;
use kitchen_bus::install_signal_handlers;
use kitchen_controller::config::ControllerConfig;
use kitchen_controller::membership::Membership;
use kitchen_controller::service::ControllerService;
use kitchen_domain::{ActionRegistry, RecipeCatalog};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ControllerConfig::parse();
    kitchen_bus::logging::init_tracing(&config.log_level);

    let registry = ActionRegistry::from_json(
        &std::fs::read_to_string(config.actions_path())
            .with_context(|| format!("reading {}", config.actions_path().display()))?,
    )
    .context("parsing action catalog")?;
    let recipes = Arc::new(
        RecipeCatalog::from_json(
            &std::fs::read_to_string(config.recipes_path())
                .with_context(|| format!("reading {}", config.recipes_path().display()))?,
            &registry,
        )
        .context("parsing recipe catalog")?,
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    let local_addr = listener.local_addr()?;
    let self_endpoint = format!("http://{local_addr}");

    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone());

    let membership = Membership::new();
    let discovery_handle = tokio::spawn(Membership::run_discovery(
        Arc::clone(&membership),
        config.discovery_endpoint.clone(),
        config.t_discover(),
        shutdown.clone(),
    ));

    let registration = RegistrationConfig {
        discovery_endpoint: config.discovery_endpoint.clone(),
        server_id: format!("controller-{}", Uuid::new_v4()),
        endpoint: self_endpoint.clone(),
        object_types: vec!["Controller".into()],
    };
    let registration_shutdown = shutdown.clone();
    let registration_handle =
        tokio::spawn(kitchen_bus::discovery::run(registration, registration_shutdown));

    let service = ControllerService::new(membership, recipes, config.discovery_endpoint.clone());
    let serve_shutdown = shutdown.clone();
    info!(%local_addr, "controller listening");
    let serve = service.into_router().serve_with_incoming_shutdown(
        tokio_stream::wrappers::TcpListenerStream::new(listener),
        async move { serve_shutdown.cancelled().await },
    );

    if let Err(e) = serve.await {
        warn!(err = %e, "controller server exited with error");
    }

    shutdown.cancel();
    let _ = discovery_handle.await;
    let _ = registration_handle.await;
    Ok(())
}
