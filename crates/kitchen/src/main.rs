// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kitchen_bus::discovery::RegistrationConfig;
use kitchen_bus::{install_signal_handlers, AttrValue, AttributeTable};
use kitchen_domain::{ActionRegistry, KitchenCounters, RecipeCatalog};
use kitchen_kitchen::config::KitchenConfig;
use kitchen_kitchen::gate::AdmissionGate;
use kitchen_kitchen::robots::RobotMembership;
use kitchen_kitchen::service::KitchenService;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = KitchenConfig::parse();
    kitchen_bus::logging::init_tracing(&config.log_level);

    let registry = Arc::new(
        ActionRegistry::from_json(
            &std::fs::read_to_string(config.actions_path())
                .with_context(|| format!("reading {}", config.actions_path().display()))?,
        )
        .context("parsing action catalog")?,
    );
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

    let counters = Arc::new(KitchenCounters::new());
    let attrs = Arc::new(AttributeTable::new());
    attrs.seed("received_orders", AttrValue::U32(0)).await;
    attrs.seed("assigned_orders", AttrValue::U32(0)).await;
    attrs.seed("dropped_orders", AttrValue::U32(0)).await;
    attrs.seed("completed_orders", AttrValue::U32(0)).await;

    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone());

    let robots = RobotMembership::new(config.robot_count, &config.discovery_endpoint);
    let rediscovery_shutdown = shutdown.clone();
    let rediscovery_handle = tokio::spawn(RobotMembership::run_rediscovery(
        Arc::clone(&robots),
        config.discovery_endpoint.clone(),
        config.t_discover(),
        rediscovery_shutdown,
    ));

    let gate = AdmissionGate::spawn(
        Arc::clone(&robots.controller),
        self_endpoint.clone(),
        config.placing_rate(),
        shutdown.clone(),
    );

    let registration = RegistrationConfig {
        discovery_endpoint: config.discovery_endpoint.clone(),
        server_id: format!("kitchen-{}", Uuid::new_v4()),
        endpoint: self_endpoint.clone(),
        object_types: vec!["Kitchen".into()],
    };
    let registration_shutdown = shutdown.clone();
    let registration_handle =
        tokio::spawn(kitchen_bus::discovery::run(registration, registration_shutdown));

    let service = KitchenService::new(counters, recipes, robots, gate, attrs);
    let serve_shutdown = shutdown.clone();
    info!(%local_addr, robot_count = config.robot_count, "kitchen listening");
    let serve = service.into_router().serve_with_incoming_shutdown(
        tokio_stream::wrappers::TcpListenerStream::new(listener),
        async move { serve_shutdown.cancelled().await },
    );

    if let Err(e) = serve.await {
        warn!(err = %e, "kitchen server exited with error");
    }

    shutdown.cancel();
    let _ = rediscovery_handle.await;
    let _ = registration_handle.await;
    Ok(())
}
