// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kitchen_bus::discovery::{PeerLocator, RegistrationConfig};
use kitchen_bus::{install_signal_handlers, AttrValue, AttributeTable};
use kitchen_domain::{ActionRegistry, CapabilityProfile, RecipeCatalog};
use kitchen_robot::config::RobotConfig;
use kitchen_robot::service::RobotService;
use kitchen_robot::worker::{RobotWorker, WorkerCommand, WorkerDeps};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RobotConfig::parse();
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
    let capabilities = CapabilityProfile::from_json(
        &std::fs::read_to_string(config.capabilities_path())
            .with_context(|| format!("reading {}", config.capabilities_path().display()))?,
        &registry,
    )
    .context("parsing capabilities file")?;

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    let local_addr = listener.local_addr()?;
    let self_endpoint = format!("http://{local_addr}");

    let attrs = Arc::new(AttributeTable::new());
    attrs.seed("position", AttrValue::U32(config.position)).await;
    attrs.seed("recipe_id", AttrValue::U32(0)).await;
    attrs.seed("dish_name", AttrValue::Str("None".into())).await;
    attrs.seed("action_name", AttrValue::Str("None".into())).await;
    attrs.seed("ingredients", AttrValue::Str("None".into())).await;
    attrs.seed("overall_time", AttrValue::U32(0)).await;
    attrs.seed("current_tool", AttrValue::U32(0)).await;
    attrs.seed("last_equipped_tool", AttrValue::U32(0)).await;
    attrs
        .seed("capabilities", AttrValue::StrArray(capabilities.actions().map(str::to_owned).collect()))
        .await;
    attrs.seed("availability", AttrValue::Bool(true)).await;

    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone());

    let conveyor = Arc::new(PeerLocator::new(config.discovery_endpoint.clone(), "Conveyor"));

    let (tx, rx) = mpsc::channel::<WorkerCommand>(64);
    let worker = RobotWorker::new(WorkerDeps {
        position: config.position,
        capabilities,
        registry: Arc::clone(&registry),
        recipes: Arc::clone(&recipes),
        attrs: Arc::clone(&attrs),
        conveyor: Arc::clone(&conveyor),
        self_endpoint: self_endpoint.clone(),
        time_unit: config.time_unit(),
    });
    let worker_shutdown = shutdown.clone();
    let worker_handle = tokio::spawn(worker.run(rx, worker_shutdown));

    let registration = RegistrationConfig {
        discovery_endpoint: config.discovery_endpoint.clone(),
        server_id: format!("robot-{}-{}", config.position, Uuid::new_v4()),
        endpoint: self_endpoint.clone(),
        object_types: vec!["Robot".into()],
    };
    let discovery_shutdown = shutdown.clone();
    let discovery_handle =
        tokio::spawn(kitchen_bus::discovery::run(registration, discovery_shutdown));

    let service = RobotService::new(attrs, tx);
    let serve_shutdown = shutdown.clone();
    info!(%local_addr, position = config.position, "robot listening");
    let serve = service.into_router().serve_with_incoming_shutdown(
        tokio_stream::wrappers::TcpListenerStream::new(listener),
        async move { serve_shutdown.cancelled().await },
    );

    if let Err(e) = serve.await {
        warn!(err = %e, "robot server exited with error");
    }

    shutdown.cancel();
    let _ = worker_handle.await;
    let _ = discovery_handle.await;
    Ok(())
}
