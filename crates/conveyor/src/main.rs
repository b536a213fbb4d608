// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kitchen_bus::discovery::{PeerLocator, RegistrationConfig};
use kitchen_bus::install_signal_handlers;
use kitchen_conveyor::config::ConveyorConfig;
use kitchen_conveyor::robots::RobotDirectory;
use kitchen_conveyor::service::ConveyorService;
use kitchen_conveyor::worker::{ConveyorWorker, WorkerCommand, WorkerDeps};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConveyorConfig::parse();
    kitchen_bus::logging::init_tracing(&config.log_level);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    let local_addr = listener.local_addr()?;
    let self_endpoint = format!("http://{local_addr}");

    let shutdown = CancellationToken::new();
    install_signal_handlers(shutdown.clone());

    let robots = RobotDirectory::new();
    let robots_shutdown = shutdown.clone();
    let robots_handle = tokio::spawn(RobotDirectory::run_discovery(
        Arc::clone(&robots),
        config.discovery_endpoint.clone(),
        config.t_discover(),
        robots_shutdown,
    ));

    let kitchen = Arc::new(PeerLocator::new(config.discovery_endpoint.clone(), "Kitchen"));
    let controller = Arc::new(PeerLocator::new(config.discovery_endpoint.clone(), "Controller"));

    let (tx, rx) = mpsc::channel::<WorkerCommand>(64);
    let worker = ConveyorWorker::new(WorkerDeps {
        ring_size: config.ring_size(),
        robots,
        kitchen,
        controller,
        self_endpoint: self_endpoint.clone(),
        time_unit: config.time_unit(),
    });
    let worker_shutdown = shutdown.clone();
    let worker_handle = tokio::spawn(worker.run(rx, worker_shutdown));

    let registration = RegistrationConfig {
        discovery_endpoint: config.discovery_endpoint.clone(),
        server_id: format!("conveyor-{}", Uuid::new_v4()),
        endpoint: self_endpoint.clone(),
        object_types: vec!["Conveyor".into()],
    };
    let registration_shutdown = shutdown.clone();
    let registration_handle =
        tokio::spawn(kitchen_bus::discovery::run(registration, registration_shutdown));

    let service = ConveyorService::new(tx);
    let serve_shutdown = shutdown.clone();
    info!(%local_addr, robot_count = config.robot_count, "conveyor listening");
    let serve = service.into_router().serve_with_incoming_shutdown(
        tokio_stream::wrappers::TcpListenerStream::new(listener),
        async move { serve_shutdown.cancelled().await },
    );

    if let Err(e) = serve.await {
        warn!(err = %e, "conveyor server exited with error");
    }

    shutdown.cancel();
    let _ = worker_handle.await;
    let _ = robots_handle.await;
    let _ = registration_handle.await;
    Ok(())
}
