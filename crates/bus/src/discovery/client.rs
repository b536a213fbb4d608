// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery registration client.
//!
//! Every agent registers its own endpoint with the discovery directory on
//! startup, then re-registers periodically as a heartbeat so the directory
//! can prune agents that silently disappeared. Modeled on the renewal loop
//! used for broker registration: bounded-retry initial registration, then a
//! steady heartbeat, with a best-effort deregistration on shutdown.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tracing::{debug, error, info, warn};

use crate::error::BusError;
use crate::proto::{self, discovery_client::DiscoveryClient as RawDiscoveryClient};

/// Default interval between discovery scans of the directory (spec §4.1:
/// T_DISCOVER).
pub const DEFAULT_T_DISCOVER: Duration = Duration::from_secs(1);

/// Default renewal heartbeat interval (spec §4.1: T_RENEW).
pub const DEFAULT_T_RENEW: Duration = Duration::from_secs(50 * 60);

/// Configuration for registering this agent with the discovery directory.
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    pub discovery_endpoint: String,
    pub server_id: String,
    pub endpoint: String,
    pub object_types: Vec<String>,
}

/// Connect to the discovery directory, retrying with backoff.
pub async fn connect(discovery_endpoint: &str) -> Result<RawDiscoveryClient<Channel>, BusError> {
    let channel = Channel::from_shared(discovery_endpoint.to_owned())
        .map_err(|e| BusError::BadArgs(e.to_string()))?
        .connect()
        .await?;
    Ok(RawDiscoveryClient::new(channel))
}

/// Run the registration heartbeat loop until `shutdown` fires. Registers
/// immediately (retrying up to 5 times with exponential backoff), then
/// re-registers every `T_RENEW`; deregisters on shutdown.
pub async fn run(config: RegistrationConfig, shutdown: CancellationToken) {
    let mut client = match connect(&config.discovery_endpoint).await {
        Ok(c) => Some(c),
        Err(e) => {
            warn!(err = %e, "discovery: initial connect failed, will retry on next tick");
            None
        }
    };

    let mut registered = false;
    for attempt in 1..=5u32 {
        if client.is_none() {
            client = connect(&config.discovery_endpoint).await.ok();
        }
        if let Some(c) = client.as_mut() {
            match register_once(c, &config).await {
                Ok(()) => {
                    registered = true;
                    break;
                }
                Err(e) => warn!(attempt, err = %e, "discovery registration failed"),
            }
        }
        let delay = Duration::from_millis(200u64 * 2u64.pow(attempt.min(6)));
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.cancelled() => return,
        }
    }

    if !registered {
        error!(endpoint = %config.discovery_endpoint, "giving up on discovery registration after retries");
        return;
    }

    loop {
        tokio::select! {
            _ = tokio::time::sleep(DEFAULT_T_RENEW) => {}
            _ = shutdown.cancelled() => break,
        }
        if client.is_none() {
            client = connect(&config.discovery_endpoint).await.ok();
        }
        if let Some(c) = client.as_mut() {
            if let Err(e) = register_once(c, &config).await {
                debug!(err = %e, "discovery heartbeat re-registration failed");
                client = None;
            }
        }
    }

    if let Some(c) = client.as_mut() {
        let _ = c
            .deregister(proto::DeregisterRequest { server_id: config.server_id.clone() })
            .await;
        info!(server_id = %config.server_id, "deregistered from discovery directory");
    }
}

async fn register_once(
    client: &mut RawDiscoveryClient<Channel>,
    config: &RegistrationConfig,
) -> Result<(), BusError> {
    let server = proto::ServerDescriptor {
        server_id: config.server_id.clone(),
        endpoint: config.endpoint.clone(),
        object_types: config.object_types.clone(),
        tags: Default::default(),
    };
    client
        .register(proto::RegisterRequest { server: Some(server) })
        .await
        .map_err(BusError::from)?;
    Ok(())
}

/// One-shot lookup of live servers hosting the given object type.
pub async fn find_servers(
    client: &mut RawDiscoveryClient<Channel>,
    object_type: Option<&str>,
) -> Result<Vec<proto::ServerDescriptor>, BusError> {
    let resp = client
        .find_servers(proto::FindServersRequest { object_type: object_type.map(str::to_owned) })
        .await
        .map_err(BusError::from)?;
    Ok(resp.into_inner().servers)
}
