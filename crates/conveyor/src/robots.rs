// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Position-keyed robot channel directory (spec §9: "registry per agent
//! mapping position → session"). The Conveyor addresses robots by position,
//! not by object identity, so it keeps its own map refreshed by a background
//! discovery scan rather than the single-peer [`kitchen_bus::discovery::PeerLocator`]
//! used for its 1:1 relationships to the Kitchen and Controller. A per-robot
//! `position` subscription keeps the map's keys current if a robot's
//! position changes without its endpoint changing (spec §8 scenario 6),
//! mirroring `kitchen::robots::RobotMembership`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kitchen_bus::discovery::{connect, find_servers};
use kitchen_bus::{AttrValue, ReconnectingChannel};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct RobotEntry {
    endpoint: String,
    channel: Arc<ReconnectingChannel>,
}

/// Shared, concurrently-read directory of known robot channels, keyed by
/// ring position.
#[derive(Default)]
pub struct RobotDirectory {
    robots: RwLock<HashMap<u32, RobotEntry>>,
}

impl RobotDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A channel to the robot at `position`, if known.
    pub async fn get(&self, position: u32) -> Option<Arc<ReconnectingChannel>> {
        self.robots.read().await.get(&position).map(|e| Arc::clone(&e.channel))
    }

    async fn is_known_endpoint(&self, endpoint: &str) -> bool {
        self.robots.read().await.values().any(|e| e.endpoint == endpoint)
    }

    /// Insert or replace a known robot endpoint, e.g. one delivered directly
    /// by the Controller's `receive_next_robot` callback. Spawns a
    /// `position` subscription on genuinely new endpoints so later swaps are
    /// still tracked.
    pub async fn insert(self: &Arc<Self>, position: u32, endpoint: String) -> Arc<ReconnectingChannel> {
        {
            let robots = self.robots.read().await;
            if let Some(existing) = robots.get(&position) {
                if existing.endpoint == endpoint {
                    return Arc::clone(&existing.channel);
                }
            }
        }
        let channel = ReconnectingChannel::new(endpoint.clone());
        self.robots
            .write()
            .await
            .insert(position, RobotEntry { endpoint: endpoint.clone(), channel: Arc::clone(&channel) });
        spawn_position_subscription(Arc::clone(self), position, endpoint, Arc::clone(&channel));
        channel
    }

    /// Drop a robot from the directory after a sustained RPC failure.
    pub async fn remove(&self, position: u32) {
        if self.robots.write().await.remove(&position).is_some() {
            warn!(position, "removed dead robot from conveyor directory");
        }
    }

    /// Drop a robot's entry, but only if `position` is still held by
    /// `expected_endpoint`. Used by a position subscription's own failure
    /// path so a stale task can't delete the entry of a robot that has
    /// since re-registered at the same position under a new endpoint.
    async fn remove_if(&self, position: u32, expected_endpoint: &str) {
        let mut robots = self.robots.write().await;
        if robots.get(&position).is_some_and(|e| e.endpoint == expected_endpoint) {
            robots.remove(&position);
            warn!(position, "removed dead robot from conveyor directory");
        }
    }

    /// Swap two positions' entries when a robot's `position` subscription
    /// reports a value different from the one it was tracked under (spec §8
    /// scenario 6). A no-op if `new_position` is already occupied by the
    /// same robot moving there, or if `old_position` is no longer held by
    /// `expected_endpoint` (the subscription's own entry was already
    /// replaced or removed).
    async fn swap_positions(&self, old_position: u32, new_position: u32, expected_endpoint: &str) {
        if old_position == new_position {
            return;
        }
        let mut robots = self.robots.write().await;
        if !robots.get(&old_position).is_some_and(|e| e.endpoint == expected_endpoint) {
            return;
        }
        let moved = robots.remove(&old_position);
        let displaced = robots.remove(&new_position);
        if let Some(entry) = moved {
            info!(old_position, new_position, endpoint = %entry.endpoint, "robot position swap observed");
            robots.insert(new_position, entry);
        }
        if let Some(entry) = displaced {
            robots.insert(old_position, entry);
        }
    }

    /// Run the discovery loop until `shutdown` fires, adding any previously
    /// unknown `Robot` endpoints.
    pub async fn run_discovery(
        self: Arc<Self>,
        discovery_endpoint: String,
        t_discover: Duration,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(t_discover) => {}
                _ = shutdown.cancelled() => {
                    debug!("conveyor robot discovery loop shutting down");
                    return;
                }
            }
            self.scan_once(&discovery_endpoint).await;
        }
    }

    async fn scan_once(self: &Arc<Self>, discovery_endpoint: &str) {
        use crate::proto::robot_client::RobotClient;

        let mut client = match connect(discovery_endpoint).await {
            Ok(c) => c,
            Err(e) => {
                debug!(err = %e, "conveyor discovery scan: connect failed");
                return;
            }
        };
        let servers = match find_servers(&mut client, Some("Robot")).await {
            Ok(s) => s,
            Err(e) => {
                debug!(err = %e, "conveyor discovery scan: find_servers failed");
                return;
            }
        };
        for server in servers {
            if self.is_known_endpoint(&server.endpoint).await {
                continue;
            }
            let channel = ReconnectingChannel::new(server.endpoint.clone());
            let Ok(ch) = channel.channel().await else { continue };
            let Ok(state) =
                RobotClient::new(ch).get_robot_state(crate::proto::GetRobotStateRequest {}).await
            else {
                continue;
            };
            let position = state.into_inner().position;
            let mut robots = self.robots.write().await;
            if robots.contains_key(&position) {
                continue;
            }
            robots.insert(
                position,
                RobotEntry { endpoint: server.endpoint.clone(), channel: Arc::clone(&channel) },
            );
            drop(robots);
            spawn_position_subscription(Arc::clone(self), position, server.endpoint, channel);
        }
    }
}

fn spawn_position_subscription(
    directory: Arc<RobotDirectory>,
    known_position: u32,
    endpoint: String,
    channel: Arc<ReconnectingChannel>,
) {
    tokio::spawn(async move {
        run_position_subscription(directory, known_position, endpoint, channel).await;
    });
}

async fn run_position_subscription(
    directory: Arc<RobotDirectory>,
    mut known_position: u32,
    endpoint: String,
    channel: Arc<ReconnectingChannel>,
) {
    use crate::proto::robot_client::RobotClient;

    let ch = match channel.channel().await {
        Ok(c) => c,
        Err(e) => {
            warn!(err = %e, %endpoint, "conveyor: position subscription connect failed");
            directory.remove_if(known_position, &endpoint).await;
            return;
        }
    };
    let mut client = RobotClient::new(ch);
    let request = crate::proto::SubscribeAttributeRequest { attribute: "position".to_owned() };
    let mut stream = match client.subscribe_attribute(request).await {
        Ok(resp) => resp.into_inner(),
        Err(e) => {
            warn!(err = %e, %endpoint, "conveyor: subscribe_attribute(position) failed");
            directory.remove_if(known_position, &endpoint).await;
            return;
        }
    };

    loop {
        use tokio_stream::StreamExt;
        match stream.next().await {
            Some(Ok(value)) => {
                if let Ok(AttrValue::U32(new_position)) = AttrValue::try_from(value) {
                    if new_position != known_position {
                        directory.swap_positions(known_position, new_position, &endpoint).await;
                        known_position = new_position;
                    }
                }
            }
            Some(Err(e)) => {
                warn!(err = %e, %endpoint, "conveyor: position subscription stream error");
                directory.remove_if(known_position, &endpoint).await;
                return;
            }
            None => {
                debug!(%endpoint, "conveyor: position subscription stream closed");
                directory.remove_if(known_position, &endpoint).await;
                return;
            }
        }
    }
}
