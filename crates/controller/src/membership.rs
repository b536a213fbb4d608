// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Robot membership tracking (spec §4.4): a background discovery task keeps
//! `position → remote_robot` current, and dead robots are removed by a
//! two-phase mark/sweep (spec §9) applied between selection rounds rather
//! than from inside a subscription callback, avoiding iterator invalidation
//! while a selection round reads the map.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kitchen_bus::discovery::{connect, find_servers};
use kitchen_bus::{AttrValue, ReconnectingChannel};
use kitchen_domain::RemoteRobotView;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct Tracked {
    view: RemoteRobotView,
    channel: Arc<ReconnectingChannel>,
}

/// Shared robot membership state, populated by [`Membership::run_discovery`]
/// and read by the selection algorithm (spec §4.4).
#[derive(Default)]
pub struct Membership {
    robots: RwLock<HashMap<u32, Tracked>>,
    pending_removal: RwLock<HashMap<u32, String>>,
}

impl Membership {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark a position for removal; the actual removal happens at the next
    /// `sweep()` call, not here (spec §4.4 "Dead robots"). `expected_endpoint`
    /// is checked again at sweep time, so a subscription task that observed
    /// a dead robot at `position` can never sweep away a different robot
    /// that re-registered at the same position in the meantime.
    pub async fn mark_for_removal(&self, position: u32, expected_endpoint: String) {
        self.pending_removal.write().await.insert(position, expected_endpoint);
    }

    /// Apply all pending removals. Called at the start of a selection round
    /// and after each discovery scan.
    pub async fn sweep(&self) {
        let mut pending = self.pending_removal.write().await;
        if pending.is_empty() {
            return;
        }
        let mut robots = self.robots.write().await;
        for (position, expected_endpoint) in pending.drain() {
            if robots.get(&position).is_some_and(|t| t.view.endpoint == expected_endpoint) {
                robots.remove(&position);
                warn!(position, "removed dead robot from membership");
            }
        }
    }

    /// Snapshot of every currently tracked robot, used by the selection
    /// algorithm. Ties in the algorithm break on descending position
    /// (spec §4.4), so the snapshot is sorted accordingly.
    pub async fn snapshot(&self) -> Vec<RemoteRobotView> {
        let robots = self.robots.read().await;
        let mut views: Vec<_> = robots.values().map(|t| t.view.clone()).collect();
        views.sort_by(|a, b| b.position.cmp(&a.position));
        views
    }

    pub async fn len(&self) -> usize {
        self.robots.read().await.len()
    }

    /// Swap two positions' entries when a robot's `position` subscription
    /// reports a value different from the one it was registered under
    /// (spec §8 scenario 6). Mirrors `kitchen::robots::RobotMembership`'s
    /// `swap_positions`. A no-op if `new_position` is already occupied by
    /// the same robot moving there, or if `old_position` is no longer held
    /// by `expected_endpoint` (the subscription's own entry was already
    /// replaced or removed).
    async fn swap_positions(&self, old_position: u32, new_position: u32, expected_endpoint: &str) {
        if old_position == new_position {
            return;
        }
        let mut robots = self.robots.write().await;
        if !robots.get(&old_position).is_some_and(|t| t.view.endpoint == expected_endpoint) {
            return;
        }
        let moved = robots.remove(&old_position);
        let displaced = robots.remove(&new_position);
        if let Some(mut tracked) = moved {
            tracked.view.position = new_position;
            info!(
                old_position,
                new_position,
                endpoint = %tracked.view.endpoint,
                "robot position swap observed"
            );
            robots.insert(new_position, tracked);
        }
        if let Some(mut tracked) = displaced {
            tracked.view.position = old_position;
            robots.insert(old_position, tracked);
        }
    }

    async fn register(
        self: &Arc<Self>,
        position: u32,
        view: RemoteRobotView,
        channel: Arc<ReconnectingChannel>,
    ) {
        self.robots.write().await.insert(position, Tracked { view, channel });
    }

    async fn is_known_endpoint(&self, endpoint: &str) -> bool {
        self.robots.read().await.values().any(|t| t.view.endpoint == endpoint)
    }

    async fn update_overall_time(&self, endpoint: &str, value: u32) {
        let mut robots = self.robots.write().await;
        if let Some(t) = robots.values_mut().find(|t| t.view.endpoint == endpoint) {
            t.view.overall_time = value;
        }
    }

    async fn update_last_equipped_tool(&self, endpoint: &str, tool: u32) {
        let mut robots = self.robots.write().await;
        if let Some(t) = robots.values_mut().find(|t| t.view.endpoint == endpoint) {
            t.view.last_equipped_tool = kitchen_domain::RobotTool::from_u32(tool);
        }
    }

    async fn position_of(&self, endpoint: &str) -> Option<u32> {
        self.robots.read().await.values().find(|t| t.view.endpoint == endpoint).map(|t| t.view.position)
    }

    /// Register a robot directly, bypassing discovery (spec §4.4
    /// `register_robot`, "deprecated path, retained for backward
    /// compatibility"). Still wired up for subscriptions like a
    /// discovery-found robot.
    pub async fn register_robot(
        self: &Arc<Self>,
        endpoint: String,
        position: u32,
        capabilities: Vec<String>,
        discovery_endpoint: String,
    ) {
        if self.is_known_endpoint(&endpoint).await {
            return;
        }
        let channel = ReconnectingChannel::new(endpoint.clone());
        let view = RemoteRobotView::new(endpoint.clone(), position, capabilities.into_iter().collect());
        self.register(position, view, Arc::clone(&channel)).await;
        spawn_subscriptions(Arc::clone(self), endpoint, position, channel, discovery_endpoint);
    }

    /// Run the discovery loop until `shutdown` fires (spec §4.4: "every
    /// T_DISCOVER enumerate endpoints, connect to any that host a Robot
    /// object and are not yet known").
    pub async fn run_discovery(
        self: Arc<Self>,
        discovery_endpoint: String,
        t_discover: Duration,
        shutdown: CancellationToken,
    ) {
        info!("controller membership discovery loop started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(t_discover) => {}
                _ = shutdown.cancelled() => {
                    debug!("controller membership discovery loop shutting down");
                    return;
                }
            }
            self.sweep().await;
            self.scan_once(&discovery_endpoint).await;
        }
    }

    async fn scan_once(self: &Arc<Self>, discovery_endpoint: &str) {
        let mut client = match connect(discovery_endpoint).await {
            Ok(c) => c,
            Err(e) => {
                debug!(err = %e, "controller discovery scan: connect failed");
                return;
            }
        };
        let servers = match find_servers(&mut client, Some("Robot")).await {
            Ok(s) => s,
            Err(e) => {
                debug!(err = %e, "controller discovery scan: find_servers failed");
                return;
            }
        };
        for server in servers {
            if self.is_known_endpoint(&server.endpoint).await {
                continue;
            }
            let Ok(channel) = self.connect_and_snapshot(&server.endpoint).await else { continue };
            let (view, reconnecting) = channel;
            let position = view.position;
            self.register(position, view, Arc::clone(&reconnecting)).await;
            spawn_subscriptions(
                Arc::clone(self),
                server.endpoint,
                position,
                reconnecting,
                discovery_endpoint.to_owned(),
            );
        }
    }

    async fn connect_and_snapshot(
        self: &Arc<Self>,
        endpoint: &str,
    ) -> Result<(RemoteRobotView, Arc<ReconnectingChannel>), kitchen_bus::BusError> {
        use crate::proto::robot_client::RobotClient;

        let reconnecting = ReconnectingChannel::new(endpoint.to_owned());
        let channel = reconnecting.channel().await?;
        let mut client = RobotClient::new(channel);
        let state = client
            .get_robot_state(crate::proto::GetRobotStateRequest {})
            .await
            .map_err(kitchen_bus::BusError::from)?
            .into_inner();

        let mut view = RemoteRobotView::new(
            endpoint.to_owned(),
            state.position,
            state.capabilities.into_iter().collect(),
        );
        view.overall_time = state.overall_time;
        view.last_equipped_tool = kitchen_domain::RobotTool::from_u32(state.last_equipped_tool);
        Ok((view, reconnecting))
    }
}

fn spawn_subscriptions(
    membership: Arc<Membership>,
    endpoint: String,
    position: u32,
    channel: Arc<ReconnectingChannel>,
    discovery_endpoint: String,
) {
    let _ = discovery_endpoint;
    for attribute in ["overall_time", "last_equipped_tool"] {
        let membership = Arc::clone(&membership);
        let channel = Arc::clone(&channel);
        let endpoint = endpoint.clone();
        tokio::spawn(async move {
            run_attribute_subscription(membership, endpoint, channel, attribute).await;
        });
    }
    tokio::spawn(run_position_subscription(membership, position, endpoint, channel));
}

/// Tracks one robot's `position` attribute and swaps its membership entry
/// to the new key whenever it changes (spec §8 scenario 6), mirroring
/// `kitchen::robots::run_position_subscription`.
async fn run_position_subscription(
    membership: Arc<Membership>,
    mut known_position: u32,
    endpoint: String,
    channel: Arc<ReconnectingChannel>,
) {
    use crate::proto::robot_client::RobotClient;

    let ch = match channel.channel().await {
        Ok(c) => c,
        Err(e) => {
            warn!(err = %e, %endpoint, "controller: position subscription connect failed");
            mark_dead(&membership, &endpoint).await;
            return;
        }
    };
    let mut client = RobotClient::new(ch);
    let request = crate::proto::SubscribeAttributeRequest { attribute: "position".to_owned() };
    let mut stream = match client.subscribe_attribute(request).await {
        Ok(resp) => resp.into_inner(),
        Err(e) => {
            warn!(err = %e, %endpoint, "controller: subscribe_attribute(position) failed");
            mark_dead(&membership, &endpoint).await;
            return;
        }
    };

    loop {
        use tokio_stream::StreamExt;
        match stream.next().await {
            Some(Ok(value)) => {
                if let Ok(AttrValue::U32(new_position)) = AttrValue::try_from(value) {
                    if new_position != known_position {
                        membership.swap_positions(known_position, new_position, &endpoint).await;
                        known_position = new_position;
                    }
                }
            }
            Some(Err(e)) => {
                warn!(err = %e, %endpoint, "controller: position subscription stream error");
                mark_dead(&membership, &endpoint).await;
                return;
            }
            None => {
                debug!(%endpoint, "controller: position subscription stream closed");
                mark_dead(&membership, &endpoint).await;
                return;
            }
        }
    }
}

async fn run_attribute_subscription(
    membership: Arc<Membership>,
    endpoint: String,
    channel: Arc<ReconnectingChannel>,
    attribute: &'static str,
) {
    use crate::proto::robot_client::RobotClient;

    let ch = match channel.channel().await {
        Ok(c) => c,
        Err(e) => {
            warn!(err = %e, %endpoint, attribute, "subscription connect failed, marking robot dead");
            mark_dead(&membership, &endpoint).await;
            return;
        }
    };
    let mut client = RobotClient::new(ch);
    let request = crate::proto::SubscribeAttributeRequest { attribute: attribute.to_owned() };
    let mut stream = match client.subscribe_attribute(request).await {
        Ok(resp) => resp.into_inner(),
        Err(e) => {
            warn!(err = %e, %endpoint, attribute, "subscribe_attribute failed, marking robot dead");
            mark_dead(&membership, &endpoint).await;
            return;
        }
    };

    loop {
        use tokio_stream::StreamExt;
        match stream.next().await {
            Some(Ok(value)) => {
                if let Ok(v) = kitchen_bus::AttrValue::try_from(value) {
                    match (attribute, v) {
                        ("overall_time", AttrValue::U32(t)) => {
                            membership.update_overall_time(&endpoint, t).await
                        }
                        ("last_equipped_tool", AttrValue::U32(t)) => {
                            membership.update_last_equipped_tool(&endpoint, t).await
                        }
                        _ => {}
                    }
                }
            }
            Some(Err(e)) => {
                warn!(err = %e, %endpoint, attribute, "subscription stream error, marking robot dead");
                mark_dead(&membership, &endpoint).await;
                return;
            }
            None => {
                debug!(%endpoint, attribute, "subscription stream closed, marking robot dead");
                mark_dead(&membership, &endpoint).await;
                return;
            }
        }
    }
}

async fn mark_dead(membership: &Arc<Membership>, endpoint: &str) {
    if let Some(position) = membership.position_of(endpoint).await {
        membership.mark_for_removal(position, endpoint.to_owned()).await;
    }
}
