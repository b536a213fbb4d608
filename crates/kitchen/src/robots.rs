// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Robot membership tracking for the Kitchen (spec §4.5): a
//! `position → session` directory kept current by a rediscovery worker that
//! parks once every expected robot is held, and resumes on any removal
//! (spec §9 "registry per agent", §4.5 "Rediscovery loop").
//!
//! Unlike the Controller's membership map (`kitchen-controller`'s
//! `membership.rs`), the Kitchen never runs a batch "selection round" that
//! reads the whole map at once — every lookup here is a single-position
//! read or write guarded by the map's own lock — so removal is applied
//! directly rather than through the mark/sweep two-phase scheme `DESIGN.md`
//! records that simplification.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kitchen_bus::discovery::{connect, find_servers, PeerLocator};
use kitchen_bus::{AttrValue, ReconnectingChannel};
use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct RobotEntry {
    endpoint: String,
    channel: Arc<ReconnectingChannel>,
}

/// A read-only snapshot of one `RemoteRobot_i` mirror (spec §4.5).
#[derive(Debug, Clone)]
pub struct RemoteRobotMirror {
    pub position: u32,
    pub endpoint: String,
    pub connectivity: bool,
}

/// The Kitchen's `position → robot session` directory, plus the two peer
/// locators it mirrors connectivity for (`RemoteController`,
/// `RemoteConveyor`).
pub struct RobotMembership {
    robots: RwLock<HashMap<u32, RobotEntry>>,
    target: u32,
    woken: Notify,
    pub controller: Arc<PeerLocator>,
    pub conveyor: Arc<PeerLocator>,
}

impl RobotMembership {
    pub fn new(robot_count: u32, discovery_endpoint: &str) -> Arc<Self> {
        Arc::new(Self {
            robots: RwLock::new(HashMap::new()),
            target: robot_count,
            woken: Notify::new(),
            controller: Arc::new(PeerLocator::new(discovery_endpoint, "Controller")),
            conveyor: Arc::new(PeerLocator::new(discovery_endpoint, "Conveyor")),
        })
    }

    pub async fn len(&self) -> usize {
        self.robots.read().await.len()
    }

    pub async fn contains(&self, position: u32) -> bool {
        self.robots.read().await.contains_key(&position)
    }

    pub async fn channel(&self, position: u32) -> Option<Arc<ReconnectingChannel>> {
        self.robots.read().await.get(&position).map(|e| Arc::clone(&e.channel))
    }

    /// Establish a session to `endpoint` under `position` if the kitchen
    /// doesn't already hold one (spec §4.5 "Assignment path" step 2).
    /// Returns the channel either way.
    pub async fn ensure_session(self: &Arc<Self>, position: u32, endpoint: String) -> Arc<ReconnectingChannel> {
        if let Some(existing) = self.robots.read().await.get(&position) {
            if existing.endpoint == endpoint {
                return Arc::clone(&existing.channel);
            }
        }
        let channel = ReconnectingChannel::new(endpoint.clone());
        self.robots.write().await.insert(position, RobotEntry { endpoint: endpoint.clone(), channel: Arc::clone(&channel) });
        spawn_position_subscription(Arc::clone(self), position, endpoint, Arc::clone(&channel));
        channel
    }

    /// Drop a robot after a sustained RPC failure, and wake the rediscovery
    /// loop if it had parked (spec §4.5 "the worker is woken by any remote
    /// robot removal").
    pub async fn remove(&self, position: u32) {
        if self.robots.write().await.remove(&position).is_some() {
            warn!(position, "kitchen dropped session to dead robot");
            self.woken.notify_waiters();
        }
    }

    /// One robot's mirror view, for `GetRemoteRobot` (spec §4.5).
    pub async fn mirror(&self, position: u32) -> Option<RemoteRobotMirror> {
        let robots = self.robots.read().await;
        let entry = robots.get(&position)?;
        Some(RemoteRobotMirror {
            position,
            endpoint: entry.endpoint.clone(),
            connectivity: entry.channel.is_connected(),
        })
    }

    pub async fn all_mirrors(&self) -> Vec<RemoteRobotMirror> {
        let robots = self.robots.read().await;
        let mut mirrors: Vec<_> = robots
            .iter()
            .map(|(position, entry)| RemoteRobotMirror {
                position: *position,
                endpoint: entry.endpoint.clone(),
                connectivity: entry.channel.is_connected(),
            })
            .collect();
        mirrors.sort_by_key(|m| m.position);
        mirrors
    }

    /// Drop a robot's session, but only if `position` is still held by
    /// `expected_endpoint`. A subscription task's connection may outlive its
    /// entry — the position can already have been re-registered under a
    /// different endpoint by the time the task notices its stream closed —
    /// so this guards against deleting that replacement's session.
    async fn remove_if(&self, position: u32, expected_endpoint: &str) {
        let mut robots = self.robots.write().await;
        if robots.get(&position).is_some_and(|e| e.endpoint == expected_endpoint) {
            robots.remove(&position);
            warn!(position, "kitchen dropped session to dead robot");
            self.woken.notify_waiters();
        }
    }

    /// Swap two positions' sessions when a robot subscription reports a
    /// position different from the one remembered (spec §4.5
    /// "Position-swap callback"). A no-op if `new_position` is already
    /// occupied by the same endpoint moving there, or if `old_position` is
    /// no longer held by `expected_endpoint` (the subscription's own entry
    /// was already replaced or removed).
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

    /// Run the rediscovery loop until `shutdown` fires (spec §4.5): scans
    /// every second for available, not-yet-held robots; once the map holds
    /// `robot_count` sessions it parks until a removal wakes it.
    pub async fn run_rediscovery(
        self: Arc<Self>,
        discovery_endpoint: String,
        t_discover: Duration,
        shutdown: CancellationToken,
    ) {
        info!("kitchen rediscovery loop started");
        loop {
            if self.len().await as u32 >= self.target {
                tokio::select! {
                    _ = self.woken.notified() => {}
                    _ = shutdown.cancelled() => {
                        debug!("kitchen rediscovery loop shutting down while parked");
                        return;
                    }
                }
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(t_discover) => {}
                _ = shutdown.cancelled() => {
                    debug!("kitchen rediscovery loop shutting down");
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
                debug!(err = %e, "kitchen rediscovery: connect failed");
                return;
            }
        };
        let servers = match find_servers(&mut client, Some("Robot")).await {
            Ok(s) => s,
            Err(e) => {
                debug!(err = %e, "kitchen rediscovery: find_servers failed");
                return;
            }
        };

        for server in servers {
            if self.len().await as u32 >= self.target {
                return;
            }
            let channel = ReconnectingChannel::new(server.endpoint.clone());
            let Ok(ch) = channel.channel().await else { continue };
            let Ok(state) =
                RobotClient::new(ch).get_robot_state(crate::proto::GetRobotStateRequest {}).await
            else {
                continue;
            };
            let state = state.into_inner();
            if !state.availability {
                continue;
            }
            if self.contains(state.position).await {
                continue;
            }
            self.robots.write().await.insert(
                state.position,
                RobotEntry { endpoint: server.endpoint.clone(), channel: Arc::clone(&channel) },
            );
            info!(position = state.position, endpoint = %server.endpoint, "kitchen picked up robot");
            spawn_position_subscription(Arc::clone(self), state.position, server.endpoint, channel);
        }
    }
}

fn spawn_position_subscription(
    membership: Arc<RobotMembership>,
    known_position: u32,
    endpoint: String,
    channel: Arc<ReconnectingChannel>,
) {
    tokio::spawn(async move {
        run_position_subscription(membership, known_position, endpoint, channel).await;
    });
}

async fn run_position_subscription(
    membership: Arc<RobotMembership>,
    mut known_position: u32,
    endpoint: String,
    channel: Arc<ReconnectingChannel>,
) {
    use crate::proto::robot_client::RobotClient;

    let ch = match channel.channel().await {
        Ok(c) => c,
        Err(e) => {
            warn!(err = %e, %endpoint, "kitchen: position subscription connect failed");
            membership.remove_if(known_position, &endpoint).await;
            return;
        }
    };
    let mut client = RobotClient::new(ch);
    let request = crate::proto::SubscribeAttributeRequest { attribute: "position".to_owned() };
    let mut stream = match client.subscribe_attribute(request).await {
        Ok(resp) => resp.into_inner(),
        Err(e) => {
            warn!(err = %e, %endpoint, "kitchen: subscribe_attribute(position) failed");
            membership.remove_if(known_position, &endpoint).await;
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
                warn!(err = %e, %endpoint, "kitchen: position subscription stream error");
                membership.remove_if(known_position, &endpoint).await;
                return;
            }
            None => {
                debug!(%endpoint, "kitchen: position subscription stream closed");
                membership.remove_if(known_position, &endpoint).await;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_session_is_idempotent_for_the_same_endpoint() {
        let membership = RobotMembership::new(2, "http://127.0.0.1:4840");
        let a = membership.ensure_session(1, "http://robot1".into()).await;
        let b = membership.ensure_session(1, "http://robot1".into()).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(membership.len().await, 1);
    }

    #[tokio::test]
    async fn remove_wakes_a_parked_rediscovery_loop() {
        let membership = RobotMembership::new(0, "http://127.0.0.1:4840");
        membership.ensure_session(1, "http://robot1".into()).await;
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn({
            let membership = Arc::clone(&membership);
            let shutdown = shutdown.clone();
            async move {
                membership.run_rediscovery("http://127.0.0.1:1".into(), Duration::from_millis(10), shutdown).await;
            }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        membership.remove(1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(1), handle).await;
    }

    #[tokio::test]
    async fn swap_positions_exchanges_both_entries() {
        let membership = RobotMembership::new(2, "http://127.0.0.1:4840");
        membership.ensure_session(1, "http://a".into()).await;
        membership.ensure_session(2, "http://b".into()).await;
        membership.swap_positions(1, 2, "http://a").await;
        assert_eq!(membership.mirror(2).await.unwrap().endpoint, "http://a");
        assert_eq!(membership.mirror(1).await.unwrap().endpoint, "http://b");
    }

    #[tokio::test]
    async fn swap_positions_is_a_noop_when_the_old_entry_was_already_replaced() {
        let membership = RobotMembership::new(2, "http://127.0.0.1:4840");
        membership.ensure_session(1, "http://a".into()).await;
        membership.ensure_session(2, "http://b".into()).await;
        membership.ensure_session(1, "http://replacement".into()).await;
        membership.swap_positions(1, 2, "http://a").await;
        assert_eq!(membership.mirror(1).await.unwrap().endpoint, "http://replacement");
        assert_eq!(membership.mirror(2).await.unwrap().endpoint, "http://b");
    }

    #[tokio::test]
    async fn remove_if_is_a_noop_when_the_entry_was_already_replaced() {
        let membership = RobotMembership::new(2, "http://127.0.0.1:4840");
        membership.ensure_session(1, "http://a".into()).await;
        membership.ensure_session(1, "http://replacement".into()).await;
        membership.remove_if(1, "http://a").await;
        assert_eq!(membership.mirror(1).await.unwrap().endpoint, "http://replacement");
    }
}
