// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory discovery directory (spec §4.1, §6).
//!
//! Agents register their endpoint and hosted object types here on startup
//! and renew the registration periodically (`T_RENEW`, default 50 min).
//! Entries that are not renewed in time are pruned by [`run_lease_sweeper`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::proto;

/// Default renewal interval agents are told to use (spec §4.1: T_RENEW).
pub const DEFAULT_LEASE_SECONDS: u32 = 50 * 60;

/// How often the sweeper checks for expired leases.
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

struct Entry {
    server: proto::ServerDescriptor,
    expires_at: Instant,
}

/// The discovery directory's server-side state.
pub struct DiscoveryRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    lease: Duration,
}

impl Default for DiscoveryRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_LEASE_SECONDS as u64))
    }
}

impl DiscoveryRegistry {
    pub fn new(lease: Duration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), lease }
    }

    /// Register or renew a server. Returns the lease duration in seconds.
    pub async fn register(&self, server: proto::ServerDescriptor) -> u32 {
        let mut entries = self.entries.write().await;
        let is_new = !entries.contains_key(&server.server_id);
        entries.insert(
            server.server_id.clone(),
            Entry { expires_at: Instant::now() + self.lease, server },
        );
        if is_new {
            debug!("discovery: new registration");
        }
        self.lease.as_secs() as u32
    }

    pub async fn deregister(&self, server_id: &str) -> bool {
        self.entries.write().await.remove(server_id).is_some()
    }

    /// Find live servers, optionally filtered by hosted object type.
    pub async fn find_servers(&self, object_type: Option<&str>) -> Vec<proto::ServerDescriptor> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        entries
            .values()
            .filter(|e| e.expires_at > now)
            .filter(|e| match object_type {
                Some(ty) => e.server.object_types.iter().any(|t| t == ty),
                None => true,
            })
            .map(|e| e.server.clone())
            .collect()
    }

    /// Periodically evict expired registrations until `shutdown` fires.
    pub async fn run_lease_sweeper(&self, shutdown: CancellationToken) {
        info!("discovery registry lease sweeper started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
                _ = shutdown.cancelled() => {
                    debug!("discovery registry lease sweeper shutting down");
                    return;
                }
            }
            let now = Instant::now();
            let mut entries = self.entries.write().await;
            let before = entries.len();
            entries.retain(|_, e| e.expires_at > now);
            let pruned = before - entries.len();
            if pruned > 0 {
                warn!(pruned, "pruned expired discovery registrations");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(id: &str, object_type: &str) -> proto::ServerDescriptor {
        proto::ServerDescriptor {
            server_id: id.to_owned(),
            endpoint: format!("http://127.0.0.1:0/{id}"),
            object_types: vec![object_type.to_owned()],
            tags: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn register_then_find_by_type() {
        let registry = DiscoveryRegistry::default();
        registry.register(desc("r1", "Robot")).await;
        registry.register(desc("k1", "Kitchen")).await;

        let robots = registry.find_servers(Some("Robot")).await;
        assert_eq!(robots.len(), 1);
        assert_eq!(robots[0].server_id, "r1");

        let all = registry.find_servers(None).await;
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn deregister_removes_entry() {
        let registry = DiscoveryRegistry::default();
        registry.register(desc("r1", "Robot")).await;
        assert!(registry.deregister("r1").await);
        assert!(!registry.deregister("r1").await);
        assert!(registry.find_servers(None).await.is_empty());
    }

    #[tokio::test]
    async fn expired_lease_is_not_returned() {
        let registry = DiscoveryRegistry::new(Duration::from_millis(1));
        registry.register(desc("r1", "Robot")).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(registry.find_servers(None).await.is_empty());
    }
}
