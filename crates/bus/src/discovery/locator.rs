// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves a single named peer (e.g. "the Conveyor", "the Controller")
//! through the discovery directory on demand, caching the dialed channel
//! until its endpoint changes or it is explicitly marked down.
//!
//! Agents with a 1:1 relationship to a peer (Robot→Conveyor, Conveyor→
//! Kitchen, Conveyor→Controller) use this instead of maintaining their own
//! `position → session` map, which is reserved for peers tracked by
//! position (spec §9: "registry per agent mapping position → session").

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::client::connect;
use crate::client::ReconnectingChannel;
use crate::error::BusError;

struct Cached {
    endpoint: String,
    channel: Arc<ReconnectingChannel>,
}

/// Lazily resolves and caches the channel to the single live server hosting
/// `object_type`, re-querying the discovery directory whenever no cached
/// channel exists or the cached one has been marked down.
pub struct PeerLocator {
    discovery_endpoint: String,
    object_type: &'static str,
    cached: RwLock<Option<Cached>>,
}

impl PeerLocator {
    pub fn new(discovery_endpoint: impl Into<String>, object_type: &'static str) -> Self {
        Self { discovery_endpoint: discovery_endpoint.into(), object_type, cached: RwLock::new(None) }
    }

    /// Return a usable channel to the peer, re-resolving through discovery
    /// if there is no cached, connected channel.
    pub async fn resolve(&self) -> Result<Arc<ReconnectingChannel>, BusError> {
        {
            let guard = self.cached.read().await;
            if let Some(c) = guard.as_ref() {
                if c.channel.is_connected() {
                    return Ok(Arc::clone(&c.channel));
                }
            }
        }

        let mut client = connect(&self.discovery_endpoint).await?;
        let servers = super::client::find_servers(&mut client, Some(self.object_type)).await?;
        let server = servers
            .into_iter()
            .next()
            .ok_or_else(|| BusError::NotFound(format!("no live {} found", self.object_type)))?;

        let mut guard = self.cached.write().await;
        if let Some(existing) = guard.as_ref() {
            if existing.endpoint == server.endpoint {
                return Ok(Arc::clone(&existing.channel));
            }
        }
        debug!(object_type = self.object_type, endpoint = %server.endpoint, "resolved peer via discovery");
        let channel = ReconnectingChannel::new(server.endpoint.clone());
        *guard = Some(Cached { endpoint: server.endpoint, channel: Arc::clone(&channel) });
        Ok(channel)
    }

    /// Forget the cached channel so the next `resolve()` re-queries
    /// discovery instead of redialing a peer that may have moved endpoints.
    pub async fn invalidate(&self) {
        self.cached.write().await.take();
    }

    /// Observed link liveness for this peer, without forcing a fresh dial —
    /// backs a Kitchen mirror object's `connectivity` attribute (spec §4.5).
    pub async fn is_connected(&self) -> bool {
        match self.cached.read().await.as_ref() {
            Some(c) => c.channel.is_connected(),
            None => false,
        }
    }
}
