// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A reconnecting gRPC channel wrapper (spec §4.5 "Resilience", §5).
//!
//! Agents never touch a dead channel directly: every peer dial goes through
//! a [`ReconnectingChannel`], which tracks a `connectivity` flag (mirrored by
//! callers onto their own address-space attribute, e.g. `RemoteRobot_i
//! .connectivity`) and notifies waiters via a [`tokio::sync::Notify`] — the
//! async analogue of the source's condition variable — whenever a dial
//! succeeds after a failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tonic::transport::Channel;
use tracing::{debug, warn};

use crate::error::BusError;

/// How long a single connect attempt may take before giving up (spec §5:
/// "default 1 s on connect").
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// How long a single RPC call may take before giving up (spec §5: "default
/// 2 s on call").
pub const CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// A lazily (re)dialed gRPC channel to one peer endpoint.
pub struct ReconnectingChannel {
    endpoint: String,
    channel: RwLock<Option<Channel>>,
    connected: AtomicBool,
    reconnected: Notify,
}

impl ReconnectingChannel {
    pub fn new(endpoint: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            endpoint: endpoint.into(),
            channel: RwLock::new(None),
            connected: AtomicBool::new(false),
            reconnected: Notify::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Return a usable channel, dialing (or redialing) if necessary.
    pub async fn channel(&self) -> Result<Channel, BusError> {
        {
            let guard = self.channel.read().await;
            if let Some(ch) = guard.as_ref() {
                return Ok(ch.clone());
            }
        }
        self.dial().await
    }

    async fn dial(&self) -> Result<Channel, BusError> {
        let endpoint = tonic::transport::Endpoint::from_shared(self.endpoint.clone())
            .map_err(|e| BusError::BadArgs(e.to_string()))?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(CALL_TIMEOUT);
        match endpoint.connect().await {
            Ok(ch) => {
                *self.channel.write().await = Some(ch.clone());
                let was_down = !self.connected.swap(true, Ordering::AcqRel);
                if was_down {
                    debug!(endpoint = %self.endpoint, "reconnected");
                    self.reconnected.notify_waiters();
                }
                Ok(ch)
            }
            Err(e) => {
                self.mark_down();
                Err(BusError::Transport(e.to_string()))
            }
        }
    }

    /// Mark the channel unusable after an observed transport failure, so
    /// the next `channel()` call redials instead of reusing a dead one.
    pub fn mark_down(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            warn!(endpoint = %self.endpoint, "peer connection marked down");
        }
    }

    /// Suspend until a reconnection succeeds (or `mark_down` + a later
    /// successful `dial` fires the notification). Callers blocked on a
    /// dead controller/conveyor connection (spec §4.5) wait here.
    pub async fn wait_for_reconnect(&self) {
        self.reconnected.notified().await;
    }

    /// Keep attempting to dial until shutdown or success, sleeping
    /// `retry_interval` between attempts.
    pub async fn reconnect_loop(
        self: &Arc<Self>,
        retry_interval: Duration,
        shutdown: tokio_util::sync::CancellationToken,
    ) {
        loop {
            if self.is_connected() {
                tokio::select! {
                    _ = tokio::time::sleep(retry_interval) => continue,
                    _ = shutdown.cancelled() => return,
                }
            }
            if self.dial().await.is_ok() {
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(retry_interval) => {}
                _ = shutdown.cancelled() => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_channel_reports_disconnected() {
        let ch = ReconnectingChannel::new("http://127.0.0.1:1");
        assert!(!ch.is_connected());
    }

    #[tokio::test]
    async fn mark_down_is_idempotent() {
        let ch = ReconnectingChannel::new("http://127.0.0.1:1");
        ch.mark_down();
        ch.mark_down();
        assert!(!ch.is_connected());
    }
}
