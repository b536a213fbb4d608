// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rate-limited admission gate for `place_random_order` (spec §4.5, §9):
//! the first call reaches the controller immediately; every call after that
//! is queued and released one at a time by a `PLACING_RATE` timer. This is
//! the one piece of Kitchen state that genuinely needs serialized ordering
//! (spec §5 "ordering guarantees": "`place_random_order` calls to the
//! controller are serialised by the Kitchen gate at intervals ≥
//! PLACING_RATE"), so it runs as its own small worker rather than living
//! behind the `RwLock`-guarded membership map in [`crate::robots`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use kitchen_bus::discovery::PeerLocator;
use kitchen_domain::recipe::RecipeId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Handle to the background gate task; `submit` is the only entry point
/// callers need.
pub struct AdmissionGate {
    tx: mpsc::Sender<RecipeId>,
}

impl AdmissionGate {
    pub fn spawn(
        controller: Arc<PeerLocator>,
        self_endpoint: String,
        placing_rate: Duration,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(run(rx, controller, self_endpoint, placing_rate, shutdown));
        Arc::new(Self { tx })
    }

    /// Enqueue a recipe id chosen by `place_random_order`. Never blocks the
    /// caller on the controller round-trip.
    pub async fn submit(&self, recipe_id: RecipeId) {
        if self.tx.send(recipe_id).await.is_err() {
            warn!(recipe_id, "admission gate worker is gone, order dropped before reaching controller");
        }
    }
}

async fn run(
    mut rx: mpsc::Receiver<RecipeId>,
    controller: Arc<PeerLocator>,
    self_endpoint: String,
    placing_rate: Duration,
    shutdown: CancellationToken,
) {
    let mut open = true;
    let mut queue: VecDeque<RecipeId> = VecDeque::new();
    let mut wake_at: Option<Instant> = None;

    loop {
        let sleep = async {
            match wake_at {
                Some(at) => tokio::time::sleep_until(at.into()).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            recipe = rx.recv() => {
                let Some(recipe_id) = recipe else { return };
                if open {
                    open = false;
                    forward(&controller, &self_endpoint, recipe_id).await;
                    wake_at = Some(Instant::now() + placing_rate);
                } else {
                    queue.push_back(recipe_id);
                }
            }
            _ = sleep => {
                if let Some(recipe_id) = queue.pop_front() {
                    forward(&controller, &self_endpoint, recipe_id).await;
                    wake_at = Some(Instant::now() + placing_rate);
                } else {
                    open = true;
                    wake_at = None;
                }
            }
            _ = shutdown.cancelled() => return,
        }
    }
}

async fn forward(controller: &PeerLocator, self_endpoint: &str, recipe_id: RecipeId) {
    use crate::proto::controller_client::ControllerClient;

    let Ok(remote) = controller.resolve().await else {
        warn!(recipe_id, "could not locate controller for choose_next_robot");
        return;
    };
    let Ok(channel) = remote.channel().await else {
        warn!(recipe_id, "could not reach controller for choose_next_robot");
        return;
    };
    let request = crate::proto::ChooseNextRobotRequest {
        recipe_id,
        processed_steps: 0,
        requester_endpoint: self_endpoint.to_owned(),
        requester_type: "kitchen".to_owned(),
    };
    if let Err(e) = ControllerClient::new(channel).choose_next_robot(request).await {
        warn!(err = %e, recipe_id, "choose_next_robot failed, order considered dropped");
        remote.mark_down();
        controller.invalidate().await;
    }
}
