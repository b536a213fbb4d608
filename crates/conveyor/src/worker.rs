// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The conveyor's single-writer worker task (spec §4.3, §5): owns the plate
//! ring and the belt's `IDLING ↔ MOVING` state machine. RPC handlers in
//! [`crate::service`] only enqueue a [`WorkerCommand`]; every plate mutation
//! happens here, serially.
//!
//! **Resolved ambiguity** (recorded in `DESIGN.md`): the distilled spec names
//! `handover_finished_order` both as the call that *retrieves* a robot's
//! locally-finished dish onto the belt (§4.2's RPC) and, in the movement
//! tick's case (b), as the action taken when a plate carrying an unfinished
//! dish arrives at its next robot's position. Those are two different
//! operations on two different RPCs: retrieval always calls the Robot's
//! `handover_finished_order`; delivery of a plate that just arrived at a
//! robot calls that Robot's `receive_task` (the RPC named in the order-flow
//! summary, spec §2). This worker implements both, under those names.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kitchen_bus::discovery::PeerLocator;
use kitchen_domain::{Plate, PlateId, RecipeId, OUTPUT_POSITION};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::robots::RobotDirectory;

/// One command an RPC handler posts to the worker.
pub enum WorkerCommand {
    FinishedOrderNotification {
        endpoint: String,
        position: u32,
        reply: oneshot::Sender<bool>,
    },
    ReceiveNextRobot {
        position: u32,
        endpoint: String,
        recipe_id: RecipeId,
        reply: oneshot::Sender<bool>,
    },
    GetPlate {
        id: PlateId,
        reply: oneshot::Sender<Option<Plate>>,
    },
    ListPlates {
        reply: oneshot::Sender<Vec<Plate>>,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum BeltState {
    Idling,
    Moving,
}

/// Shared, read-only dependencies the worker needs but never mutates.
pub struct WorkerDeps {
    pub ring_size: u32,
    pub robots: Arc<RobotDirectory>,
    pub kitchen: Arc<PeerLocator>,
    pub controller: Arc<PeerLocator>,
    pub self_endpoint: String,
    pub time_unit: Duration,
}

pub struct ConveyorWorker {
    deps: WorkerDeps,
    plates: Vec<Plate>,
    belt: BeltState,
    /// `position → notifying robot endpoint`, idempotent pending pickups
    /// (spec §4.3 "Notification handling").
    notifications: HashMap<u32, String>,
    /// `position → recipe_id` for plates parked awaiting the Controller's
    /// asynchronous `choose_next_robot` reply.
    awaiting_selection: HashMap<u32, RecipeId>,
}

impl ConveyorWorker {
    pub fn new(deps: WorkerDeps) -> Self {
        let plates = (0..deps.ring_size).map(|position| Plate::new(position + 1, position)).collect();
        Self { deps, plates, belt: BeltState::Idling, notifications: HashMap::new(), awaiting_selection: HashMap::new() }
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<WorkerCommand>, shutdown: CancellationToken) {
        let mut wake_at: Option<Instant> = None;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("conveyor worker shutting down");
                    return;
                }
                cmd = rx.recv() => {
                    match cmd {
                        Some(WorkerCommand::FinishedOrderNotification { endpoint, position, reply }) => {
                            let ok = self.finished_order_notification(endpoint, position, &mut wake_at).await;
                            let _ = reply.send(ok);
                        }
                        Some(WorkerCommand::ReceiveNextRobot { position, endpoint, recipe_id, reply }) => {
                            let ok = self.receive_next_robot(position, endpoint, recipe_id).await;
                            let _ = reply.send(ok);
                        }
                        Some(WorkerCommand::GetPlate { id, reply }) => {
                            let _ = reply.send(self.plates.iter().find(|p| p.id == id).cloned());
                        }
                        Some(WorkerCommand::ListPlates { reply }) => {
                            let _ = reply.send(self.plates.clone());
                        }
                        None => return,
                    }
                }
                _ = async {
                    match wake_at {
                        Some(t) => tokio::time::sleep_until(t).await,
                        None => std::future::pending().await,
                    }
                } => {
                    self.perform_movement(&mut wake_at).await;
                }
            }
        }
    }

    /// `position` is always one of `0..ring_size`, and exactly one plate
    /// occupies each ring position at all times (spec §3 invariant), so a
    /// miss here means ring construction itself is broken.
    #[allow(clippy::expect_used)]
    fn plate_at_mut(&mut self, position: u32) -> &mut Plate {
        self.plates.iter_mut().find(|p| p.position == position).expect("one plate per position")
    }

    #[allow(clippy::expect_used)]
    fn plate_at(&self, position: u32) -> &Plate {
        self.plates.iter().find(|p| p.position == position).expect("one plate per position")
    }

    fn has_pending_targets(&self) -> bool {
        self.plates.iter().any(|p| p.occupied && p.has_pending_target())
    }

    fn schedule_tick(&mut self, wake_at: &mut Option<Instant>) {
        self.belt = BeltState::Moving;
        *wake_at = Some(Instant::now() + self.deps.time_unit);
    }

    /// spec §4.3 "Notification handling": idempotent, retrieves immediately
    /// if the belt is idling.
    async fn finished_order_notification(
        &mut self,
        endpoint: String,
        position: u32,
        wake_at: &mut Option<Instant>,
    ) -> bool {
        self.notifications.entry(position).or_insert(endpoint);
        if self.belt == BeltState::Idling {
            self.retrieve_finished_orders().await;
            if self.has_pending_targets() || !self.notifications.is_empty() {
                self.schedule_tick(wake_at);
            }
        }
        true
    }

    /// The Controller's asynchronous reply to a `choose_next_robot` call
    /// this worker made (spec §4.4: fire-and-forget from the Controller's
    /// view). `position == 0` with an empty endpoint means no capable robot
    /// was found; the plate is dropped to the output slot.
    async fn receive_next_robot(&mut self, position: u32, endpoint: String, recipe_id: RecipeId) -> bool {
        let Some(parked_at) = self
            .awaiting_selection
            .iter()
            .find(|(_, r)| **r == recipe_id)
            .map(|(pos, _)| *pos)
        else {
            warn!(recipe_id, "receive_next_robot for a recipe not awaiting selection");
            return false;
        };
        self.awaiting_selection.remove(&parked_at);

        if position == 0 && endpoint.is_empty() {
            warn!(recipe_id, "controller found no capable robot, dropping dish");
            self.plate_at_mut(parked_at).drop_to_output();
            return true;
        }

        self.deps.robots.insert(position, endpoint).await;
        self.plate_at_mut(parked_at).target_position = position;
        true
    }

    /// Pick up any robot's finished round whose plate is free, in forward
    /// rotation order starting from position 0 (spec §4.3 "Ordering
    /// guarantees").
    async fn retrieve_finished_orders(&mut self) {
        let mut positions: Vec<u32> = self.notifications.keys().copied().collect();
        positions.sort_unstable();

        for position in positions {
            if self.plate_at(position).occupied {
                continue;
            }
            let Some(channel) = self.deps.robots.get(position).await else {
                warn!(position, "finished_order_notification for an unknown robot");
                self.notifications.remove(&position);
                continue;
            };

            match pickup_from_robot(&channel).await {
                Ok((recipe_id, processed_steps, is_finished)) => {
                    self.notifications.remove(&position);
                    if is_finished {
                        self.plate_at_mut(position).load(recipe_id, processed_steps, true, OUTPUT_POSITION);
                    } else {
                        self.plate_at_mut(position).load(recipe_id, processed_steps, false, position);
                        self.awaiting_selection.insert(position, recipe_id);
                        self.request_next_robot(position, recipe_id, processed_steps).await;
                    }
                }
                Err(e) => {
                    warn!(err = %e, position, "handover_finished_order failed, marking robot dead");
                    channel.mark_down();
                    self.deps.robots.remove(position).await;
                    self.notifications.remove(&position);
                }
            }
        }
    }

    async fn request_next_robot(&self, position: u32, recipe_id: RecipeId, processed_steps: u32) {
        use crate::proto::controller_client::ControllerClient;

        let Ok(controller) = self.deps.controller.resolve().await else {
            warn!(position, "could not locate controller for choose_next_robot");
            return;
        };
        let Ok(channel) = controller.channel().await else {
            warn!(position, "could not reach controller for choose_next_robot");
            return;
        };
        let request = crate::proto::ChooseNextRobotRequest {
            recipe_id,
            processed_steps,
            requester_endpoint: self.deps.self_endpoint.clone(),
            requester_type: "conveyor".to_owned(),
        };
        if let Err(e) = ControllerClient::new(channel).choose_next_robot(request).await {
            warn!(err = %e, position, "choose_next_robot RPC failed");
            controller.mark_down();
            self.deps.controller.invalidate().await;
        }
    }

    /// Advance every plate that still has somewhere to go by one ring
    /// position, then act on arrivals (spec §4.3 "State machine (belt)").
    /// Only occupied plates carrying a pending destination move; idle trays
    /// stay put, so the ring never needs more than one plate per position
    /// (spec §3 invariant) even though transit is per-plate rather than a
    /// single synchronized rotation — the resolved choice for the Open
    /// Question in `DESIGN.md` ("the belt continues moving
    /// opportunistically").
    async fn perform_movement(&mut self, wake_at: &mut Option<Instant>) {
        let ring_size = self.deps.ring_size;
        for plate in self.plates.iter_mut().filter(|p| p.occupied && p.has_pending_target()) {
            plate.advance(ring_size);
        }

        let arrived_at_output: Vec<PlateId> = self
            .plates
            .iter()
            .filter(|p| p.position == OUTPUT_POSITION && p.occupied && p.position == p.target_position)
            .map(|p| p.id)
            .collect();
        for id in arrived_at_output {
            self.deliver_to_kitchen(id).await;
        }

        let arrived_at_robot: Vec<(u32, RecipeId, u32)> = self
            .plates
            .iter()
            .filter(|p| p.occupied && !p.is_dish_finished && p.position == p.target_position && p.position != OUTPUT_POSITION)
            .filter_map(|p| p.recipe_id.map(|r| (p.position, r, p.processed_steps)))
            .collect();
        for (position, recipe_id, processed_steps) in arrived_at_robot {
            self.deliver_to_robot(position, recipe_id, processed_steps).await;
        }

        self.retrieve_finished_orders().await;

        if self.has_pending_targets() || !self.notifications.is_empty() {
            self.schedule_tick(wake_at);
        } else {
            self.belt = BeltState::Idling;
            *wake_at = None;
        }
    }

    async fn deliver_to_kitchen(&mut self, plate_id: PlateId) {
        use crate::proto::kitchen_client::KitchenClient;

        let Some(plate) = self.plates.iter().find(|p| p.id == plate_id) else { return };
        let Some(recipe_id) = plate.recipe_id else { return };
        let is_finished = plate.is_dish_finished;

        let Ok(kitchen) = self.deps.kitchen.resolve().await else {
            warn!(plate_id, "could not locate kitchen for receive_completed_order");
            return;
        };
        let Ok(channel) = kitchen.channel().await else {
            warn!(plate_id, "could not reach kitchen for receive_completed_order");
            return;
        };
        let request = crate::proto::ReceiveCompletedOrderRequest { recipe_id, is_finished };
        match KitchenClient::new(channel).receive_completed_order(request).await {
            Ok(_) => {
                info!(plate_id, recipe_id, is_finished, "delivered order to kitchen");
                if let Some(plate) = self.plates.iter_mut().find(|p| p.id == plate_id) {
                    plate.clear();
                }
            }
            Err(e) => {
                warn!(err = %e, plate_id, "receive_completed_order failed, retrying next tick");
                kitchen.mark_down();
                self.deps.kitchen.invalidate().await;
            }
        }
    }

    async fn deliver_to_robot(&mut self, position: u32, recipe_id: RecipeId, processed_steps: u32) {
        use crate::proto::robot_client::RobotClient;

        let Some(channel) = self.deps.robots.get(position).await else {
            warn!(position, "no known robot at target position, dropping dish");
            self.plate_at_mut(position).drop_to_output();
            return;
        };
        let Ok(ch) = channel.channel().await else {
            warn!(position, "could not reach robot to deliver task, dropping dish");
            channel.mark_down();
            self.deps.robots.remove(position).await;
            self.plate_at_mut(position).drop_to_output();
            return;
        };
        let request = crate::proto::ReceiveTaskRequest {
            recipe_id,
            processed_steps,
            addressed_position: position,
        };
        match RobotClient::new(ch).receive_task(request).await {
            Ok(resp) if resp.into_inner().accepted => {
                info!(position, recipe_id, "delivered task to robot");
                self.plate_at_mut(position).clear();
            }
            Ok(_) => {
                warn!(position, "robot declined task, dropping dish");
                self.plate_at_mut(position).drop_to_output();
            }
            Err(e) => {
                warn!(err = %e, position, "receive_task failed, dropping dish");
                channel.mark_down();
                self.deps.robots.remove(position).await;
                self.plate_at_mut(position).drop_to_output();
            }
        }
    }
}

async fn pickup_from_robot(
    channel: &Arc<kitchen_bus::ReconnectingChannel>,
) -> Result<(RecipeId, u32, bool), kitchen_bus::BusError> {
    use crate::proto::robot_client::RobotClient;

    let ch = channel.channel().await?;
    let resp = RobotClient::new(ch)
        .handover_finished_order(crate::proto::HandoverFinishedOrderRequest {})
        .await
        .map_err(kitchen_bus::BusError::from)?
        .into_inner();
    Ok((resp.recipe_id, resp.processed_steps, resp.is_finished))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps() -> WorkerDeps {
        WorkerDeps {
            ring_size: 3,
            robots: RobotDirectory::new(),
            kitchen: Arc::new(PeerLocator::new("http://127.0.0.1:1", "Kitchen")),
            controller: Arc::new(PeerLocator::new("http://127.0.0.1:1", "Controller")),
            self_endpoint: "http://conveyor".into(),
            time_unit: Duration::from_millis(10),
        }
    }

    #[test]
    fn initial_plates_fill_every_ring_position() {
        let worker = ConveyorWorker::new(deps());
        let mut positions: Vec<u32> = worker.plates.iter().map(|p| p.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 1, 2]);
        assert!(worker.plates.iter().all(|p| !p.occupied));
    }

    #[tokio::test]
    async fn receive_next_robot_updates_the_parked_plate() {
        let mut worker = ConveyorWorker::new(deps());
        worker.plate_at_mut(1).load(42, 1, false, 1);
        worker.awaiting_selection.insert(1, 42);

        let ok = worker.receive_next_robot(2, "http://robot2".into(), 42).await;
        assert!(ok);
        assert_eq!(worker.plate_at(1).target_position, 2);
        assert!(worker.awaiting_selection.is_empty());
    }

    #[tokio::test]
    async fn receive_next_robot_with_no_candidate_drops_to_output() {
        let mut worker = ConveyorWorker::new(deps());
        worker.plate_at_mut(1).load(42, 1, false, 1);
        worker.awaiting_selection.insert(1, 42);

        worker.receive_next_robot(0, String::new(), 42).await;
        let plate = worker.plate_at(1);
        assert_eq!(plate.target_position, OUTPUT_POSITION);
        assert!(!plate.is_dish_finished);
    }
}
