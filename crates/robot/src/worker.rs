// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The robot's single-writer worker task (spec §4.2, §5, §9: "Callbacks
//! across threads → typed tasks on a worker queue").
//!
//! All domain-state mutation happens here; RPC handlers in [`crate::service`]
//! only enqueue a [`WorkerCommand`] and await its reply. The worker itself
//! drives the simulated clock: every action and retool is one scheduled
//! wake-up, never a blocking sleep held alongside a lock.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use kitchen_bus::discovery::PeerLocator;
use kitchen_bus::{AttrValue, AttributeTable};
use kitchen_domain::{ActionRegistry, CapabilityProfile, RecipeCatalog, RecipeId, RecipeStep, RobotOrder, RobotTool};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const NONE_SENTINEL: &str = "None";

/// One command an RPC handler posts to the worker.
pub enum WorkerCommand {
    ReceiveTask {
        recipe_id: RecipeId,
        processed_steps: u32,
        addressed_position: u32,
        reply: oneshot::Sender<(u32, bool)>,
    },
    HandoverFinishedOrder {
        reply: oneshot::Sender<(RecipeId, u32, bool)>,
    },
}

enum Phase {
    Retooling { target: RobotTool },
    Cooking { step: RecipeStep },
}

struct CookingRound {
    recipe_id: RecipeId,
    overall_processed_steps: u32,
    processable_steps: u32,
    steps: VecDeque<RecipeStep>,
    phase: Option<Phase>,
}

struct FinishedRound {
    recipe_id: RecipeId,
    processed_steps: u32,
    is_finished: bool,
}

/// Shared, read-only dependencies the worker needs but never mutates.
pub struct WorkerDeps {
    pub position: u32,
    pub capabilities: CapabilityProfile,
    pub registry: Arc<ActionRegistry>,
    pub recipes: Arc<RecipeCatalog>,
    pub attrs: Arc<AttributeTable>,
    pub conveyor: Arc<PeerLocator>,
    pub self_endpoint: String,
    pub time_unit: Duration,
}

pub struct RobotWorker {
    deps: WorkerDeps,
    current_tool: Option<RobotTool>,
    remaining_ticks: u32,
    order_queue: VecDeque<RobotOrder>,
    cooking: Option<CookingRound>,
    pending_pickup: bool,
    finished: Option<FinishedRound>,
}

impl RobotWorker {
    pub fn new(deps: WorkerDeps) -> Self {
        Self {
            deps,
            current_tool: None,
            remaining_ticks: 0,
            order_queue: VecDeque::new(),
            cooking: None,
            pending_pickup: false,
            finished: None,
        }
    }

    /// Run the worker loop until `shutdown` fires, serving commands and the
    /// simulated-clock wake-ups that drive cooking.
    pub async fn run(mut self, mut rx: mpsc::Receiver<WorkerCommand>, shutdown: CancellationToken) {
        let mut wake_at: Option<Instant> = None;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(position = self.deps.position, "robot worker shutting down");
                    return;
                }
                cmd = rx.recv() => {
                    match cmd {
                        Some(WorkerCommand::ReceiveTask { recipe_id, processed_steps, addressed_position, reply }) => {
                            let result = self.receive_task(recipe_id, processed_steps, addressed_position, &mut wake_at).await;
                            let _ = reply.send(result);
                        }
                        Some(WorkerCommand::HandoverFinishedOrder { reply }) => {
                            let result = self.handover_finished_order(&mut wake_at).await;
                            let _ = reply.send(result);
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
                    self.advance_cook(&mut wake_at).await;
                }
            }
        }
    }

    /// spec §4.2 "Algorithm — prefix computation on receive_task".
    async fn receive_task(
        &mut self,
        recipe_id: RecipeId,
        processed_steps: u32,
        addressed_position: u32,
        wake_at: &mut Option<Instant>,
    ) -> (u32, bool) {
        if addressed_position != self.deps.position {
            return (self.deps.position, false);
        }
        let Some(recipe) = self.deps.recipes.get(recipe_id) else {
            warn!(recipe_id, "receive_task for unknown recipe");
            return (self.deps.position, false);
        };
        let start = processed_steps as usize;
        if start > recipe.actions.len() {
            warn!(recipe_id, processed_steps, "receive_task with processed_steps past recipe end");
            return (self.deps.position, false);
        }

        let mut prefix = Vec::new();
        let mut last_tool: Option<RobotTool> = None;
        let mut round_time = 0u32;
        for action in &recipe.actions[start..] {
            if !self.deps.capabilities.is_capable_to(&action.name) {
                break;
            }
            if let Some(prev) = last_tool {
                if prev != action.tool {
                    round_time += kitchen_domain::clock::RETOOL_COST;
                }
            }
            round_time += action.duration;
            last_tool = Some(action.tool);
            prefix.push(action.clone());
        }

        let k = prefix.len() as u32;
        if k == 0 {
            warn!(recipe_id, processed_steps, "no capable prefix for addressed robot");
            return (self.deps.position, false);
        }

        if let Some(first_tool) = prefix.first().map(|s| s.tool) {
            if self.current_tool != Some(first_tool) {
                round_time += kitchen_domain::clock::RETOOL_COST;
            }
        }

        self.remaining_ticks += round_time;
        self.publish_overall_time().await;

        if let Some(last) = prefix.last() {
            self.deps.attrs.write("last_equipped_tool", AttrValue::U32(last.tool.as_u32())).await;
        }

        let order = RobotOrder::new(recipe_id, processed_steps, prefix);
        self.order_queue.push_back(order);

        if self.cooking.is_none() && !self.pending_pickup {
            self.cook_next_order(wake_at).await;
        }

        (self.deps.position, true)
    }

    async fn cook_next_order(&mut self, wake_at: &mut Option<Instant>) {
        let Some(order) = self.order_queue.pop_front() else { return };
        self.deps.attrs.write("recipe_id", AttrValue::U32(order.recipe_id)).await;
        if let Some(dish) = self.deps.recipes.get(order.recipe_id) {
            self.deps.attrs.write("dish_name", AttrValue::Str(dish.dish_name.clone())).await;
        }
        self.cooking = Some(CookingRound {
            recipe_id: order.recipe_id,
            overall_processed_steps: order.overall_processed_steps,
            processable_steps: order.processable_steps,
            steps: order.action_queue.into(),
            phase: None,
        });
        self.schedule_next_step(wake_at).await;
    }

    async fn schedule_next_step(&mut self, wake_at: &mut Option<Instant>) {
        let Some(step) = self.cooking.as_ref().and_then(|r| r.steps.front().cloned()) else {
            if self.cooking.is_some() {
                self.finish_round(wake_at).await;
            } else {
                *wake_at = None;
            }
            return;
        };

        if self.current_tool != Some(step.tool) {
            if let Some(round) = self.cooking.as_mut() {
                round.phase = Some(Phase::Retooling { target: step.tool });
            }
            *wake_at = Some(Instant::now() + self.deps.time_unit * kitchen_domain::clock::RETOOL_COST);
        } else {
            self.deps.attrs.write("action_name", AttrValue::Str(step.name.clone())).await;
            self.deps.attrs.write("ingredients", AttrValue::Str(step.ingredients.clone())).await;
            if let Some(round) = self.cooking.as_mut() {
                round.phase = Some(Phase::Cooking { step: step.clone() });
            }
            *wake_at = Some(Instant::now() + self.deps.time_unit * step.duration);
        }
    }

    async fn advance_cook(&mut self, wake_at: &mut Option<Instant>) {
        let Some(round) = self.cooking.as_mut() else {
            *wake_at = None;
            return;
        };
        let phase = round.phase.take();
        match phase {
            Some(Phase::Retooling { target }) => {
                self.current_tool = Some(target);
                self.deps.attrs.write("current_tool", AttrValue::U32(target.as_u32())).await;
                self.remaining_ticks = self.remaining_ticks.saturating_sub(kitchen_domain::clock::RETOOL_COST);
                self.publish_overall_time().await;
                self.schedule_next_step(wake_at).await;
            }
            Some(Phase::Cooking { step }) => {
                if let Some(round) = self.cooking.as_mut() {
                    round.steps.pop_front();
                }
                self.remaining_ticks = self.remaining_ticks.saturating_sub(step.duration);
                self.publish_overall_time().await;
                self.schedule_next_step(wake_at).await;
            }
            None => self.schedule_next_step(wake_at).await,
        }
    }

    async fn finish_round(&mut self, wake_at: &mut Option<Instant>) {
        let Some(round) = self.cooking.take() else { return };
        let processed_steps = round.overall_processed_steps + round.processable_steps;
        let is_finished = self.deps.recipes.get(round.recipe_id)
            .map(|r| processed_steps as usize == r.actions.len())
            .unwrap_or(false);

        self.deps.attrs.write("action_name", AttrValue::Str(NONE_SENTINEL.into())).await;
        self.deps.attrs.write("ingredients", AttrValue::Str(NONE_SENTINEL.into())).await;

        self.pending_pickup = true;
        self.finished = Some(FinishedRound { recipe_id: round.recipe_id, processed_steps, is_finished });
        *wake_at = None;

        let conveyor = Arc::clone(&self.deps.conveyor);
        let endpoint = self.deps.self_endpoint.clone();
        let position = self.deps.position;
        tokio::spawn(async move {
            notify_conveyor(conveyor, endpoint, position).await;
        });
    }

    async fn handover_finished_order(&mut self, wake_at: &mut Option<Instant>) -> (RecipeId, u32, bool) {
        let Some(fr) = self.finished.take() else {
            warn!(position = self.deps.position, "handover_finished_order with no finished round pending");
            return (0, 0, false);
        };
        self.pending_pickup = false;
        if self.cooking.is_none() && !self.order_queue.is_empty() {
            self.cook_next_order(wake_at).await;
        }
        (fr.recipe_id, fr.processed_steps, fr.is_finished)
    }

    async fn publish_overall_time(&self) {
        self.deps.attrs.write("overall_time", AttrValue::U32(self.remaining_ticks)).await;
    }
}

async fn notify_conveyor(locator: Arc<PeerLocator>, endpoint: String, position: u32) {
    use crate::proto::conveyor_client::ConveyorClient;

    let reconnecting = match locator.resolve().await {
        Ok(c) => c,
        Err(e) => {
            warn!(err = %e, "could not locate conveyor to notify finished order");
            return;
        }
    };
    let channel = match reconnecting.channel().await {
        Ok(c) => c,
        Err(e) => {
            warn!(err = %e, "could not reach conveyor to notify finished order");
            return;
        }
    };
    let mut client = ConveyorClient::new(channel);
    let request = crate::proto::FinishedOrderNotificationRequest { endpoint, position };
    if let Err(e) = client.finished_order_notification(request).await {
        warn!(err = %e, "finished_order_notification RPC failed");
        reconnecting.mark_down();
        locator.invalidate().await;
    } else {
        info!(position, "notified conveyor of finished round");
    }
}
