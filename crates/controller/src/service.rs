// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Controller's gRPC surface (spec §4.4): `register_robot` and
//! `choose_next_robot`. Selection itself runs on a detached task so the RPC
//! can return immediately — the chosen robot is delivered later by calling
//! back `receive_next_robot` on whichever agent asked (spec §4.4:
//! "fire-and-forget from the controller's view; failure to deliver is
//! logged and the order is considered dropped by the requester").

use std::sync::Arc;

use kitchen_bus::ReconnectingChannel;
use kitchen_domain::RecipeCatalog;
use tonic::{Request, Response, Status};
use tracing::warn;

use crate::membership::Membership;
use crate::proto;
use crate::selection::find_suitable_robot;
use crate::strategy::Strategy;

pub struct ControllerService {
    membership: Arc<Membership>,
    recipes: Arc<RecipeCatalog>,
    discovery_endpoint: String,
    strategy: Option<Arc<dyn Strategy>>,
}

impl ControllerService {
    pub fn new(
        membership: Arc<Membership>,
        recipes: Arc<RecipeCatalog>,
        discovery_endpoint: String,
    ) -> Self {
        Self { membership, recipes, discovery_endpoint, strategy: None }
    }

    /// Install a MAPE-K adaptation strategy (spec §9). Every subsequent
    /// `choose_next_robot` round consults it instead of
    /// [`find_suitable_robot`] directly.
    pub fn with_strategy(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn into_router(self) -> tonic::transport::server::Router {
        tonic::transport::Server::builder()
            .add_service(proto::controller_server::ControllerServer::new(self))
    }
}

#[tonic::async_trait]
impl proto::controller_server::Controller for ControllerService {
    async fn register_robot(
        &self,
        request: Request<proto::RegisterRobotRequest>,
    ) -> Result<Response<proto::RegisterRobotResponse>, Status> {
        let req = request.into_inner();
        self.membership
            .register_robot(req.endpoint, req.position, req.capabilities, self.discovery_endpoint.clone())
            .await;
        Ok(Response::new(proto::RegisterRobotResponse { ok: true }))
    }

    async fn choose_next_robot(
        &self,
        request: Request<proto::ChooseNextRobotRequest>,
    ) -> Result<Response<proto::ChooseNextRobotResponse>, Status> {
        let req = request.into_inner();
        let Some(recipe) = self.recipes.get(req.recipe_id) else {
            warn!(recipe_id = req.recipe_id, "choose_next_robot: unknown recipe");
            return Ok(Response::new(proto::ChooseNextRobotResponse { ok: false }));
        };
        let recipe = recipe.clone();
        let membership = Arc::clone(&self.membership);
        let strategy = self.strategy.clone();

        tokio::spawn(async move {
            membership.sweep().await;
            let candidates = membership.snapshot().await;
            let (position, endpoint) = match strategy {
                Some(strategy) => {
                    let decision = strategy.on_new_order(&candidates, &recipe, req.processed_steps);
                    if let Some((a, b)) = decision.swap_request {
                        warn!(a, b, "strategy requested a position swap, no RPC exists to apply it");
                    }
                    if let Some((position, _)) = decision.reconfigure_request {
                        warn!(position, "strategy requested a reconfiguration, no RPC exists to apply it");
                    }
                    decision.chosen.unwrap_or((0, String::new()))
                }
                None => {
                    let chosen = find_suitable_robot(&recipe, req.processed_steps, &candidates);
                    match chosen {
                        Some(robot) => (robot.position, robot.endpoint.clone()),
                        None => (0, String::new()),
                    }
                }
            };
            deliver_reply(
                &req.requester_endpoint,
                &req.requester_type,
                position,
                endpoint,
                recipe.recipe_id,
            )
            .await;
        });

        Ok(Response::new(proto::ChooseNextRobotResponse { ok: true }))
    }
}

/// Call `receive_next_robot` back on whichever agent asked (spec §4.4). Best
/// effort: the requester's endpoint is dialed fresh each time rather than
/// cached, since the controller has no ongoing relationship with it.
async fn deliver_reply(
    requester_endpoint: &str,
    requester_type: &str,
    position: u32,
    endpoint: String,
    recipe_id: u32,
) {
    let channel = ReconnectingChannel::new(requester_endpoint);
    let ch = match channel.channel().await {
        Ok(ch) => ch,
        Err(e) => {
            warn!(err = %e, requester_endpoint, "choose_next_robot: failed to reach requester");
            return;
        }
    };

    let payload = kitchen_bus::proto::ReceiveNextRobotRequest { position, endpoint, recipe_id };
    let result = match requester_type {
        "kitchen" => {
            proto::kitchen_client::KitchenClient::new(ch).receive_next_robot(payload).await.map(|_| ())
        }
        "conveyor" => {
            proto::conveyor_client::ConveyorClient::new(ch).receive_next_robot(payload).await.map(|_| ())
        }
        other => {
            warn!(requester_type = other, "choose_next_robot: unknown requester type");
            return;
        }
    };

    if let Err(e) = result {
        warn!(err = %e, requester_endpoint, requester_type, "receive_next_robot delivery failed, order dropped");
    }
}
