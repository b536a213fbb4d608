// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Kitchen's gRPC surface (spec §4.5, §6): counters, order placement,
//! the Controller's `receive_next_robot` callback, completed-order intake,
//! attribute subscriptions, and the read-only peer mirrors. Unlike the
//! Conveyor and Robot, the Kitchen has no plate ring or cooking state
//! machine to serialize — every handler here mutates an atomic counter or a
//! lock-guarded membership map directly rather than posting to a worker
//! (recorded as a resolved simplification in `DESIGN.md`).

use std::sync::Arc;

use kitchen_bus::AttributeTable;
use kitchen_domain::{KitchenCounters, RecipeCatalog};
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::gate::AdmissionGate;
use crate::proto;
use crate::robots::RobotMembership;

pub struct KitchenService {
    counters: Arc<KitchenCounters>,
    recipes: Arc<RecipeCatalog>,
    robots: Arc<RobotMembership>,
    gate: Arc<AdmissionGate>,
    attrs: Arc<AttributeTable>,
}

impl KitchenService {
    pub fn new(
        counters: Arc<KitchenCounters>,
        recipes: Arc<RecipeCatalog>,
        robots: Arc<RobotMembership>,
        gate: Arc<AdmissionGate>,
        attrs: Arc<AttributeTable>,
    ) -> Self {
        Self { counters, recipes, robots, gate, attrs }
    }

    pub fn into_router(self) -> tonic::transport::server::Router {
        tonic::transport::Server::builder().add_service(proto::kitchen_server::KitchenServer::new(self))
    }

    async fn publish_counters(&self) {
        use kitchen_bus::AttrValue;
        self.attrs.write("received_orders", AttrValue::U32(self.counters.received())).await;
        self.attrs.write("assigned_orders", AttrValue::U32(self.counters.assigned())).await;
        self.attrs.write("dropped_orders", AttrValue::U32(self.counters.dropped())).await;
        self.attrs.write("completed_orders", AttrValue::U32(self.counters.completed())).await;
    }
}

#[tonic::async_trait]
impl proto::kitchen_server::Kitchen for KitchenService {
    async fn get_counters(
        &self,
        _request: Request<proto::GetCountersRequest>,
    ) -> Result<Response<proto::GetCountersResponse>, Status> {
        Ok(Response::new(proto::GetCountersResponse {
            received_orders: self.counters.received(),
            assigned_orders: self.counters.assigned(),
            dropped_orders: self.counters.dropped(),
            completed_orders: self.counters.completed(),
        }))
    }

    /// spec §4.5: chooses a recipe uniformly at random, counts it as
    /// received, and hands it to the admission gate — the gate, not this
    /// handler, serializes the actual `choose_next_robot` call.
    async fn place_random_order(
        &self,
        _request: Request<proto::PlaceRandomOrderRequest>,
    ) -> Result<Response<proto::PlaceRandomOrderResponse>, Status> {
        let Some(recipe_id) = self.recipes.random_id() else {
            warn!("place_random_order called with an empty recipe catalog");
            return Ok(Response::new(proto::PlaceRandomOrderResponse { ok: false }));
        };
        self.counters.record_received();
        self.publish_counters().await;
        self.gate.submit(recipe_id).await;
        info!(recipe_id, "kitchen placed a random order");
        Ok(Response::new(proto::PlaceRandomOrderResponse { ok: true }))
    }

    /// The Controller's asynchronous reply to the gate's `choose_next_robot`
    /// call (spec §4.5 "Assignment path"). `position == 0` with an empty
    /// endpoint means no capable robot was found.
    async fn receive_next_robot(
        &self,
        request: Request<kitchen_bus::proto::ReceiveNextRobotRequest>,
    ) -> Result<Response<kitchen_bus::proto::ReceiveNextRobotResponse>, Status> {
        let req = request.into_inner();

        if req.position == 0 || req.endpoint.is_empty() {
            warn!(recipe_id = req.recipe_id, "controller found no capable robot, order dropped");
            self.counters.record_dropped();
            self.publish_counters().await;
            return Ok(Response::new(kitchen_bus::proto::ReceiveNextRobotResponse { ok: true }));
        }

        let channel = self.robots.ensure_session(req.position, req.endpoint.clone()).await;
        let accepted = match deliver_task(&channel, req.recipe_id, req.position).await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(err = %e, position = req.position, "receive_task failed, order dropped");
                channel.mark_down();
                self.robots.remove(req.position).await;
                false
            }
        };

        if accepted {
            self.counters.record_assigned();
            info!(recipe_id = req.recipe_id, position = req.position, "order assigned to robot");
        } else {
            self.counters.record_dropped();
            warn!(recipe_id = req.recipe_id, position = req.position, "robot declined task, order dropped");
        }
        self.publish_counters().await;
        Ok(Response::new(kitchen_bus::proto::ReceiveNextRobotResponse { ok: true }))
    }

    /// spec §4.5 "User-visible behaviour": a dish that comes back with
    /// `is_finished=false` means its assigned robot died mid-round, and is
    /// reclassified as dropped rather than completed.
    async fn receive_completed_order(
        &self,
        request: Request<proto::ReceiveCompletedOrderRequest>,
    ) -> Result<Response<proto::ReceiveCompletedOrderResponse>, Status> {
        let req = request.into_inner();
        if req.is_finished {
            self.counters.record_completed();
            info!(recipe_id = req.recipe_id, "order completed");
        } else {
            self.counters.record_dropped();
            warn!(recipe_id = req.recipe_id, "incomplete dish returned, order dropped");
        }
        self.publish_counters().await;
        Ok(Response::new(proto::ReceiveCompletedOrderResponse { ok: true }))
    }

    type SubscribeAttributeStream = kitchen_bus::AttrStream;

    async fn subscribe_attribute(
        &self,
        request: Request<proto::SubscribeAttributeRequest>,
    ) -> Result<Response<Self::SubscribeAttributeStream>, Status> {
        let attribute = request.into_inner().attribute;
        Ok(Response::new(self.attrs.subscribe_stream(attribute)))
    }

    async fn get_remote_robot(
        &self,
        request: Request<proto::GetRemoteRobotRequest>,
    ) -> Result<Response<proto::GetRemoteRobotResponse>, Status> {
        let position = request.into_inner().position;
        let mirror = self
            .robots
            .mirror(position)
            .await
            .ok_or_else(|| Status::not_found(format!("no known robot at position {position}")))?;
        Ok(Response::new(proto::GetRemoteRobotResponse {
            position: mirror.position,
            endpoint: mirror.endpoint,
            connectivity: mirror.connectivity,
        }))
    }

    async fn list_remote_robots(
        &self,
        _request: Request<proto::ListRemoteRobotsRequest>,
    ) -> Result<Response<proto::ListRemoteRobotsResponse>, Status> {
        let robots = self
            .robots
            .all_mirrors()
            .await
            .into_iter()
            .map(|m| proto::GetRemoteRobotResponse {
                position: m.position,
                endpoint: m.endpoint,
                connectivity: m.connectivity,
            })
            .collect();
        Ok(Response::new(proto::ListRemoteRobotsResponse { robots }))
    }

    async fn get_remote_controller_state(
        &self,
        _request: Request<proto::GetRemoteControllerStateRequest>,
    ) -> Result<Response<proto::GetRemoteControllerStateResponse>, Status> {
        Ok(Response::new(proto::GetRemoteControllerStateResponse {
            connectivity: self.robots.controller.is_connected().await,
        }))
    }

    async fn get_remote_conveyor_state(
        &self,
        _request: Request<proto::GetRemoteConveyorStateRequest>,
    ) -> Result<Response<proto::GetRemoteConveyorStateResponse>, Status> {
        Ok(Response::new(proto::GetRemoteConveyorStateResponse {
            connectivity: self.robots.conveyor.is_connected().await,
        }))
    }
}

async fn deliver_task(
    channel: &kitchen_bus::ReconnectingChannel,
    recipe_id: u32,
    addressed_position: u32,
) -> Result<bool, kitchen_bus::BusError> {
    use crate::proto::robot_client::RobotClient;

    let ch = channel.channel().await?;
    let resp = RobotClient::new(ch)
        .receive_task(proto::ReceiveTaskRequest { recipe_id, processed_steps: 0, addressed_position })
        .await
        .map_err(kitchen_bus::BusError::from)?
        .into_inner();
    Ok(resp.accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kitchen_domain::ActionRegistry;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    /// A stand-in `Robot` server that records the `addressed_position` it
    /// was dialed with and replies with a fixed `accepted` verdict, so
    /// `receive_next_robot`'s accept/assign branch can be exercised without
    /// a real robot process.
    struct FakeRobot {
        received_position: Arc<Mutex<Option<u32>>>,
        accept: bool,
    }

    #[tonic::async_trait]
    impl proto::robot_server::Robot for FakeRobot {
        async fn get_robot_state(
            &self,
            _request: Request<proto::GetRobotStateRequest>,
        ) -> Result<Response<proto::GetRobotStateResponse>, Status> {
            Err(Status::unimplemented("unused by this test"))
        }

        async fn receive_task(
            &self,
            request: Request<proto::ReceiveTaskRequest>,
        ) -> Result<Response<proto::ReceiveTaskResponse>, Status> {
            let req = request.into_inner();
            *self.received_position.lock().unwrap() = Some(req.addressed_position);
            Ok(Response::new(proto::ReceiveTaskResponse {
                actual_position: req.addressed_position,
                accepted: self.accept,
            }))
        }

        async fn handover_finished_order(
            &self,
            _request: Request<proto::HandoverFinishedOrderRequest>,
        ) -> Result<Response<proto::HandoverFinishedOrderResponse>, Status> {
            Err(Status::unimplemented("unused by this test"))
        }

        type SubscribeAttributeStream = kitchen_bus::AttrStream;

        async fn subscribe_attribute(
            &self,
            _request: Request<proto::SubscribeAttributeRequest>,
        ) -> Result<Response<Self::SubscribeAttributeStream>, Status> {
            Err(Status::unimplemented("unused by this test"))
        }
    }

    /// Bind an ephemeral port and serve `FakeRobot` on it, returning its
    /// `http://` endpoint and the position it was addressed at.
    async fn spawn_fake_robot(accept: bool) -> (String, Arc<Mutex<Option<u32>>>) {
        let received_position = Arc::new(Mutex::new(None));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let robot = FakeRobot { received_position: Arc::clone(&received_position), accept };
        let router =
            tonic::transport::Server::builder().add_service(proto::robot_server::RobotServer::new(robot));
        tokio::spawn(async move {
            let _ = router
                .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
                .await;
        });
        (format!("http://{addr}"), received_position)
    }

    fn registry() -> ActionRegistry {
        let json = r#"{"chop": {"tool": "CUTTER", "kind": "autonomous", "duration": 3}}"#;
        ActionRegistry::from_json(json).unwrap()
    }

    fn recipes() -> Arc<RecipeCatalog> {
        let json = r#"{"1": {"name": "A", "instructions": [{"action": "chop", "ingredients": "veg"}]}}"#;
        Arc::new(RecipeCatalog::from_json(json, &registry()).unwrap())
    }

    fn service() -> KitchenService {
        let counters = Arc::new(KitchenCounters::new());
        let robots = RobotMembership::new(1, "http://127.0.0.1:1");
        let gate = AdmissionGate::spawn(
            Arc::clone(&robots.controller),
            "http://127.0.0.1:2".into(),
            std::time::Duration::from_millis(10),
            CancellationToken::new(),
        );
        let attrs = Arc::new(AttributeTable::new());
        KitchenService::new(counters, recipes(), robots, gate, attrs)
    }

    #[tokio::test]
    async fn place_random_order_records_a_received_order() {
        let svc = service();
        let resp = svc.place_random_order(Request::new(proto::PlaceRandomOrderRequest {})).await.unwrap();
        assert!(resp.into_inner().ok);
        assert_eq!(svc.counters.received(), 1);
    }

    #[tokio::test]
    async fn receive_next_robot_with_no_candidate_drops_the_order() {
        let svc = service();
        let req = kitchen_bus::proto::ReceiveNextRobotRequest { position: 0, endpoint: String::new(), recipe_id: 1 };
        svc.receive_next_robot(Request::new(req)).await.unwrap();
        assert_eq!(svc.counters.dropped(), 1);
        assert_eq!(svc.counters.assigned(), 0);
    }

    /// Regression test for the accept/assign branch of `receive_next_robot`:
    /// the robot must be dialed at the position the controller actually
    /// chose, not position 0 (spec §4.5 "Assignment path" step 3).
    #[tokio::test]
    async fn receive_next_robot_with_a_capable_robot_assigns_and_accepts() {
        let svc = service();
        let (endpoint, received_position) = spawn_fake_robot(true).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let req = kitchen_bus::proto::ReceiveNextRobotRequest { position: 3, endpoint, recipe_id: 1 };
        svc.receive_next_robot(Request::new(req)).await.unwrap();

        assert_eq!(svc.counters.assigned(), 1);
        assert_eq!(svc.counters.dropped(), 0);
        assert_eq!(
            *received_position.lock().unwrap(),
            Some(3),
            "the robot must be addressed at the controller's chosen position, not 0"
        );
    }

    #[tokio::test]
    async fn receive_next_robot_with_a_declining_robot_drops_the_order() {
        let svc = service();
        let (endpoint, received_position) = spawn_fake_robot(false).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let req = kitchen_bus::proto::ReceiveNextRobotRequest { position: 2, endpoint, recipe_id: 1 };
        svc.receive_next_robot(Request::new(req)).await.unwrap();

        assert_eq!(svc.counters.assigned(), 0);
        assert_eq!(svc.counters.dropped(), 1);
        assert_eq!(*received_position.lock().unwrap(), Some(2));
    }

    #[tokio::test]
    async fn receive_completed_order_with_is_finished_false_counts_as_dropped() {
        let svc = service();
        let req = proto::ReceiveCompletedOrderRequest { recipe_id: 1, is_finished: false };
        svc.receive_completed_order(Request::new(req)).await.unwrap();
        assert_eq!(svc.counters.dropped(), 1);
        assert_eq!(svc.counters.completed(), 0);
    }

    #[tokio::test]
    async fn receive_completed_order_with_is_finished_true_counts_as_completed() {
        let svc = service();
        let req = proto::ReceiveCompletedOrderRequest { recipe_id: 1, is_finished: true };
        svc.receive_completed_order(Request::new(req)).await.unwrap();
        assert_eq!(svc.counters.completed(), 1);
        assert_eq!(svc.counters.dropped(), 0);
    }

    #[tokio::test]
    async fn get_remote_robot_for_an_unknown_position_is_not_found() {
        let svc = service();
        let err = svc
            .get_remote_robot(Request::new(proto::GetRemoteRobotRequest { position: 7 }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }
}
