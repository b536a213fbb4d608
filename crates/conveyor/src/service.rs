// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Conveyor's gRPC surface (spec §4.3, §6): `finished_order_notification`,
//! the Controller's `receive_next_robot` callback, and read-only plate
//! inspection. Every handler only posts a [`crate::worker::WorkerCommand`]
//! and awaits its reply — plate state is never touched from this task
//! (spec §5).

use tokio::sync::{mpsc, oneshot};
use tonic::{Request, Response, Status};

use crate::proto;
use crate::worker::WorkerCommand;

pub struct ConveyorService {
    commands: mpsc::Sender<WorkerCommand>,
}

impl ConveyorService {
    pub fn new(commands: mpsc::Sender<WorkerCommand>) -> Self {
        Self { commands }
    }

    pub fn into_router(self) -> tonic::transport::server::Router {
        tonic::transport::Server::builder().add_service(proto::conveyor_server::ConveyorServer::new(self))
    }
}

#[tonic::async_trait]
impl proto::conveyor_server::Conveyor for ConveyorService {
    async fn finished_order_notification(
        &self,
        request: Request<proto::FinishedOrderNotificationRequest>,
    ) -> Result<Response<proto::FinishedOrderNotificationResponse>, Status> {
        let req = request.into_inner();
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(WorkerCommand::FinishedOrderNotification { endpoint: req.endpoint, position: req.position, reply: tx })
            .await
            .map_err(|_| Status::unavailable("conveyor worker shut down"))?;
        let ok = rx.await.map_err(|_| Status::cancelled("conveyor worker dropped the reply channel"))?;
        Ok(Response::new(proto::FinishedOrderNotificationResponse { ok }))
    }

    async fn receive_next_robot(
        &self,
        request: Request<kitchen_bus::proto::ReceiveNextRobotRequest>,
    ) -> Result<Response<kitchen_bus::proto::ReceiveNextRobotResponse>, Status> {
        let req = request.into_inner();
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(WorkerCommand::ReceiveNextRobot {
                position: req.position,
                endpoint: req.endpoint,
                recipe_id: req.recipe_id,
                reply: tx,
            })
            .await
            .map_err(|_| Status::unavailable("conveyor worker shut down"))?;
        let ok = rx.await.map_err(|_| Status::cancelled("conveyor worker dropped the reply channel"))?;
        Ok(Response::new(kitchen_bus::proto::ReceiveNextRobotResponse { ok }))
    }

    async fn get_plate(
        &self,
        request: Request<proto::GetPlateRequest>,
    ) -> Result<Response<proto::GetPlateResponse>, Status> {
        let id = request.into_inner().id;
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(WorkerCommand::GetPlate { id, reply: tx })
            .await
            .map_err(|_| Status::unavailable("conveyor worker shut down"))?;
        let plate = rx
            .await
            .map_err(|_| Status::cancelled("conveyor worker dropped the reply channel"))?
            .ok_or_else(|| Status::not_found(format!("no plate with id {id}")))?;
        Ok(Response::new(to_proto_plate(&plate)))
    }

    async fn list_plates(
        &self,
        _request: Request<proto::ListPlatesRequest>,
    ) -> Result<Response<proto::ListPlatesResponse>, Status> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(WorkerCommand::ListPlates { reply: tx })
            .await
            .map_err(|_| Status::unavailable("conveyor worker shut down"))?;
        let plates = rx.await.map_err(|_| Status::cancelled("conveyor worker dropped the reply channel"))?;
        Ok(Response::new(proto::ListPlatesResponse {
            plates: plates.iter().map(to_proto_plate).collect(),
        }))
    }
}

fn to_proto_plate(plate: &kitchen_domain::Plate) -> proto::GetPlateResponse {
    proto::GetPlateResponse {
        id: plate.id,
        position: plate.position,
        recipe_id: plate.recipe_id.unwrap_or(0),
        occupied: plate.occupied,
    }
}
