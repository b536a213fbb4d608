// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Robot's gRPC surface (spec §4.2, §6): attribute reads plus
//! `receive_task`/`handover_finished_order`. Every handler only posts a
//! [`crate::worker::WorkerCommand`] to the worker and awaits its reply —
//! domain state is never touched from this task (spec §5).

use std::sync::Arc;

use kitchen_bus::AttributeTable;
use tokio::sync::{mpsc, oneshot};
use tonic::{Request, Response, Status};

use crate::proto;
use crate::worker::WorkerCommand;

pub struct RobotService {
    attrs: Arc<AttributeTable>,
    commands: mpsc::Sender<WorkerCommand>,
}

impl RobotService {
    pub fn new(attrs: Arc<AttributeTable>, commands: mpsc::Sender<WorkerCommand>) -> Self {
        Self { attrs, commands }
    }

    pub fn into_router(self) -> tonic::transport::server::Router {
        tonic::transport::Server::builder().add_service(proto::robot_server::RobotServer::new(self))
    }

    async fn read_u32(&self, name: &str) -> u32 {
        match self.attrs.read(name).await {
            Some(kitchen_bus::AttrValue::U32(v)) => v,
            _ => 0,
        }
    }

    async fn read_str(&self, name: &str) -> String {
        match self.attrs.read(name).await {
            Some(kitchen_bus::AttrValue::Str(v)) => v,
            _ => "None".to_owned(),
        }
    }

    async fn read_bool(&self, name: &str) -> bool {
        matches!(self.attrs.read(name).await, Some(kitchen_bus::AttrValue::Bool(true)))
    }

    async fn read_str_array(&self, name: &str) -> Vec<String> {
        match self.attrs.read(name).await {
            Some(kitchen_bus::AttrValue::StrArray(v)) => v,
            _ => Vec::new(),
        }
    }
}

#[tonic::async_trait]
impl proto::robot_server::Robot for RobotService {
    async fn get_robot_state(
        &self,
        _request: Request<proto::GetRobotStateRequest>,
    ) -> Result<Response<proto::GetRobotStateResponse>, Status> {
        Ok(Response::new(proto::GetRobotStateResponse {
            position: self.read_u32("position").await,
            recipe_id: self.read_u32("recipe_id").await,
            dish_name: self.read_str("dish_name").await,
            action_name: self.read_str("action_name").await,
            ingredients: self.read_str("ingredients").await,
            overall_time: self.read_u32("overall_time").await,
            current_tool: self.read_u32("current_tool").await,
            last_equipped_tool: self.read_u32("last_equipped_tool").await,
            capabilities: self.read_str_array("capabilities").await,
            availability: self.read_bool("availability").await,
        }))
    }

    async fn receive_task(
        &self,
        request: Request<proto::ReceiveTaskRequest>,
    ) -> Result<Response<proto::ReceiveTaskResponse>, Status> {
        let req = request.into_inner();
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(WorkerCommand::ReceiveTask {
                recipe_id: req.recipe_id,
                processed_steps: req.processed_steps,
                addressed_position: req.addressed_position,
                reply: tx,
            })
            .await
            .map_err(|_| Status::unavailable("robot worker shut down"))?;
        let (actual_position, accepted) =
            rx.await.map_err(|_| Status::cancelled("robot worker dropped the reply channel"))?;
        Ok(Response::new(proto::ReceiveTaskResponse { actual_position, accepted }))
    }

    async fn handover_finished_order(
        &self,
        _request: Request<proto::HandoverFinishedOrderRequest>,
    ) -> Result<Response<proto::HandoverFinishedOrderResponse>, Status> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(WorkerCommand::HandoverFinishedOrder { reply: tx })
            .await
            .map_err(|_| Status::unavailable("robot worker shut down"))?;
        let (recipe_id, processed_steps, is_finished) =
            rx.await.map_err(|_| Status::cancelled("robot worker dropped the reply channel"))?;
        Ok(Response::new(proto::HandoverFinishedOrderResponse {
            recipe_id,
            processed_steps,
            is_finished,
        }))
    }

    type SubscribeAttributeStream = kitchen_bus::AttrStream;

    async fn subscribe_attribute(
        &self,
        request: Request<proto::SubscribeAttributeRequest>,
    ) -> Result<Response<Self::SubscribeAttributeStream>, Status> {
        let attribute = request.into_inner().attribute;
        Ok(Response::new(self.attrs.subscribe_stream(attribute)))
    }
}
