// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! gRPC surface for the discovery directory (spec §4.1: `register`,
//! `deregister`, `find_servers`).

use std::sync::Arc;

use tonic::{Request, Response, Status};

use super::registry::DiscoveryRegistry;
use crate::proto;

pub struct DiscoveryService {
    registry: Arc<DiscoveryRegistry>,
}

impl DiscoveryService {
    pub fn new(registry: Arc<DiscoveryRegistry>) -> Self {
        Self { registry }
    }

    pub fn into_router(self) -> tonic::transport::server::Router {
        tonic::transport::Server::builder()
            .add_service(proto::discovery_server::DiscoveryServer::new(self))
    }
}

#[tonic::async_trait]
impl proto::discovery_server::Discovery for DiscoveryService {
    async fn register(
        &self,
        request: Request<proto::RegisterRequest>,
    ) -> Result<Response<proto::RegisterResponse>, Status> {
        let server = request
            .into_inner()
            .server
            .ok_or_else(|| Status::invalid_argument("missing server descriptor"))?;
        let lease_seconds = self.registry.register(server).await;
        Ok(Response::new(proto::RegisterResponse { ok: true, lease_seconds }))
    }

    async fn deregister(
        &self,
        request: Request<proto::DeregisterRequest>,
    ) -> Result<Response<proto::DeregisterResponse>, Status> {
        let ok = self.registry.deregister(&request.into_inner().server_id).await;
        Ok(Response::new(proto::DeregisterResponse { ok }))
    }

    async fn find_servers(
        &self,
        request: Request<proto::FindServersRequest>,
    ) -> Result<Response<proto::FindServersResponse>, Status> {
        let object_type = request.into_inner().object_type;
        let servers = self.registry.find_servers(object_type.as_deref()).await;
        Ok(Response::new(proto::FindServersResponse { servers }))
    }
}
