// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kitchen-conveyor`: owns the plate ring, moves it, and brokers handover
//! between robots, the Controller, and the Kitchen (spec §4.3).

pub mod config;
pub mod robots;
pub mod service;
pub mod worker;

/// Generated protobuf/gRPC bindings for the `Conveyor`, `Robot`, `Kitchen`
/// and `Controller` services.
pub mod proto {
    tonic::include_proto!("kitchen.v1");
}

pub use config::ConveyorConfig;
pub use service::ConveyorService;
