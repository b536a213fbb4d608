// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kitchen-robot`: executes recipe prefixes and hands finished rounds off
//! to the Conveyor (spec §4.2).

pub mod config;
pub mod service;
pub mod worker;

/// Generated protobuf/gRPC bindings for the `Robot` and `Conveyor` services.
pub mod proto {
    tonic::include_proto!("kitchen.v1");
}

pub use config::RobotConfig;
pub use service::RobotService;
