// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kitchen-kitchen`: places orders into the simulation and accounts for
//! their outcome (spec §4.5).

pub mod config;
pub mod gate;
pub mod robots;
pub mod service;

/// Generated protobuf/gRPC bindings for the `Kitchen`, `Controller` and
/// `Robot` services.
pub mod proto {
    tonic::include_proto!("kitchen.v1");
}

pub use config::KitchenConfig;
pub use robots::RobotMembership;
pub use service::KitchenService;
