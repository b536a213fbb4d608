// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kitchen-controller`: selects which robot should cook the next prefix of
//! a recipe (spec §4.4).

pub mod config;
pub mod membership;
pub mod selection;
pub mod service;
pub mod strategy;

/// Generated protobuf/gRPC bindings for the `Controller` and `Robot`
/// services.
pub mod proto {
    tonic::include_proto!("kitchen.v1");
}

pub use config::ControllerConfig;
pub use membership::Membership;
pub use service::ControllerService;
pub use strategy::{Strategy, StrategyDecision};
