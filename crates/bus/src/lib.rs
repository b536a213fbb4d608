// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `kitchen-bus`: the generic node-bus transport shared by every agent.
//!
//! This crate is the "external collaborator" the simulation's agents depend
//! on but none of them own: a typed attribute store, a discovery directory
//! service/client pair, and a reconnecting gRPC channel wrapper. Nothing in
//! here knows about kitchens, robots, recipes or plates — that domain
//! vocabulary lives in `kitchen-domain` and the per-agent crates.

pub mod attributes;
pub mod client;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod shutdown;

/// Generated protobuf/gRPC bindings for `kitchen.bus.v1`.
pub mod proto {
    tonic::include_proto!("kitchen.bus.v1");
}

pub use attributes::{AttrStream, AttrValue, AttributeTable};
pub use client::{ReconnectingChannel, CALL_TIMEOUT, CONNECT_TIMEOUT};
pub use error::BusError;
pub use shutdown::install_signal_handlers;
