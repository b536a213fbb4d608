// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI configuration for the conveyor agent process (spec §6: "Kitchen and
//! Conveyor take `robot_count:u32`").

use std::time::Duration;

use clap::Parser;
use kitchen_domain::clock::DEFAULT_TIME_UNIT_MS;

/// `kitchen-conveyor`: owns the plate ring and brokers handover between
/// robots, the controller, and the kitchen.
#[derive(Debug, Parser)]
#[command(name = "kitchen-conveyor", version, about)]
pub struct ConveyorConfig {
    /// Number of robot positions on the ring (plus one output slot).
    pub robot_count: u32,

    /// Address this conveyor's gRPC server listens on.
    #[arg(long, env = "KITCHEN_CONVEYOR_LISTEN", default_value = "127.0.0.1:0")]
    pub listen_addr: String,

    /// Discovery directory endpoint.
    #[arg(long, env = "KITCHEN_DISCOVERY_ENDPOINT", default_value = "http://127.0.0.1:4840")]
    pub discovery_endpoint: String,

    /// Discovery scan interval, in milliseconds (spec §4.4/§4.5: T_DISCOVER).
    #[arg(long, env = "KITCHEN_T_DISCOVER_MS", default_value_t = 1000)]
    pub t_discover_ms: u64,

    /// Simulated `TIME_UNIT`, in milliseconds (belt movement rate).
    #[arg(long, env = "KITCHEN_TIME_UNIT_MS", default_value_t = DEFAULT_TIME_UNIT_MS)]
    pub time_unit_ms: u64,

    /// Log level passed to the tracing env-filter.
    #[arg(long, env = "KITCHEN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ConveyorConfig {
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    pub fn t_discover(&self) -> Duration {
        Duration::from_millis(self.t_discover_ms)
    }

    /// Ring size: one plate per robot position plus the output slot.
    pub fn ring_size(&self) -> u32 {
        self.robot_count + 1
    }
}
