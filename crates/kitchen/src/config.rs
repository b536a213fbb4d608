// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI configuration for the kitchen agent process (spec §6: "Kitchen and
//! Conveyor take `robot_count:u32`").

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use kitchen_domain::clock::DEFAULT_TIME_UNIT_MS;

/// `kitchen-kitchen`: places random orders and accounts for their outcome.
#[derive(Debug, Parser)]
#[command(name = "kitchen-kitchen", version, about)]
pub struct KitchenConfig {
    /// Number of robots on the ring this kitchen expects to hold sessions
    /// to before its rediscovery loop parks (spec §4.5).
    pub robot_count: u32,

    /// Directory holding `actions.json` and `recipes.json`.
    #[arg(long, env = "KITCHEN_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Address this kitchen's gRPC server listens on.
    #[arg(long, env = "KITCHEN_KITCHEN_LISTEN", default_value = "127.0.0.1:0")]
    pub listen_addr: String,

    /// Discovery directory endpoint.
    #[arg(long, env = "KITCHEN_DISCOVERY_ENDPOINT", default_value = "http://127.0.0.1:4840")]
    pub discovery_endpoint: String,

    /// Rediscovery scan interval, in milliseconds (spec §4.5: "loops every
    /// 1 s").
    #[arg(long, env = "KITCHEN_T_DISCOVER_MS", default_value_t = 1000)]
    pub t_discover_ms: u64,

    /// Simulated `TIME_UNIT`, in milliseconds — the admission gate releases
    /// one queued order every `PLACING_RATE_TICKS` of this unit.
    #[arg(long, env = "KITCHEN_TIME_UNIT_MS", default_value_t = DEFAULT_TIME_UNIT_MS)]
    pub time_unit_ms: u64,

    /// Log level passed to the tracing env-filter.
    #[arg(long, env = "KITCHEN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl KitchenConfig {
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    pub fn t_discover(&self) -> Duration {
        Duration::from_millis(self.t_discover_ms)
    }

    pub fn placing_rate(&self) -> Duration {
        kitchen_domain::clock::ticks(self.time_unit(), kitchen_domain::clock::PLACING_RATE_TICKS)
    }

    pub fn actions_path(&self) -> PathBuf {
        self.data_dir.join("actions.json")
    }

    pub fn recipes_path(&self) -> PathBuf {
        self.data_dir.join("recipes.json")
    }
}
