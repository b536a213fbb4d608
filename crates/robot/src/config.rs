// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI configuration for the robot agent process (spec §6).

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use kitchen_domain::clock::DEFAULT_TIME_UNIT_MS;

/// `kitchen-robot`: executes the contiguous recipe prefix it is capable of.
#[derive(Debug, Parser)]
#[command(name = "kitchen-robot", version, about)]
pub struct RobotConfig {
    /// This robot's fixed position on the conveyor ring.
    pub position: u32,

    /// Capabilities file name, resolved under `<data-dir>/capabilities/`.
    pub capabilities_file: PathBuf,

    /// Directory holding `actions.json`, `recipes.json`, and `capabilities/`.
    #[arg(long, env = "KITCHEN_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Address this robot's gRPC server listens on.
    #[arg(long, env = "KITCHEN_ROBOT_LISTEN", default_value = "127.0.0.1:0")]
    pub listen_addr: String,

    /// Discovery directory endpoint.
    #[arg(long, env = "KITCHEN_DISCOVERY_ENDPOINT", default_value = "http://127.0.0.1:4840")]
    pub discovery_endpoint: String,

    /// Simulated `TIME_UNIT`, in milliseconds.
    #[arg(long, env = "KITCHEN_TIME_UNIT_MS", default_value_t = DEFAULT_TIME_UNIT_MS)]
    pub time_unit_ms: u64,

    /// Log level passed to the tracing env-filter.
    #[arg(long, env = "KITCHEN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl RobotConfig {
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    pub fn actions_path(&self) -> PathBuf {
        self.data_dir.join("actions.json")
    }

    pub fn recipes_path(&self) -> PathBuf {
        self.data_dir.join("recipes.json")
    }

    pub fn capabilities_path(&self) -> PathBuf {
        self.data_dir.join("capabilities").join(&self.capabilities_file)
    }
}
