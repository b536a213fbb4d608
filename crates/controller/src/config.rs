// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI configuration for the controller agent process (spec §6: "Controller
//! takes no positional args — membership comes from discovery").

use std::path::PathBuf;

use clap::Parser;

/// `kitchen-controller`: chooses the next robot to cook a recipe's prefix.
#[derive(Debug, Parser)]
#[command(name = "kitchen-controller", version, about)]
pub struct ControllerConfig {
    /// Directory holding `actions.json` and `recipes.json` (spec §3: the
    /// Controller needs the recipe catalog to compute usable prefix length
    /// per candidate robot).
    #[arg(long, env = "KITCHEN_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Address this controller's gRPC server listens on.
    #[arg(long, env = "KITCHEN_CONTROLLER_LISTEN", default_value = "127.0.0.1:0")]
    pub listen_addr: String,

    /// Discovery directory endpoint.
    #[arg(long, env = "KITCHEN_DISCOVERY_ENDPOINT", default_value = "http://127.0.0.1:4840")]
    pub discovery_endpoint: String,

    /// Discovery scan interval, in milliseconds (spec §4.4: T_DISCOVER).
    #[arg(long, env = "KITCHEN_T_DISCOVER_MS", default_value_t = 1000)]
    pub t_discover_ms: u64,

    /// Log level passed to the tracing env-filter.
    #[arg(long, env = "KITCHEN_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ControllerConfig {
    pub fn t_discover(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.t_discover_ms)
    }

    pub fn actions_path(&self) -> PathBuf {
        self.data_dir.join("actions.json")
    }

    pub fn recipes_path(&self) -> PathBuf {
        self.data_dir.join("recipes.json")
    }
}
