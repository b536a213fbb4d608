// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end harness for the kitchen simulation: spawns the real
//! `kitchen-discovery`, `kitchen-kitchen`, `kitchen-controller`,
//! `kitchen-conveyor`, and `kitchen-robot` binaries as subprocesses and
//! exercises the running system over gRPC.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use kitchen_controller::proto::conveyor_client::ConveyorClient;
use kitchen_controller::proto::controller_client::ControllerClient;
use kitchen_controller::proto::kitchen_client::KitchenClient;
use kitchen_controller::proto::robot_client::RobotClient;
use tonic::transport::Channel;

/// Resolve the path to a compiled workspace binary.
pub fn workspace_binary(name: &str) -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join(name)
}

/// Absolute path to the repo's sample `data/` fixtures.
pub fn data_dir() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("data")
}

/// Find a free TCP address by binding to :0 then releasing it.
pub fn free_addr() -> anyhow::Result<String> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(format!("127.0.0.1:{}", listener.local_addr()?.port()))
}

/// A spawned agent subprocess, killed on drop.
struct AgentProcess {
    child: Child,
}

impl AgentProcess {
    fn spawn(name: &str, args: &[String]) -> anyhow::Result<Self> {
        let binary = workspace_binary(name);
        anyhow::ensure!(
            binary.exists(),
            "{} not found at {}; run `cargo build --workspace` first",
            name,
            binary.display()
        );
        let child = Command::new(&binary)
            .args(args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(Self { child })
    }
}

impl Drop for AgentProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Dial `endpoint` until it accepts connections or `timeout` elapses.
pub async fn connect(endpoint: &str, timeout: Duration) -> anyhow::Result<Channel> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match Channel::from_shared(endpoint.to_owned())?.connect().await {
            Ok(channel) => return Ok(channel),
            Err(e) => {
                if tokio::time::Instant::now() > deadline {
                    anyhow::bail!("{endpoint} never accepted a connection: {e}");
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}

/// One robot's fixed ring position and the capability file it starts with.
#[derive(Clone)]
pub struct RobotSpec {
    pub position: u32,
    pub capabilities_file: &'static str,
}

/// A fully wired cluster: discovery directory, kitchen, controller,
/// conveyor, and however many robots the test asked for.
pub struct Cluster {
    _discovery: AgentProcess,
    _kitchen: AgentProcess,
    _controller: AgentProcess,
    _conveyor: AgentProcess,
    _robots: Vec<AgentProcess>,
    pub discovery_endpoint: String,
    pub kitchen_endpoint: String,
    pub controller_endpoint: String,
    pub conveyor_endpoint: String,
    pub robot_endpoints: Vec<String>,
}

/// How fast the simulated clock ticks in a test cluster. Small enough that
/// a multi-step recipe finishes in well under a second of wall time.
pub const TEST_TIME_UNIT_MS: u64 = 15;

impl Cluster {
    /// Boot a cluster with the given robots. `robot_count` is passed to the
    /// kitchen and conveyor so their rediscovery loops know how many
    /// sessions to hold before parking.
    pub async fn start(robots: &[RobotSpec]) -> anyhow::Result<Self> {
        let data_dir = data_dir();
        let robot_count = robots.len() as u32;

        let discovery_addr = free_addr()?;
        let discovery = AgentProcess::spawn(
            "kitchen-discovery",
            &[
                "--listen-addr".into(),
                discovery_addr.clone(),
                "--log-level".into(),
                "warn".into(),
            ],
        )?;
        let discovery_endpoint = format!("http://{discovery_addr}");
        connect(&discovery_endpoint, Duration::from_secs(10)).await?;

        let kitchen_addr = free_addr()?;
        let kitchen = AgentProcess::spawn(
            "kitchen-kitchen",
            &[
                robot_count.to_string(),
                "--data-dir".into(),
                data_dir.to_string_lossy().into_owned(),
                "--listen-addr".into(),
                kitchen_addr.clone(),
                "--discovery-endpoint".into(),
                discovery_endpoint.clone(),
                "--time-unit-ms".into(),
                TEST_TIME_UNIT_MS.to_string(),
                "--t-discover-ms".into(),
                "50".into(),
                "--log-level".into(),
                "warn".into(),
            ],
        )?;
        let kitchen_endpoint = format!("http://{kitchen_addr}");

        let controller_addr = free_addr()?;
        let controller = AgentProcess::spawn(
            "kitchen-controller",
            &[
                "--data-dir".into(),
                data_dir.to_string_lossy().into_owned(),
                "--listen-addr".into(),
                controller_addr.clone(),
                "--discovery-endpoint".into(),
                discovery_endpoint.clone(),
                "--t-discover-ms".into(),
                "50".into(),
                "--log-level".into(),
                "warn".into(),
            ],
        )?;
        let controller_endpoint = format!("http://{controller_addr}");

        let conveyor_addr = free_addr()?;
        let conveyor = AgentProcess::spawn(
            "kitchen-conveyor",
            &[
                robot_count.to_string(),
                "--listen-addr".into(),
                conveyor_addr.clone(),
                "--discovery-endpoint".into(),
                discovery_endpoint.clone(),
                "--time-unit-ms".into(),
                TEST_TIME_UNIT_MS.to_string(),
                "--t-discover-ms".into(),
                "50".into(),
                "--log-level".into(),
                "warn".into(),
            ],
        )?;
        let conveyor_endpoint = format!("http://{conveyor_addr}");

        let mut robot_processes = Vec::with_capacity(robots.len());
        let mut robot_endpoints = Vec::with_capacity(robots.len());
        for spec in robots {
            let robot_addr = free_addr()?;
            let process = AgentProcess::spawn(
                "kitchen-robot",
                &[
                    spec.position.to_string(),
                    spec.capabilities_file.into(),
                    "--data-dir".into(),
                    data_dir.to_string_lossy().into_owned(),
                    "--listen-addr".into(),
                    robot_addr.clone(),
                    "--discovery-endpoint".into(),
                    discovery_endpoint.clone(),
                    "--time-unit-ms".into(),
                    TEST_TIME_UNIT_MS.to_string(),
                    "--log-level".into(),
                    "warn".into(),
                ],
            )?;
            robot_processes.push(process);
            robot_endpoints.push(format!("http://{robot_addr}"));
        }

        let cluster = Self {
            _discovery: discovery,
            _kitchen: kitchen,
            _controller: controller,
            _conveyor: conveyor,
            _robots: robot_processes,
            discovery_endpoint,
            kitchen_endpoint,
            controller_endpoint,
            conveyor_endpoint,
            robot_endpoints,
        };

        connect(&cluster.kitchen_endpoint, Duration::from_secs(10)).await?;
        connect(&cluster.controller_endpoint, Duration::from_secs(10)).await?;
        connect(&cluster.conveyor_endpoint, Duration::from_secs(10)).await?;
        for endpoint in &cluster.robot_endpoints {
            connect(endpoint, Duration::from_secs(10)).await?;
        }

        Ok(cluster)
    }

    pub async fn kitchen_client(&self) -> anyhow::Result<KitchenClient<Channel>> {
        Ok(KitchenClient::new(connect(&self.kitchen_endpoint, Duration::from_secs(5)).await?))
    }

    pub async fn controller_client(&self) -> anyhow::Result<ControllerClient<Channel>> {
        Ok(ControllerClient::new(connect(&self.controller_endpoint, Duration::from_secs(5)).await?))
    }

    pub async fn conveyor_client(&self) -> anyhow::Result<ConveyorClient<Channel>> {
        Ok(ConveyorClient::new(connect(&self.conveyor_endpoint, Duration::from_secs(5)).await?))
    }

    pub async fn robot_client(&self, index: usize) -> anyhow::Result<RobotClient<Channel>> {
        Ok(RobotClient::new(connect(&self.robot_endpoints[index], Duration::from_secs(5)).await?))
    }

    /// Poll `GetCounters` until `pred` holds or `timeout` elapses, returning
    /// the final snapshot either way.
    pub async fn wait_for_counters(
        &self,
        timeout: Duration,
        mut pred: impl FnMut(&kitchen_controller::proto::GetCountersResponse) -> bool,
    ) -> anyhow::Result<kitchen_controller::proto::GetCountersResponse> {
        let mut client = self.kitchen_client().await?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = client
                .get_counters(kitchen_controller::proto::GetCountersRequest {})
                .await?
                .into_inner();
            if pred(&snapshot) {
                return Ok(snapshot);
            }
            if tokio::time::Instant::now() > deadline {
                return Ok(snapshot);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Poll `ListRemoteRobots` until every robot the kitchen expects is
    /// connected, or `timeout` elapses.
    pub async fn wait_for_robot_membership(&self, expected: usize, timeout: Duration) -> anyhow::Result<()> {
        let mut client = self.kitchen_client().await?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let resp = client
                .list_remote_robots(kitchen_controller::proto::ListRemoteRobotsRequest {})
                .await?
                .into_inner();
            if resp.robots.len() >= expected {
                return Ok(());
            }
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("kitchen only discovered {} of {expected} robots", resp.robots.len());
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}
