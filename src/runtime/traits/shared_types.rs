// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerConfig, SecurityConfig, ContainerInfo, ExecConfig, RuntimeMetadata.

use crate::types::{ContainerId, ContainerName, ImageRef};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Configuration for creating a container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub name: ContainerName,
    pub image: ImageRef,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    /// Command to run (overrides image CMD).
    pub command: Option<Vec<String>>,
    /// Entrypoint (overrides image ENTRYPOINT).
    pub entrypoint: Option<Vec<String>>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    /// Restart policy enforced by the engine itself.
    pub restart_policy: RestartPolicyConfig,
    pub resources: Option<ResourceLimits>,
    pub healthcheck: Option<HealthcheckConfig>,
    pub stop_timeout: Option<Duration>,
    pub volumes: Vec<VolumeMount>,
    /// Target path to mount options, e.g. `/run` -> `rw,nosuid,size=64m`.
    pub tmpfs: HashMap<String, String>,
    /// `bridge`, `host`, `none` or a network name.
    pub network_mode: Option<String>,
    pub security: SecurityConfig,
}

impl ContainerConfig {
    /// Minimal config; everything else takes the engine's defaults.
    pub fn new(name: ContainerName, image: ImageRef) -> Self {
        Self {
            name,
            image,
            env: HashMap::new(),
            labels: HashMap::new(),
            command: None,
            entrypoint: None,
            working_dir: None,
            user: None,
            restart_policy: RestartPolicyConfig::default(),
            resources: None,
            healthcheck: None,
            stop_timeout: None,
            volumes: Vec::new(),
            tmpfs: HashMap::new(),
            network_mode: None,
            security: SecurityConfig::default(),
        }
    }
}

/// Privilege, namespace and cgroup settings for a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityConfig {
    pub privileged: bool,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub devices: Vec<DeviceMapping>,
    /// Raw `--security-opt` values such as `seccomp=unconfined`.
    pub security_opt: Vec<String>,
    pub cgroupns: Option<CgroupnsMode>,
    /// `host`, `keep-id`, `auto` etc. Passed through verbatim.
    pub userns_mode: Option<String>,
    pub cgroup_parent: Option<String>,
}

/// Host device exposed to the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMapping {
    pub path_on_host: String,
    pub path_in_container: String,
    /// Cgroup permissions, a combination of `r`, `w` and `m`.
    pub permissions: String,
}

impl DeviceMapping {
    /// Same path on both sides with full `rwm` access.
    pub fn passthrough(path: &str) -> Self {
        Self {
            path_on_host: path.to_string(),
            path_in_container: path.to_string(),
            permissions: "rwm".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupnsMode {
    Private,
    Host,
}

/// Volume mount configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Host path for bind mounts, volume name for named volumes.
    pub source: String,
    /// Target path in container.
    pub target: String,
    pub read_only: bool,
    pub kind: MountKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    Bind,
    Volume,
}

/// Restart policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RestartPolicyConfig {
    /// Never restart. Supervised containers use this; restarts are ours.
    #[default]
    No,
    Always,
    UnlessStopped,
    OnFailure { max_retries: Option<u32> },
}

/// Resource limits for a container.
#[derive(Debug, Clone, Default)]
pub struct ResourceLimits {
    /// Memory limit in bytes.
    pub memory: Option<u64>,
    /// CPU quota (1.0 = 1 CPU).
    pub cpus: Option<f64>,
}

/// Healthcheck configuration for a container.
#[derive(Debug, Clone)]
pub struct HealthcheckConfig {
    pub test: Vec<String>,
    pub interval: Duration,
    pub timeout: Duration,
    pub retries: u32,
    pub start_period: Duration,
}

/// Information about a container as reported by inspect.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    /// Present only when the container has a healthcheck.
    pub health: Option<HealthState>,
    /// Exit code of the last run; meaningful once the container has exited.
    pub exit_code: Option<i64>,
    pub oom_killed: bool,
    pub restart_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub labels: HashMap<String, String>,
}

/// Container state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl ContainerState {
    /// Parse the lowercase state names used by the engine APIs.
    ///
    /// Podman's `stopping`/`stopped` and anything unknown count as exited.
    pub fn from_api(state: &str) -> Self {
        match state {
            "created" | "configured" | "initialized" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "dead" => Self::Dead,
            _ => Self::Exited,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, Self::Running | Self::Restarting)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
        })
    }
}

/// Health state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Healthy,
    Unhealthy,
    None,
}

/// Registry authentication credentials.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
    /// Registry server (e.g., "ghcr.io").
    pub server: Option<String>,
}

/// Runtime metadata.
#[derive(Debug, Clone)]
pub struct RuntimeMetadata {
    /// Runtime name (e.g., "Docker", "Podman").
    pub name: String,
    pub version: String,
    pub api_version: String,
    pub os: String,
    pub arch: String,
    /// The daemon itself runs without root (rootless Docker or Podman).
    pub rootless: bool,
}

/// Exec configuration for running commands in containers.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub cmd: Vec<String>,
    /// `KEY=value` entries.
    pub env: Vec<String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub attach_stdin: bool,
    pub attach_stdout: bool,
    pub attach_stderr: bool,
    pub tty: bool,
    pub privileged: bool,
}

impl ExecConfig {
    /// Run `cmd` with output captured.
    pub fn command(cmd: Vec<String>) -> Self {
        Self {
            cmd,
            ..Default::default()
        }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            cmd: Vec::new(),
            env: Vec::new(),
            working_dir: None,
            user: None,
            attach_stdin: false,
            attach_stdout: true,
            attach_stderr: true,
            tty: false,
            privileged: false,
        }
    }
}

/// Result of an exec operation.
#[derive(Debug, Clone)]
pub struct ExecResult {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}
