// ABOUTME: Health status of a managed container and of its inner engine.
// ABOUTME: Maps inspect results to a status and pings the inner engine socket.

use crate::nesting::InnerEngine;
use crate::runtime::{
    BollardRuntime, ContainerError, ContainerInfo, ContainerOps, ContainerState, HealthState,
    RuntimeInfo, RuntimeSocket,
};
use crate::types::ContainerId;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Starting,
    Unhealthy(String),
    Down(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Status implied by an inspect result.
    pub fn from_info(info: &ContainerInfo) -> Self {
        match info.state {
            ContainerState::Running => match info.health {
                Some(HealthState::Starting) => HealthStatus::Starting,
                Some(HealthState::Unhealthy) => {
                    HealthStatus::Unhealthy("container healthcheck is failing".to_string())
                }
                Some(HealthState::Healthy) | Some(HealthState::None) | None => HealthStatus::Healthy,
            },
            ContainerState::Created | ContainerState::Restarting => HealthStatus::Starting,
            ContainerState::Paused => HealthStatus::Unhealthy("container is paused".to_string()),
            ContainerState::Removing => HealthStatus::Down("container is being removed".to_string()),
            ContainerState::Exited | ContainerState::Dead => {
                HealthStatus::Down(exit_reason(info.exit_code, info.oom_killed))
            }
        }
    }
}

fn exit_reason(exit_code: Option<i64>, oom_killed: bool) -> String {
    match (oom_killed, exit_code) {
        (true, _) => "killed: out of memory".to_string(),
        (false, Some(code)) => format!("exited with code {code}"),
        (false, None) => "not running".to_string(),
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => f.write_str("healthy"),
            HealthStatus::Starting => f.write_str("starting"),
            HealthStatus::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
            HealthStatus::Down(reason) => write!(f, "down: {reason}"),
        }
    }
}

/// Inspect container `id` and classify it.
pub async fn probe_container(
    runtime: &impl ContainerOps,
    id: &ContainerId,
) -> Result<HealthStatus, ContainerError> {
    match runtime.inspect_container(id).await {
        Ok(info) => Ok(HealthStatus::from_info(&info)),
        Err(ContainerError::NoSuchContainer(_)) => Ok(HealthStatus::Down("container not found".to_string())),
        Err(e) => Err(e),
    }
}

/// Ping the inner engine through its host-side socket.
///
/// A socket that does not exist yet means the daemon is still booting.
pub async fn probe_inner_engine(engine: InnerEngine, socket: &Path, timeout: Duration) -> HealthStatus {
    if !socket.exists() {
        return HealthStatus::Starting;
    }
    let target = RuntimeSocket {
        runtime_type: engine.runtime_type(),
        socket_path: socket.to_string_lossy().into_owned(),
    };
    let runtime = match BollardRuntime::connect(&target) {
        Ok(runtime) => runtime,
        Err(e) => return HealthStatus::Unhealthy(format!("inner {engine} socket: {e}")),
    };
    match tokio::time::timeout(timeout, runtime.ping()).await {
        Ok(Ok(())) => HealthStatus::Healthy,
        Ok(Err(e)) => HealthStatus::Unhealthy(format!("inner {engine} ping failed: {e}")),
        Err(_) => HealthStatus::Unhealthy(format!(
            "inner {engine} did not answer within {}ms",
            timeout.as_millis()
        )),
    }
}
