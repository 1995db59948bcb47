// ABOUTME: Lifecycle of containers on the outer engine.
// ABOUTME: Managed containers are created, started, stopped and discarded through this trait.

use super::sealed::Sealed;
use super::shared_types::{ContainerConfig, ContainerInfo, ContainerState};
use crate::types::ContainerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

#[async_trait]
pub trait ContainerOps: Sealed + Send + Sync {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError>;

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// SIGTERM, then SIGKILL once `grace` has passed.
    async fn stop_container(&self, id: &ContainerId, grace: Duration)
    -> Result<(), ContainerError>;

    /// Deliver `signal` (`SIGKILL`, `SIGHUP`, ...) to the container's PID 1.
    async fn kill_container(&self, id: &ContainerId, signal: &str)
    -> Result<(), ContainerError>;

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError>;

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError>;

    /// Delete a named volume. A volume that does not exist counts as removed.
    async fn remove_volume(&self, name: &str) -> Result<(), ContainerError>;

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError>;

    /// Get rid of a container whatever state it is in.
    ///
    /// A stop that fails for any reason other than the container already
    /// being down is followed by SIGKILL. A container that no longer exists
    /// counts as discarded.
    async fn discard_container(
        &self,
        id: &ContainerId,
        grace: Duration,
    ) -> Result<(), ContainerError> {
        match self.stop_container(id, grace).await {
            Ok(()) | Err(ContainerError::NotRunning(_)) => {}
            Err(ContainerError::NoSuchContainer(_)) => return Ok(()),
            Err(e) => {
                tracing::debug!(id = %id.short(), error = %e, "stop failed, sending SIGKILL");
                let _ = self.kill_container(id, "SIGKILL").await;
            }
        }
        match self.remove_container(id, true).await {
            Ok(()) | Err(ContainerError::NoSuchContainer(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Every pair must match.
    pub labels: HashMap<String, String>,
    /// Substring match on the engine side.
    pub name: Option<String>,
    /// Include containers that are not running.
    pub all: bool,
}

impl ContainerFilters {
    /// Running or not, carrying `key=value`.
    pub fn labelled(key: &str, value: &str) -> Self {
        Self {
            labels: HashMap::from([(key.to_string(), value.to_string())]),
            name: None,
            all: true,
        }
    }
}

/// One row of a container listing.
#[derive(Debug, Clone)]
pub struct ContainerSummary {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    /// "Up 3 minutes" and the like; never parsed.
    pub status: String,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("no such container: {0}")]
    NoSuchContainer(String),

    #[error("name already in use: {0}")]
    NameTaken(String),

    #[error("container {0} is not running")]
    NotRunning(String),

    #[error("container {0} is already running")]
    AlreadyRunning(String),

    #[error("image {0} is not available locally")]
    ImageMissing(String),

    /// The engine refused the request as malformed.
    #[error("engine rejected the request: {0}")]
    Rejected(String),

    #[error("engine error: {0}")]
    Engine(String),
}

impl ContainerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}
