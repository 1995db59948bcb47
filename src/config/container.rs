// ABOUTME: One entry of the `containers` list in nestkeeper.yml.
// ABOUTME: Converted into a ManagedSpec once env values are resolved.

use super::deserialize::deserialize_labels;
use super::env_value::{EnvValue, resolve_env_map};
use crate::error::Result;
use crate::nesting::{InnerEngine, ModeRequest, NestingRequest};
use crate::supervisor::{DesiredState, ManagedSpec, RestartPolicy};
use crate::types::{ContainerName, ImageRef};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerEntry {
    pub name: ContainerName,

    pub image: ImageRef,

    #[serde(default = "default_engine")]
    pub engine: InnerEngine,

    #[serde(default)]
    pub mode: ModeRequest,

    #[serde(default)]
    pub allow_privileged: bool,

    #[serde(default)]
    pub storage_driver: Option<String>,

    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,

    #[serde(default, deserialize_with = "deserialize_labels")]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub command: Option<Vec<String>>,

    #[serde(default)]
    pub desired: DesiredState,

    #[serde(default)]
    pub restart: RestartPolicy,

    #[serde(default = "default_ready_timeout", with = "humantime_serde")]
    pub ready_timeout: Duration,
}

fn default_engine() -> InnerEngine {
    InnerEngine::Docker
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(60)
}

impl ContainerEntry {
    /// Resolve environment references and build the managed spec.
    pub fn to_spec(&self) -> Result<ManagedSpec> {
        let nesting = NestingRequest {
            engine: self.engine,
            mode: self.mode,
            allow_privileged: self.allow_privileged,
            storage_driver: self.storage_driver.clone(),
        };
        Ok(ManagedSpec {
            name: self.name.clone(),
            image: self.image.clone(),
            nesting,
            env: resolve_env_map(&self.env)?,
            labels: self.labels.clone(),
            command: self.command.clone(),
            desired: self.desired,
            restart: self.restart,
            ready_timeout: self.ready_timeout,
        })
    }
}
