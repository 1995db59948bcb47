// ABOUTME: Desired state of one managed container and the labels that track it.
// ABOUTME: The fingerprint covers every field whose change requires a recreate.

use super::restart::RestartPolicy;
use crate::nesting::{InnerEngine, NestingMode, NestingPlan, NestingRequest};
use crate::runtime::{ContainerConfig, RestartPolicyConfig};
use crate::types::{ContainerName, ImageRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

pub const LABEL_MANAGED: &str = "nestkeeper.managed";
pub const LABEL_NAME: &str = "nestkeeper.name";
pub const LABEL_FINGERPRINT: &str = "nestkeeper.fingerprint";
pub const LABEL_MODE: &str = "nestkeeper.mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Running,
    Stopped,
    Absent,
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DesiredState::Running => "running",
            DesiredState::Stopped => "stopped",
            DesiredState::Absent => "absent",
        })
    }
}

/// One container nestkeeper keeps in its desired state.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedSpec {
    pub name: ContainerName,
    pub image: ImageRef,
    pub nesting: NestingRequest,
    /// Resolved environment.
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub command: Option<Vec<String>>,
    pub desired: DesiredState,
    pub restart: RestartPolicy,
    /// How long the inner engine may take to answer after start.
    pub ready_timeout: Duration,
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    image: String,
    engine: InnerEngine,
    mode: String,
    allow_privileged: bool,
    storage_driver: Option<&'a str>,
    env: &'a BTreeMap<String, String>,
    labels: &'a BTreeMap<String, String>,
    command: Option<&'a [String]>,
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

impl ManagedSpec {
    pub fn new(name: ContainerName, image: ImageRef, engine: InnerEngine) -> Self {
        Self {
            name,
            image,
            nesting: NestingRequest::new(engine),
            env: BTreeMap::new(),
            labels: BTreeMap::new(),
            command: None,
            desired: DesiredState::Running,
            restart: RestartPolicy::default(),
            ready_timeout: Duration::from_secs(60),
        }
    }

    /// Stable 16-digit hex hash, identical across processes and releases.
    pub fn fingerprint(&self) -> String {
        let input = FingerprintInput {
            image: self.image.to_string(),
            engine: self.nesting.engine,
            mode: self.nesting.mode.to_string(),
            allow_privileged: self.nesting.allow_privileged,
            storage_driver: self.nesting.storage_driver.as_deref(),
            env: &self.env,
            labels: &self.labels,
            command: self.command.as_deref(),
        };
        // Maps are ordered, so the encoding is canonical.
        let encoded = serde_json::to_vec(&input).unwrap_or_default();
        format!("{:016x}", fnv1a(&encoded))
    }

    /// Labels that mark a container as ours.
    pub fn managed_labels(&self, mode: NestingMode) -> HashMap<String, String> {
        HashMap::from([
            (LABEL_MANAGED.to_string(), "true".to_string()),
            (LABEL_NAME.to_string(), self.name.to_string()),
            (LABEL_FINGERPRINT.to_string(), self.fingerprint()),
            (LABEL_MODE.to_string(), mode.to_string()),
        ])
    }

    /// Engine configuration for this container under `plan`.
    ///
    /// The engine's own restart policy stays off; restarts are decided here.
    pub fn container_config(&self, plan: &NestingPlan) -> ContainerConfig {
        let mut config = ContainerConfig::new(self.name.clone(), self.image.clone());
        config.env = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        config.labels = self
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        config.labels.extend(self.managed_labels(plan.mode));
        config.command = self.command.clone();
        config.restart_policy = RestartPolicyConfig::No;
        plan.apply(&mut config);
        config
    }
}
