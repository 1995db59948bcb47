// ABOUTME: Configuration types and parsing for nestkeeper.yml.
// ABOUTME: Handles discovery, YAML parsing, env var interpolation and defaults.

mod container;
mod deserialize;
mod env_value;
mod init;

pub use container::ContainerEntry;
pub use deserialize::RESERVED_LABEL_PREFIX;
pub use env_value::{EnvValue, HostVar, resolve_env_map};
pub use init::init_config;

use crate::error::{Error, Result};
use crate::runtime::RuntimeConfig;
use crate::supervisor::{ManagedSpec, RetryPolicy, SupervisorSettings};
use deserialize::deserialize_containers;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "nestkeeper.yml";
pub const CONFIG_FILENAME_ALT: &str = "nestkeeper.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".nestkeeper/config.yml";

/// Subdirectory of the state directory holding exposed inner sockets.
pub const SOCKETS_DIR: &str = "sockets";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Lock file and inner sockets live here.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default = "default_stop_timeout", with = "humantime_serde")]
    pub stop_timeout: Duration,

    #[serde(deserialize_with = "deserialize_containers")]
    pub containers: NonEmpty<ContainerEntry>,
}

fn default_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading configuration");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Configured state directory, else `$XDG_STATE_HOME/nestkeeper`.
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("state")))
            .map(|base| base.join("nestkeeper"))
            .ok_or_else(|| {
                Error::InvalidConfig("cannot determine a state directory; set state_dir".to_string())
            })
    }

    pub fn container(&self, name: &str) -> Option<&ContainerEntry> {
        self.containers.iter().find(|c| c.name.as_str() == name)
    }

    /// Specs for every configured container, with env values resolved.
    pub fn to_specs(&self) -> Result<Vec<ManagedSpec>> {
        self.containers.iter().map(ContainerEntry::to_spec).collect()
    }

    pub fn supervisor_settings(&self) -> Result<SupervisorSettings> {
        Ok(SupervisorSettings {
            interval: self.interval,
            retry: self.retry.clone(),
            stop_timeout: self.stop_timeout,
            socket_root: Some(self.state_dir()?.join(SOCKETS_DIR)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nesting::{InnerEngine, ModeRequest, NestingMode};
    use crate::supervisor::{DesiredState, RestartPolicy};

    const MINIMAL: &str = r#"
containers:
  - name: ci
    image: docker:27-dind
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.stop_timeout, Duration::from_secs(30));
        assert_eq!(config.retry, RetryPolicy::default());

        let ci = config.containers.first();
        assert_eq!(ci.engine, InnerEngine::Docker);
        assert_eq!(ci.mode, ModeRequest::Auto);
        assert!(!ci.allow_privileged);
        assert_eq!(ci.desired, DesiredState::Running);
        assert_eq!(ci.restart, RestartPolicy::Always);
        assert_eq!(ci.ready_timeout, Duration::from_secs(60));
    }

    #[test]
    fn full_entry_parses() {
        let yaml = r#"
interval: 30s
stop_timeout: 1m
retry:
  max_attempts: 3
  initial_backoff: 100ms
containers:
  - name: builder
    image: quay.io/podman/stable
    engine: podman
    mode: rootless
    storage_driver: vfs
    env:
      LOG_LEVEL: debug
    labels:
      team: infra
    command: ["podman", "system", "service", "--time=0"]
    desired: stopped
    restart: on-failure:5
    ready_timeout: 2m
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_backoff, Duration::from_millis(100));

        let spec = &config.to_specs().unwrap()[0];
        assert_eq!(spec.nesting.engine, InnerEngine::Podman);
        assert_eq!(spec.nesting.mode, ModeRequest::Only(NestingMode::Rootless));
        assert_eq!(spec.nesting.storage_driver.as_deref(), Some("vfs"));
        assert_eq!(spec.env["LOG_LEVEL"], "debug");
        assert_eq!(spec.desired, DesiredState::Stopped);
        assert_eq!(spec.restart, RestartPolicy::OnFailure { max_restarts: Some(5) });
        assert_eq!(spec.ready_timeout, Duration::from_secs(120));
    }

    #[test]
    fn empty_container_list_is_rejected() {
        let err = Config::from_yaml("containers: []\n").unwrap_err();
        assert!(err.to_string().contains("at least one container"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let yaml = r#"
containers:
  - name: ci
    image: docker:dind
  - name: ci
    image: docker:dind
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn reserved_labels_are_rejected() {
        let yaml = r#"
containers:
  - name: ci
    image: docker:dind
    labels:
      nestkeeper.name: other
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = r#"
containers:
  - name: ci
    image: docker:dind
    privileged: true
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn explicit_state_dir_sets_socket_root() {
        let yaml = format!("state_dir: /var/lib/nk\n{MINIMAL}");
        let config = Config::from_yaml(&yaml).unwrap();
        let settings = config.supervisor_settings().unwrap();
        assert_eq!(settings.socket_root, Some(PathBuf::from("/var/lib/nk/sockets")));
    }

    #[test]
    fn discover_prefers_root_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".nestkeeper")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_DIR), MINIMAL.replace("ci", "nested")).unwrap();
        assert_eq!(
            Config::discover(dir.path()).unwrap().containers.first().name.as_str(),
            "nested"
        );

        std::fs::write(dir.path().join(CONFIG_FILENAME), MINIMAL).unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap().containers.first().name.as_str(), "ci");
    }

    #[test]
    fn discover_without_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::discover(dir.path()),
            Err(Error::ConfigNotFound(_))
        ));
    }
}
