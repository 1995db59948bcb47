// ABOUTME: Nesting modes, requests, and the container settings a mode implies.
// ABOUTME: A NestingPlan is merged into a ContainerConfig before creation.

use crate::runtime::{
    CgroupnsMode, ContainerConfig, DeviceMapping, MountKind, RuntimeType, SecurityConfig,
    VolumeMount,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directory inside the container that holds the inner engine's API socket.
pub const INNER_SOCKET_DIR: &str = "/run/nestkeeper";

/// The engine running inside a managed container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InnerEngine {
    Docker,
    Podman,
}

impl InnerEngine {
    /// File name of the API socket inside [`INNER_SOCKET_DIR`].
    pub fn socket_file(self) -> &'static str {
        match self {
            InnerEngine::Docker => "docker.sock",
            InnerEngine::Podman => "podman.sock",
        }
    }

    /// API flavour spoken on the inner socket.
    pub fn runtime_type(self) -> RuntimeType {
        match self {
            InnerEngine::Docker => RuntimeType::Docker,
            InnerEngine::Podman => RuntimeType::Podman,
        }
    }

    /// In-container path of the API socket.
    pub fn socket_path(self) -> String {
        format!("{INNER_SOCKET_DIR}/{}", self.socket_file())
    }

    /// Where image layers and containers are kept.
    pub fn data_root(self, mode: NestingMode) -> &'static str {
        match (self, mode) {
            (InnerEngine::Docker, _) => "/var/lib/docker",
            (InnerEngine::Podman, NestingMode::Rootless) => "/home/podman/.local/share/containers",
            (InnerEngine::Podman, _) => "/var/lib/containers",
        }
    }

    /// Daemon invocation serving the API on [`InnerEngine::socket_path`].
    pub fn daemon_command(self, storage_driver: &str) -> Vec<String> {
        let socket = format!("unix://{}", self.socket_path());
        match self {
            InnerEngine::Docker => vec![
                "dockerd".to_string(),
                format!("--host={socket}"),
                format!("--storage-driver={storage_driver}"),
            ],
            InnerEngine::Podman => {
                let mut cmd = vec!["podman".to_string()];
                // Podman has no fuse-overlayfs driver; it is overlay with a mount helper.
                if storage_driver == "fuse-overlayfs" {
                    cmd.push("--storage-driver=overlay".to_string());
                    cmd.push("--storage-opt=overlay.mount_program=/usr/bin/fuse-overlayfs".to_string());
                } else {
                    cmd.push(format!("--storage-driver={storage_driver}"));
                }
                cmd.extend(
                    ["system", "service", "--time=0", socket.as_str()].map(str::to_string),
                );
                cmd
            }
        }
    }
}

impl fmt::Display for InnerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InnerEngine::Docker => f.write_str("docker"),
            InnerEngine::Podman => f.write_str("podman"),
        }
    }
}

/// How the outer engine grants the inner engine what it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NestingMode {
    /// `--privileged`: every capability, every device, no confinement.
    Privileged,
    /// Unprivileged container with explicit capabilities, `/dev/fuse`, a
    /// private cgroup namespace and unconfined seccomp/AppArmor.
    Delegated,
    /// Podman as an unprivileged user inside a user namespace.
    Rootless,
}

impl NestingMode {
    /// Order tried by `ModeRequest::Auto`, least privilege first.
    pub const AUTO_ORDER: [NestingMode; 3] = [
        NestingMode::Rootless,
        NestingMode::Delegated,
        NestingMode::Privileged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NestingMode::Privileged => "privileged",
            NestingMode::Delegated => "delegated",
            NestingMode::Rootless => "rootless",
        }
    }
}

impl fmt::Display for NestingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode preference from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum ModeRequest {
    #[default]
    Auto,
    Only(NestingMode),
}

impl FromStr for ModeRequest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ModeRequest::Auto),
            "privileged" => Ok(ModeRequest::Only(NestingMode::Privileged)),
            "delegated" => Ok(ModeRequest::Only(NestingMode::Delegated)),
            "rootless" => Ok(ModeRequest::Only(NestingMode::Rootless)),
            other => Err(format!(
                "unknown nesting mode '{other}', expected auto, privileged, delegated or rootless"
            )),
        }
    }
}

impl<'de> Deserialize<'de> for ModeRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for ModeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeRequest::Auto => f.write_str("auto"),
            ModeRequest::Only(mode) => mode.fmt(f),
        }
    }
}

/// What a managed container asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NestingRequest {
    pub engine: InnerEngine,
    pub mode: ModeRequest,
    /// Policy switch; privileged mode is never chosen without it.
    pub allow_privileged: bool,
    /// Overrides the mode's default storage driver.
    pub storage_driver: Option<String>,
}

impl NestingRequest {
    pub fn new(engine: InnerEngine) -> Self {
        Self {
            engine,
            mode: ModeRequest::Auto,
            allow_privileged: false,
            storage_driver: None,
        }
    }
}

/// Negotiated settings for one nested engine container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestingPlan {
    pub engine: InnerEngine,
    pub mode: NestingMode,
    pub security: SecurityConfig,
    pub tmpfs: HashMap<String, String>,
    pub storage_driver: String,
    /// Mount point of the storage volume inside the container.
    pub data_root: String,
    pub command: Vec<String>,
    pub env: HashMap<String, String>,
    /// User the daemon runs as, when the image default is wrong for the mode.
    pub user: Option<String>,
    pub socket_in_container: String,
    /// Host directory bind-mounted over [`INNER_SOCKET_DIR`].
    pub host_socket_dir: Option<PathBuf>,
}

impl NestingPlan {
    pub(crate) fn build(request: &NestingRequest, mode: NestingMode) -> Self {
        let engine = request.engine;
        let storage_driver = request.storage_driver.clone().unwrap_or_else(|| {
            match (mode, engine) {
                (NestingMode::Privileged, InnerEngine::Docker) => "overlay2",
                (NestingMode::Privileged, InnerEngine::Podman) => "overlay",
                _ => "fuse-overlayfs",
            }
            .to_string()
        });

        let mut env = HashMap::new();
        let mut user = None;
        let security = match mode {
            NestingMode::Privileged => SecurityConfig {
                privileged: true,
                cgroupns: Some(CgroupnsMode::Private),
                ..Default::default()
            },
            NestingMode::Delegated => SecurityConfig {
                cap_add: ["SYS_ADMIN", "NET_ADMIN", "MKNOD", "SYS_RESOURCE", "SETFCAP"]
                    .map(str::to_string)
                    .to_vec(),
                devices: vec![
                    DeviceMapping::passthrough("/dev/fuse"),
                    DeviceMapping::passthrough("/dev/net/tun"),
                ],
                security_opt: [
                    "seccomp=unconfined",
                    "apparmor=unconfined",
                    "label=disable",
                    "systempaths=unconfined",
                ]
                .map(str::to_string)
                .to_vec(),
                cgroupns: Some(CgroupnsMode::Private),
                ..Default::default()
            },
            NestingMode::Rootless => {
                user = Some("podman".to_string());
                SecurityConfig {
                    cap_add: vec!["SETUID".to_string(), "SETGID".to_string()],
                    devices: vec![DeviceMapping::passthrough("/dev/fuse")],
                    security_opt: ["seccomp=unconfined", "label=disable"]
                        .map(str::to_string)
                        .to_vec(),
                    ..Default::default()
                }
            }
        };

        if engine == InnerEngine::Docker {
            // The dind image generates TLS material unless told not to.
            env.insert("DOCKER_TLS_CERTDIR".to_string(), String::new());
        }

        Self {
            engine,
            mode,
            security,
            tmpfs: HashMap::from([
                ("/run".to_string(), "rw,nosuid,nodev,exec".to_string()),
                ("/tmp".to_string(), "rw,nosuid,nodev".to_string()),
            ]),
            data_root: engine.data_root(mode).to_string(),
            command: engine.daemon_command(&storage_driver),
            storage_driver,
            env,
            user,
            socket_in_container: engine.socket_path(),
            host_socket_dir: None,
        }
    }

    /// Expose the inner socket through `dir` on the host.
    pub fn expose_socket_at(mut self, dir: impl Into<PathBuf>) -> Self {
        self.host_socket_dir = Some(dir.into());
        self
    }

    /// Host-side path of the inner engine's API socket.
    pub fn inner_socket_on_host(&self) -> Option<PathBuf> {
        self.host_socket_dir
            .as_deref()
            .map(|dir| dir.join(self.engine.socket_file()))
    }

    /// Named volume holding the inner engine's storage for container `name`.
    pub fn storage_volume_name(name: &str) -> String {
        format!("nestkeeper-{name}-data")
    }

    /// Merge the plan into `config`. Explicit command, user and env entries
    /// already on the config win.
    pub fn apply(&self, config: &mut ContainerConfig) {
        config.security = self.security.clone();
        for (target, opts) in &self.tmpfs {
            config
                .tmpfs
                .entry(target.clone())
                .or_insert_with(|| opts.clone());
        }

        config.volumes.push(VolumeMount {
            source: Self::storage_volume_name(config.name.as_str()),
            target: self.data_root.clone(),
            read_only: false,
            kind: MountKind::Volume,
        });
        if let Some(dir) = &self.host_socket_dir {
            config.volumes.push(VolumeMount {
                source: path_string(dir),
                target: INNER_SOCKET_DIR.to_string(),
                read_only: false,
                kind: MountKind::Bind,
            });
        }

        if config.command.is_none() {
            config.command = Some(self.command.clone());
        }
        if config.user.is_none() {
            config.user = self.user.clone();
        }
        for (key, value) in &self.env {
            config
                .env
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContainerName, ImageRef};

    fn config() -> ContainerConfig {
        ContainerConfig::new(
            ContainerName::new("ci-runner").unwrap(),
            ImageRef::parse("docker:27-dind").unwrap(),
        )
    }

    #[test]
    fn privileged_docker_uses_overlay2() {
        let plan = NestingPlan::build(&NestingRequest::new(InnerEngine::Docker), NestingMode::Privileged);
        assert!(plan.security.privileged);
        assert_eq!(plan.storage_driver, "overlay2");
        assert_eq!(
            plan.command,
            vec![
                "dockerd",
                "--host=unix:///run/nestkeeper/docker.sock",
                "--storage-driver=overlay2"
            ]
        );
    }

    #[test]
    fn rootless_podman_runs_as_podman_with_fuse_overlay() {
        let plan = NestingPlan::build(&NestingRequest::new(InnerEngine::Podman), NestingMode::Rootless);
        assert!(!plan.security.privileged);
        assert_eq!(plan.user.as_deref(), Some("podman"));
        assert_eq!(plan.storage_driver, "fuse-overlayfs");
        assert!(plan.command.contains(&"--storage-driver=overlay".to_string()));
        assert_eq!(plan.data_root, "/home/podman/.local/share/containers");
    }

    #[test]
    fn storage_override_wins() {
        let mut request = NestingRequest::new(InnerEngine::Docker);
        request.storage_driver = Some("vfs".into());
        let plan = NestingPlan::build(&request, NestingMode::Delegated);
        assert_eq!(plan.storage_driver, "vfs");
    }

    #[test]
    fn apply_merges_without_clobbering_explicit_settings() {
        let plan = NestingPlan::build(&NestingRequest::new(InnerEngine::Docker), NestingMode::Delegated)
            .expose_socket_at("/var/lib/nestkeeper/sockets/ci-runner");
        let mut cfg = config();
        cfg.command = Some(vec!["dockerd".into(), "--debug".into()]);
        cfg.env.insert("DOCKER_TLS_CERTDIR".into(), "/certs".into());

        plan.apply(&mut cfg);

        assert_eq!(cfg.command, Some(vec!["dockerd".into(), "--debug".into()]));
        assert_eq!(cfg.env["DOCKER_TLS_CERTDIR"], "/certs");
        assert_eq!(cfg.security.cgroupns, Some(CgroupnsMode::Private));
        assert!(cfg.tmpfs.contains_key("/run"));
        assert!(cfg.volumes.iter().any(|v| v.kind == MountKind::Volume
            && v.source == "nestkeeper-ci-runner-data"
            && v.target == "/var/lib/docker"));
        assert!(cfg.volumes.iter().any(|v| v.kind == MountKind::Bind
            && v.target == INNER_SOCKET_DIR));
        assert_eq!(
            plan.inner_socket_on_host(),
            Some(PathBuf::from("/var/lib/nestkeeper/sockets/ci-runner/docker.sock"))
        );
    }

    #[test]
    fn mode_request_parses() {
        assert_eq!("auto".parse::<ModeRequest>(), Ok(ModeRequest::Auto));
        assert_eq!(
            "rootless".parse::<ModeRequest>(),
            Ok(ModeRequest::Only(NestingMode::Rootless))
        );
        assert!("root".parse::<ModeRequest>().is_err());
    }
}
