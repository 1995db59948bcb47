// ABOUTME: Bollard-based container runtime implementation.
// ABOUTME: Supports both Docker and Podman via the Docker-compatible API.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::{
    ArchiveError, ArchiveOps, CgroupnsMode, ContainerConfig, ContainerError, ContainerFilters,
    ContainerInfo, ContainerOps, ContainerState, ContainerSummary, EngineAction, EngineEvent,
    EventError, EventFilters, EventOps, EventStream, ExecConfig, ExecError, ExecOps,
    ExecResult, HealthState, ImageError, ImageOps, LogError, LogLine, LogLineStream, LogOps,
    LogOptions, LogStream, MountKind, RegistryAuth, RestartPolicyConfig, RuntimeInfo,
    RuntimeInfoError, RuntimeMetadata,
};
use crate::runtime::types::{RuntimeSocket, RuntimeType};
use crate::types::{ContainerId, ExecId, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::exec::StartExecOptions;
use bollard::models::{
    ContainerCreateBody, DeviceMapping, EventMessage, HealthConfig, HostConfig,
    HostConfigCgroupnsModeEnum, Mount, MountTypeEnum, RestartPolicy, RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, DownloadFromContainerOptions, EventsOptions,
    InspectContainerOptions, KillContainerOptions, ListContainersOptions, LogsOptions,
    RemoveContainerOptions, RemoveImageOptions, RemoveVolumeOptions, StopContainerOptions,
    UploadToContainerOptions,
};
use chrono::{DateTime, Datelike, Utc};
use futures::StreamExt;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::UnixStream;

/// Seconds bollard waits on any single request.
const CLIENT_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

/// Status code and message of an engine-side error, if it was one.
fn server_error(e: &bollard::errors::Error) -> Option<(u16, String)> {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Some((*status_code, message.clone())),
        _ => None,
    }
}

fn map_image_remove_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match server_error(&e) {
        Some((404, _)) => ImageError::Missing(image_name.to_string()),
        Some((409, _)) => ImageError::InUse(image_name.to_string()),
        _ => ImageError::Engine(format!("failed to remove {image_name}: {e}")),
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::ImageMissing(message),
        Some((409, message)) => ContainerError::NameTaken(message),
        Some((400, message)) => ContainerError::Rejected(message),
        _ => ContainerError::Engine(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NoSuchContainer(message),
        Some((304, message)) => ContainerError::AlreadyRunning(message),
        _ => ContainerError::Engine(e.to_string()),
    }
}

fn map_container_stop_error(e: bollard::errors::Error) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NoSuchContainer(message),
        Some((304, message)) => ContainerError::NotRunning(message),
        _ => ContainerError::Engine(e.to_string()),
    }
}

fn map_container_kill_error(e: bollard::errors::Error) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NoSuchContainer(message),
        Some((409, message)) => ContainerError::NotRunning(message),
        _ => ContainerError::Engine(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match server_error(&e) {
        Some((404, message)) => ContainerError::NoSuchContainer(message),
        _ => ContainerError::Engine(e.to_string()),
    }
}

fn map_volume_remove_error(e: bollard::errors::Error, name: &str) -> Result<(), ContainerError> {
    match server_error(&e) {
        Some((404, _)) => Ok(()),
        Some((409, message)) => Err(ContainerError::Rejected(format!("volume {name} is in use: {message}"))),
        _ => Err(ContainerError::Engine(format!("failed to remove volume {name}: {e}"))),
    }
}

fn map_exec_prepare_error(e: bollard::errors::Error) -> ExecError {
    match server_error(&e) {
        Some((404, message)) => ExecError::NoSuchContainer(message),
        Some((409, message)) => ExecError::Stopped(message),
        _ => ExecError::Engine(e.to_string()),
    }
}

fn map_exec_session_error(e: bollard::errors::Error) -> ExecError {
    match server_error(&e) {
        Some((404, message)) => ExecError::UnknownSession(message),
        _ => ExecError::Engine(e.to_string()),
    }
}

fn map_archive_error(e: bollard::errors::Error) -> ArchiveError {
    match server_error(&e) {
        Some((404, message)) => ArchiveError::NotFound(message),
        Some((403, message)) => ArchiveError::PermissionDenied(message),
        _ => ArchiveError::Runtime(e.to_string()),
    }
}

/// Engines report never-set timestamps as `0001-01-01T00:00:00Z`.
fn parse_engine_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
        .filter(|t| t.year() > 1)
}

fn event_from_message(msg: EventMessage) -> Option<EngineEvent> {
    let actor = msg.actor?;
    let id = actor.id.filter(|id| !id.is_empty())?;
    let mut attributes = actor.attributes.unwrap_or_default();
    let action = EngineAction::parse(msg.action.as_deref().unwrap_or_default(), &attributes);
    let name = attributes.remove("name");
    // What is left besides these is the container's label set.
    attributes.remove("image");
    attributes.remove("exitCode");

    Some(EngineEvent {
        container: ContainerId::new(id),
        name,
        action,
        labels: attributes,
        at: msg.time.and_then(|t| DateTime::from_timestamp(t, 0)),
    })
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime implementation using bollard.
///
/// Supports both Docker and Podman via the Docker-compatible API.
/// For Podman, uses native libpod API for features not in Docker API.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
    socket_path: Option<String>,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
            socket_path: None,
        }
    }

    /// Connect to the engine behind a detected (or inner-engine) socket.
    pub fn connect(socket: &RuntimeSocket) -> Result<Self, RuntimeInfoError> {
        let client = Docker::connect_with_unix(
            &socket.socket_path,
            CLIENT_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| RuntimeInfoError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            runtime_type: socket.runtime_type,
            socket_path: Some(socket.socket_path.clone()),
        })
    }

    /// Get the runtime type (Docker or Podman).
    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }

    /// Pull image using Podman's native libpod API with tlsVerify=false.
    /// This allows pulling from insecure (HTTP) registries.
    async fn pull_image_libpod(&self, image_name: &str) -> Result<(), ImageError> {
        use http_body_util::BodyExt;

        let socket_path = self.socket_path.as_ref().ok_or_else(|| {
            ImageError::Pull("socket path not available for libpod API".to_string())
        })?;

        let stream = UnixStream::connect(socket_path)
            .await
            .map_err(|e| ImageError::Engine(format!("failed to connect to socket: {e}")))?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| ImageError::Engine(format!("HTTP handshake failed: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!("libpod connection error: {}", e);
            }
        });

        let uri = format!(
            "/v4.0.0/libpod/images/pull?reference={}&tlsVerify=false",
            urlencoding::encode(image_name)
        );

        let req = hyper::Request::builder()
            .method("POST")
            .uri(&uri)
            .header("Host", "localhost")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| ImageError::Pull(format!("failed to build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ImageError::Engine(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ImageError::Engine(format!("failed to read response: {e}")))?
            .to_bytes();
        let body_text = String::from_utf8_lossy(&body);

        if !status.is_success() {
            return Err(ImageError::Pull(format!(
                "{image_name}: libpod API error: {body_text}"
            )));
        }

        // Progress is streamed as JSON objects; a failed pull still answers 200.
        if body_text.contains("\"error\"") && !body_text.contains("\"error\":null") {
            return Err(ImageError::Pull(format!("{image_name}: {body_text}")));
        }

        Ok(())
    }

    /// Podman can leave attached exec streams open after the process exits.
    /// There the stream is read while the session is polled, and dropped
    /// once the process is gone and in-flight frames have drained.
    async fn exec_start_polled(&self, session: &ExecId) -> Result<ExecResult, ExecError> {
        let started = self
            .client
            .start_exec(
                session.as_str(),
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_exec_session_error)?;
        let bollard::exec::StartExecResults::Attached { mut output, .. } = started else {
            return Err(ExecError::Stream("engine did not attach to the exec session".to_string()));
        };

        let mut collected = ExecOutput::default();
        let deadline = tokio::time::Instant::now() + POLLED_EXEC_LIMIT;
        let mut poll = tokio::time::interval(POLLED_EXEC_POLL);
        let exit_code = loop {
            tokio::select! {
                frame = output.next() => match frame {
                    Some(frame) => collected.push(frame.map_err(|e| ExecError::Stream(e.to_string()))?),
                    None => break self.exec_status(session).await?.exit_code,
                },
                _ = poll.tick() => {
                    let status = self.exec_status(session).await?;
                    if !status.running {
                        while let Ok(Some(frame)) =
                            tokio::time::timeout(POLLED_EXEC_DRAIN, output.next()).await
                        {
                            collected.push(frame.map_err(|e| ExecError::Stream(e.to_string()))?);
                        }
                        break status.exit_code;
                    }
                    if tokio::time::Instant::now() >= deadline {
                        return Err(ExecError::TimedOut(POLLED_EXEC_LIMIT));
                    }
                }
            }
        };
        Ok(collected.finish(exit_code))
    }

    async fn exec_status(&self, session: &ExecId) -> Result<ExecStatus, ExecError> {
        let details = self
            .client
            .inspect_exec(session.as_str())
            .await
            .map_err(map_exec_session_error)?;
        Ok(ExecStatus {
            running: details.running.unwrap_or(false),
            exit_code: details.exit_code,
        })
    }
}

const POLLED_EXEC_POLL: Duration = Duration::from_millis(100);
const POLLED_EXEC_LIMIT: Duration = Duration::from_secs(300);
/// Quiet period after exit before the stream is abandoned.
const POLLED_EXEC_DRAIN: Duration = Duration::from_millis(250);

/// Output frames of one exec session.
#[derive(Debug, Default)]
struct ExecOutput {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl ExecOutput {
    fn push(&mut self, frame: LogOutput) {
        match frame {
            LogOutput::StdErr { message } => self.stderr.extend(message),
            // Console frames only appear for TTY sessions and carry both streams.
            LogOutput::StdOut { message } | LogOutput::Console { message } => {
                self.stdout.extend(message)
            }
            LogOutput::StdIn { .. } => {}
        }
    }

    fn finish(self, exit_code: Option<i64>) -> ExecResult {
        ExecResult {
            exit_code: exit_code.unwrap_or(0),
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}

struct ExecStatus {
    running: bool,
    exit_code: Option<i64>,
}

fn host_config_for(config: &ContainerConfig) -> HostConfig {
    let security = &config.security;

    let mut host_config = HostConfig {
        restart_policy: Some(RestartPolicy {
            name: Some(match &config.restart_policy {
                RestartPolicyConfig::No => RestartPolicyNameEnum::NO,
                RestartPolicyConfig::Always => RestartPolicyNameEnum::ALWAYS,
                RestartPolicyConfig::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
                RestartPolicyConfig::OnFailure { .. } => RestartPolicyNameEnum::ON_FAILURE,
            }),
            maximum_retry_count: match &config.restart_policy {
                RestartPolicyConfig::OnFailure { max_retries } => max_retries.map(i64::from),
                _ => None,
            },
        }),
        privileged: Some(security.privileged),
        network_mode: config.network_mode.clone(),
        userns_mode: security.userns_mode.clone(),
        cgroup_parent: security.cgroup_parent.clone(),
        cgroupns_mode: security.cgroupns.map(|mode| match mode {
            CgroupnsMode::Private => HostConfigCgroupnsModeEnum::PRIVATE,
            CgroupnsMode::Host => HostConfigCgroupnsModeEnum::HOST,
        }),
        ..Default::default()
    };

    if !security.cap_add.is_empty() {
        host_config.cap_add = Some(security.cap_add.clone());
    }
    if !security.cap_drop.is_empty() {
        host_config.cap_drop = Some(security.cap_drop.clone());
    }
    if !security.security_opt.is_empty() {
        host_config.security_opt = Some(security.security_opt.clone());
    }
    if !security.devices.is_empty() {
        host_config.devices = Some(
            security
                .devices
                .iter()
                .map(|d| DeviceMapping {
                    path_on_host: Some(d.path_on_host.clone()),
                    path_in_container: Some(d.path_in_container.clone()),
                    cgroup_permissions: Some(d.permissions.clone()),
                })
                .collect(),
        );
    }
    if !config.tmpfs.is_empty() {
        host_config.tmpfs = Some(config.tmpfs.clone());
    }

    if let Some(ref resources) = config.resources {
        if let Some(memory) = resources.memory {
            host_config.memory = Some(memory as i64);
        }
        if let Some(cpus) = resources.cpus {
            host_config.nano_cpus = Some((cpus * 1_000_000_000.0) as i64);
        }
    }

    let mounts: Vec<Mount> = config
        .volumes
        .iter()
        .map(|m| Mount {
            source: Some(m.source.clone()),
            target: Some(m.target.clone()),
            typ: Some(match m.kind {
                MountKind::Bind => MountTypeEnum::BIND,
                MountKind::Volume => MountTypeEnum::VOLUME,
            }),
            read_only: Some(m.read_only),
            ..Default::default()
        })
        .collect();
    if !mounts.is_empty() {
        host_config.mounts = Some(mounts);
    }

    host_config
}

impl Sealed for BollardRuntime {}

#[async_trait]
impl RuntimeInfo for BollardRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| RuntimeInfoError::Unreachable(e.to_string()))?;

        let name = match self.runtime_type {
            RuntimeType::Docker => "Docker".to_string(),
            RuntimeType::Podman => "Podman".to_string(),
        };
        let rootless = info
            .security_options
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|opt| opt.contains("rootless"));

        Ok(RuntimeMetadata {
            name,
            version: info.server_version.unwrap_or_default(),
            api_version: bollard::API_DEFAULT_VERSION.to_string(),
            os: info.operating_system.unwrap_or_default(),
            arch: info.architecture.unwrap_or_default(),
            rootless,
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        self.client
            .ping()
            .await
            .map_err(|e| RuntimeInfoError::Unreachable(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let image_name = reference.to_string();
        tracing::debug!(image = %image_name, runtime = %self.runtime_type, "pulling image");

        if self.runtime_type == RuntimeType::Podman && self.socket_path.is_some() {
            return self.pull_image_libpod(&image_name).await;
        }

        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };

        let credentials = auth.map(|a| bollard::auth::DockerCredentials {
            username: Some(a.username.clone()),
            password: Some(a.password.clone()),
            serveraddress: a.server.clone(),
            ..Default::default()
        });

        // Pull returns a stream of progress updates - consume it
        let mut stream = self.client.create_image(Some(opts), None, credentials);
        while let Some(result) = stream.next().await {
            result.map_err(|e| match server_error(&e) {
                Some((401, _)) | Some((403, _)) => {
                    ImageError::Unauthorized(image_name.clone())
                }
                Some((404, _)) => ImageError::Missing(image_name.clone()),
                _ => ImageError::Pull(format!("{image_name}: {e}")),
            })?;
        }

        Ok(())
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let image_name = reference.to_string();

        match self.client.inspect_image(&image_name).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(ImageError::Engine(format!(
                "failed to inspect {image_name}: {e}"
            ))),
        }
    }

    async fn remove_image(&self, reference: &ImageRef, force: bool) -> Result<(), ImageError> {
        let image_name = reference.to_string();

        let opts = RemoveImageOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_image(&image_name, Some(opts), None)
            .await
            .map_err(|e| map_image_remove_error(e, &image_name))?;

        Ok(())
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let healthcheck = config.healthcheck.as_ref().map(|hc| HealthConfig {
            test: Some(hc.test.clone()),
            interval: Some(hc.interval.as_nanos() as i64),
            timeout: Some(hc.timeout.as_nanos() as i64),
            retries: Some(i64::from(hc.retries)),
            start_period: Some(hc.start_period.as_nanos() as i64),
            start_interval: None,
        });

        let body = ContainerCreateBody {
            image: Some(config.image.to_string()),
            env: if env.is_empty() { None } else { Some(env) },
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            cmd: config.command.clone(),
            entrypoint: config.entrypoint.clone(),
            working_dir: config.working_dir.clone(),
            user: config.user.clone(),
            host_config: Some(host_config_for(config)),
            healthcheck,
            stop_timeout: config.stop_timeout.map(|d| d.as_secs() as i64),
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(config.name.to_string()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_container_create_error)?;

        for warning in &response.warnings {
            tracing::warn!(container = %config.name, "engine warning: {}", warning);
        }

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn kill_container(
        &self,
        id: &ContainerId,
        signal: &str,
    ) -> Result<(), ContainerError> {
        let opts = KillContainerOptions {
            signal: signal.to_string(),
        };

        self.client
            .kill_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_kill_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            // Anonymous volumes only. The named storage volume goes through remove_volume.
            v: true,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)?;

        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), ContainerError> {
        match self
            .client
            .remove_volume(name, Some(RemoveVolumeOptions { force: false }))
            .await
        {
            Ok(()) => {
                tracing::debug!(volume = name, "volume removed");
                Ok(())
            }
            Err(e) => map_volume_remove_error(e, name),
        }
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let engine_state = details.state.as_ref();

        let state = engine_state
            .and_then(|s| s.status)
            .map(|s| match s {
                bollard::models::ContainerStateStatusEnum::CREATED => ContainerState::Created,
                bollard::models::ContainerStateStatusEnum::RUNNING => ContainerState::Running,
                bollard::models::ContainerStateStatusEnum::PAUSED => ContainerState::Paused,
                bollard::models::ContainerStateStatusEnum::RESTARTING => ContainerState::Restarting,
                bollard::models::ContainerStateStatusEnum::REMOVING => ContainerState::Removing,
                bollard::models::ContainerStateStatusEnum::EXITED => ContainerState::Exited,
                bollard::models::ContainerStateStatusEnum::DEAD => ContainerState::Dead,
                _ => ContainerState::Exited,
            })
            .unwrap_or(ContainerState::Exited);

        let health = engine_state
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status)
            .map(|s| match s {
                bollard::models::HealthStatusEnum::STARTING => HealthState::Starting,
                bollard::models::HealthStatusEnum::HEALTHY => HealthState::Healthy,
                bollard::models::HealthStatusEnum::UNHEALTHY => HealthState::Unhealthy,
                _ => HealthState::None,
            });

        Ok(ContainerInfo {
            id: id.clone(),
            name: details
                .name
                .as_deref()
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            image: details
                .config
                .as_ref()
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            state,
            health,
            exit_code: engine_state.and_then(|s| s.exit_code),
            oom_killed: engine_state.and_then(|s| s.oom_killed).unwrap_or(false),
            restart_count: details
                .restart_count
                .and_then(|c| u32::try_from(c).ok())
                .unwrap_or(0),
            started_at: engine_state
                .and_then(|s| s.started_at.as_deref())
                .and_then(parse_engine_time),
            finished_at: engine_state
                .and_then(|s| s.finished_at.as_deref())
                .and_then(parse_engine_time),
            labels: details.config.and_then(|c| c.labels).unwrap_or_default(),
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let mut filter_map: HashMap<String, Vec<String>> = HashMap::new();

        if let Some(ref name) = filters.name {
            filter_map.insert("name".to_string(), vec![name.clone()]);
        }

        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{key}={value}"));
        }

        let opts = ListContainersOptions {
            all: filters.all,
            filters: Some(filter_map),
            ..Default::default()
        };

        // Podman reports "stopping"/"stopped" during shutdown, which bollard
        // cannot deserialize. Both are transient, so retry after a short delay.
        let mut last_error = None;
        for attempt in 0..3 {
            match self.client.list_containers(Some(opts.clone())).await {
                Ok(containers) => {
                    return Ok(containers
                        .into_iter()
                        .map(|c| {
                            let name = c
                                .names
                                .as_deref()
                                .and_then(|names| names.first())
                                .map(|n| n.trim_start_matches('/').to_string())
                                .unwrap_or_default();

                            let state = c
                                .state
                                .map(|s| ContainerState::from_api(&format!("{s:?}").to_lowercase()))
                                .unwrap_or(ContainerState::Exited);

                            ContainerSummary {
                                id: ContainerId::new(c.id.unwrap_or_default()),
                                name,
                                image: c.image.unwrap_or_default(),
                                state,
                                status: c.status.unwrap_or_default(),
                                labels: c.labels.unwrap_or_default(),
                            }
                        })
                        .collect());
                }
                Err(e) => {
                    let err_str = e.to_string();
                    if (err_str.contains("unknown variant `stopping`")
                        || err_str.contains("unknown variant `stopped`"))
                        && attempt < 2
                    {
                        tracing::debug!(attempt, "transient podman state in listing, retrying");
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        last_error = Some(err_str);
                        continue;
                    }
                    return Err(ContainerError::Engine(err_str));
                }
            }
        }

        Err(ContainerError::Engine(
            last_error.unwrap_or_else(|| "list_containers failed".to_string()),
        ))
    }
}

#[async_trait]
impl ExecOps for BollardRuntime {
    async fn exec_create(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecId, ExecError> {
        let request = bollard::models::ExecConfig {
            cmd: Some(config.cmd.clone()),
            env: (!config.env.is_empty()).then(|| config.env.clone()),
            working_dir: config.working_dir.clone(),
            user: config.user.clone(),
            attach_stdin: Some(config.attach_stdin),
            attach_stdout: Some(config.attach_stdout),
            attach_stderr: Some(config.attach_stderr),
            tty: Some(config.tty),
            privileged: Some(config.privileged),
            ..Default::default()
        };
        let created = self
            .client
            .create_exec(container.as_str(), request)
            .await
            .map_err(map_exec_prepare_error)?;
        Ok(ExecId::new(created.id))
    }

    async fn exec_start(&self, session: &ExecId) -> Result<ExecResult, ExecError> {
        if self.runtime_type == RuntimeType::Podman {
            return self.exec_start_polled(session).await;
        }

        let started = self
            .client
            .start_exec(
                session.as_str(),
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_exec_session_error)?;

        let mut collected = ExecOutput::default();
        if let bollard::exec::StartExecResults::Attached { mut output, .. } = started {
            while let Some(frame) = output.next().await {
                collected.push(frame.map_err(|e| ExecError::Stream(e.to_string()))?);
            }
        }

        let status = self.exec_status(session).await?;
        Ok(collected.finish(status.exit_code))
    }
}

#[async_trait]
impl LogOps for BollardRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLineStream, LogError> {
        let log_opts = LogsOptions {
            stdout: opts.stdout,
            stderr: opts.stderr,
            follow: opts.follow,
            timestamps: opts.timestamps,
            tail: opts
                .tail
                .map(|n| n.to_string())
                .unwrap_or_else(|| "all".to_string()),
            ..Default::default()
        };

        let stream = self.client.logs(id.as_str(), Some(log_opts));

        let mapped_stream = stream.map(|result| {
            result
                .map(|output| {
                    let (stream, data) = match output {
                        LogOutput::StdErr { message } => {
                            (LogStream::Stderr, message)
                        }
                        LogOutput::StdOut { message }
                        | LogOutput::StdIn { message }
                        | LogOutput::Console { message } => {
                            (LogStream::Stdout, message)
                        }
                    };

                    LogLine {
                        content: String::from_utf8_lossy(&data).to_string(),
                        stream,
                    }
                })
                .map_err(|e| match server_error(&e) {
                    Some((404, message)) => LogError::NoSuchContainer(message),
                    _ => LogError::Stream(e.to_string()),
                })
        });

        Ok(Box::pin(mapped_stream))
    }
}

#[async_trait]
impl EventOps for BollardRuntime {
    async fn events(&self, filters: &EventFilters) -> Result<EventStream, EventError> {
        let mut filter_map: HashMap<String, Vec<String>> =
            HashMap::from([("type".to_string(), vec!["container".to_string()])]);
        for (key, value) in &filters.labels {
            filter_map
                .entry("label".to_string())
                .or_default()
                .push(format!("{key}={value}"));
        }

        let opts = EventsOptions {
            filters: Some(filter_map),
            ..Default::default()
        };

        let stream = self.client.events(Some(opts)).filter_map(|result| async move {
            match result {
                Ok(msg) => event_from_message(msg).map(Ok),
                Err(e) => Some(Err(EventError::Stream(e.to_string()))),
            }
        });

        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl ArchiveOps for BollardRuntime {
    async fn upload_archive(
        &self,
        id: &ContainerId,
        dir: &str,
        tar: Vec<u8>,
    ) -> Result<(), ArchiveError> {
        let opts = UploadToContainerOptions {
            path: dir.to_string(),
            ..Default::default()
        };

        self.client
            .upload_to_container(id.as_str(), Some(opts), bollard::body_full(tar.into()))
            .await
            .map_err(map_archive_error)
    }

    async fn download_archive(
        &self,
        id: &ContainerId,
        path: &str,
    ) -> Result<Vec<u8>, ArchiveError> {
        let opts = DownloadFromContainerOptions {
            path: path.to_string(),
        };

        let mut archive = Vec::new();
        let mut stream = self.client.download_from_container(id.as_str(), Some(opts));
        while let Some(chunk) = stream.next().await {
            archive.extend_from_slice(&chunk.map_err(map_archive_error)?);
        }

        Ok(archive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::EventActor;

    #[test]
    fn exec_frames_are_split_by_stream() {
        let mut out = ExecOutput::default();
        out.push(LogOutput::StdOut { message: "out".into() });
        out.push(LogOutput::StdErr { message: "err".into() });
        out.push(LogOutput::StdIn { message: "ignored".into() });
        out.push(LogOutput::Console { message: "\n".into() });

        let result = out.finish(Some(3));
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, b"out\n");
        assert_eq!(result.stderr, b"err");
        assert_eq!(ExecOutput::default().finish(None).exit_code, 0);
    }

    #[test]
    fn zero_engine_time_is_none() {
        assert!(parse_engine_time("0001-01-01T00:00:00Z").is_none());
        assert!(parse_engine_time("2024-05-01T10:00:00.123456789Z").is_some());
        assert!(parse_engine_time("").is_none());
    }

    #[test]
    fn server_errors_map_by_status() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message: "name in use".into(),
        };
        assert!(matches!(
            map_container_create_error(err),
            ContainerError::NameTaken(_)
        ));

        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "boom".into(),
        };
        assert!(map_container_start_error(err).is_transient());
    }

    #[test]
    fn event_message_splits_name_and_labels() {
        let msg = EventMessage {
            action: Some("die".into()),
            actor: Some(EventActor {
                id: Some("abc123".into()),
                attributes: Some(HashMap::from([
                    ("name".to_string(), "dind-a".to_string()),
                    ("image".to_string(), "docker:dind".to_string()),
                    ("exitCode".to_string(), "1".to_string()),
                    ("nestkeeper.managed".to_string(), "true".to_string()),
                ])),
            }),
            time: Some(1_700_000_000),
            ..Default::default()
        };

        let event = event_from_message(msg).unwrap();
        assert_eq!(event.container.as_str(), "abc123");
        assert_eq!(event.name.as_deref(), Some("dind-a"));
        assert_eq!(event.action, EngineAction::Die { exit_code: Some(1) });
        assert_eq!(event.labels.len(), 1);
        assert!(event.at.is_some());
    }

    #[test]
    fn event_without_actor_is_skipped() {
        assert!(event_from_message(EventMessage::default()).is_none());
    }
}
