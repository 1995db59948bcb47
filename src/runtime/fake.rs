// ABOUTME: In-memory engine implementing every capability trait, for unit tests.
// ABOUTME: Records calls and can inject transient failures per operation.

use crate::runtime::traits::sealed::Sealed;
use crate::runtime::traits::*;
use crate::types::{ContainerId, ExecId, ImageRef};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Read;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct FakeContainer {
    pub name: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    pub state: ContainerState,
    pub exit_code: Option<i64>,
    pub oom_killed: bool,
    pub health: Option<HealthState>,
    pub config: ContainerConfig,
}

#[derive(Default)]
struct State {
    next_id: u64,
    containers: BTreeMap<String, FakeContainer>,
    images: HashSet<String>,
    volumes: BTreeSet<String>,
    files: BTreeMap<(String, String), Vec<u8>>,
    calls: Vec<String>,
    create_failures: u32,
    start_failures: u32,
    stop_failures: u32,
    pull_failures: u32,
    exec_result: Option<ExecResult>,
    events: Vec<EngineEvent>,
    rootless: bool,
}

/// Deterministic stand-in for a container engine.
#[derive(Default)]
pub(crate) struct FakeRuntime {
    state: Mutex<State>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, image: &str) -> Self {
        self.state.lock().images.insert(image.to_string());
        self
    }

    pub fn rootless(self) -> Self {
        self.state.lock().rootless = true;
        self
    }

    /// The next `n` create calls fail with a transient error.
    pub fn fail_creates(&self, n: u32) {
        self.state.lock().create_failures = n;
    }

    pub fn fail_starts(&self, n: u32) {
        self.state.lock().start_failures = n;
    }

    pub fn fail_stops(&self, n: u32) {
        self.state.lock().stop_failures = n;
    }

    pub fn fail_pulls(&self, n: u32) {
        self.state.lock().pull_failures = n;
    }

    pub fn set_exec_result(&self, result: ExecResult) {
        self.state.lock().exec_result = Some(result);
    }

    pub fn push_event(&self, event: EngineEvent) {
        self.state.lock().events.push(event);
    }

    /// Simulate the main process exiting.
    pub fn crash(&self, name: &str, exit_code: i64) {
        let mut state = self.state.lock();
        if let Some(c) = state.containers.values_mut().find(|c| c.name == name) {
            c.state = ContainerState::Exited;
            c.exit_code = Some(exit_code);
        }
    }

    /// Insert a container directly, bypassing create.
    pub fn insert(&self, container: FakeContainer) -> ContainerId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = format!("fake{:08}", state.next_id);
        let named = container
            .config
            .volumes
            .iter()
            .filter(|v| v.kind == MountKind::Volume)
            .map(|v| v.source.clone());
        state.volumes.extend(named);
        state.containers.insert(id.clone(), container);
        ContainerId::new(id)
    }

    pub fn container_named(&self, name: &str) -> Option<(ContainerId, FakeContainer)> {
        self.state
            .lock()
            .containers
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(id, c)| (ContainerId::new(id.clone()), c.clone()))
    }

    pub fn container_count(&self) -> usize {
        self.state.lock().containers.len()
    }

    /// Named volumes created by containers and not yet removed.
    pub fn volumes(&self) -> Vec<String> {
        self.state.lock().volumes.iter().cloned().collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn put_file(&self, id: &ContainerId, path: &str, content: &[u8]) {
        self.state
            .lock()
            .files
            .insert((id.to_string(), path.to_string()), content.to_vec());
    }

    pub fn file(&self, id: &ContainerId, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .files
            .get(&(id.to_string(), path.to_string()))
            .cloned()
    }

    fn record(&self, call: String) {
        self.state.lock().calls.push(call);
    }
}

impl Sealed for FakeRuntime {}

#[async_trait]
impl RuntimeInfo for FakeRuntime {
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError> {
        Ok(RuntimeMetadata {
            name: "Fake".to_string(),
            version: "0.0.0".to_string(),
            api_version: "1.0".to_string(),
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            rootless: self.state.lock().rootless,
        })
    }

    async fn ping(&self) -> Result<(), RuntimeInfoError> {
        Ok(())
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn pull_image(
        &self,
        reference: &ImageRef,
        _auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        self.record(format!("pull {reference}"));
        let mut state = self.state.lock();
        if state.pull_failures > 0 {
            state.pull_failures -= 1;
            return Err(ImageError::Engine("registry unavailable".to_string()));
        }
        state.images.insert(reference.to_string());
        Ok(())
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        Ok(self.state.lock().images.contains(&reference.to_string()))
    }

    async fn remove_image(&self, reference: &ImageRef, _force: bool) -> Result<(), ImageError> {
        if self.state.lock().images.remove(&reference.to_string()) {
            Ok(())
        } else {
            Err(ImageError::Missing(reference.to_string()))
        }
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        self.record(format!("create {}", config.name));
        {
            let mut state = self.state.lock();
            if state.create_failures > 0 {
                state.create_failures -= 1;
                return Err(ContainerError::Engine("engine busy".to_string()));
            }
            if !state.images.contains(&config.image.to_string()) {
                return Err(ContainerError::ImageMissing(config.image.to_string()));
            }
            if state
                .containers
                .values()
                .any(|c| c.name == config.name.as_str())
            {
                return Err(ContainerError::NameTaken(config.name.to_string()));
            }
        }
        Ok(self.insert(FakeContainer {
            name: config.name.to_string(),
            image: config.image.to_string(),
            labels: config.labels.clone(),
            state: ContainerState::Created,
            exit_code: None,
            oom_killed: false,
            health: None,
            config: config.clone(),
        }))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.record(format!("start {id}"));
        let mut state = self.state.lock();
        if state.start_failures > 0 {
            state.start_failures -= 1;
            return Err(ContainerError::Engine("start failed".to_string()));
        }
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NoSuchContainer(id.to_string()))?;
        if container.state == ContainerState::Running {
            return Err(ContainerError::AlreadyRunning(id.to_string()));
        }
        container.state = ContainerState::Running;
        container.exit_code = None;
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        self.record(format!("stop {id}"));
        let mut state = self.state.lock();
        if state.stop_failures > 0 {
            state.stop_failures -= 1;
            return Err(ContainerError::Engine("stop timed out".to_string()));
        }
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NoSuchContainer(id.to_string()))?;
        if !container.state.is_running() {
            return Err(ContainerError::NotRunning(id.to_string()));
        }
        container.state = ContainerState::Exited;
        container.exit_code = Some(0);
        Ok(())
    }

    async fn kill_container(
        &self,
        id: &ContainerId,
        signal: &str,
    ) -> Result<(), ContainerError> {
        self.record(format!("kill {id} {signal}"));
        let mut state = self.state.lock();
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| ContainerError::NoSuchContainer(id.to_string()))?;
        container.state = ContainerState::Exited;
        container.exit_code = Some(137);
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        self.record(format!("remove {id}"));
        let mut state = self.state.lock();
        match state.containers.get(id.as_str()) {
            None => Err(ContainerError::NoSuchContainer(id.to_string())),
            Some(c) if c.state.is_running() && !force => {
                Err(ContainerError::Rejected(format!("{id} is running")))
            }
            Some(_) => {
                state.containers.remove(id.as_str());
                Ok(())
            }
        }
    }

    async fn remove_volume(&self, name: &str) -> Result<(), ContainerError> {
        self.record(format!("remove-volume {name}"));
        let mut state = self.state.lock();
        let in_use = state
            .containers
            .values()
            .any(|c| c.config.volumes.iter().any(|v| v.kind == MountKind::Volume && v.source == name));
        if in_use {
            return Err(ContainerError::Rejected(format!("volume {name} is in use")));
        }
        state.volumes.remove(name);
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let state = self.state.lock();
        let c = state
            .containers
            .get(id.as_str())
            .ok_or_else(|| ContainerError::NoSuchContainer(id.to_string()))?;
        Ok(ContainerInfo {
            id: id.clone(),
            name: c.name.clone(),
            image: c.image.clone(),
            state: c.state,
            health: c.health,
            exit_code: c.exit_code,
            oom_killed: c.oom_killed,
            restart_count: 0,
            started_at: None,
            finished_at: None,
            labels: c.labels.clone(),
        })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        let state = self.state.lock();
        Ok(state
            .containers
            .iter()
            .filter(|(_, c)| filters.all || c.state.is_running())
            .filter(|(_, c)| {
                filters
                    .labels
                    .iter()
                    .all(|(k, v)| c.labels.get(k) == Some(v))
            })
            .filter(|(_, c)| filters.name.as_ref().is_none_or(|n| c.name.contains(n)))
            .map(|(id, c)| ContainerSummary {
                id: ContainerId::new(id.clone()),
                name: c.name.clone(),
                image: c.image.clone(),
                state: c.state,
                status: c.state.to_string(),
                labels: c.labels.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl ExecOps for FakeRuntime {
    async fn exec_create(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecId, ExecError> {
        self.record(format!("exec {container} {}", config.cmd.join(" ")));
        let state = self.state.lock();
        match state.containers.get(container.as_str()) {
            None => Err(ExecError::NoSuchContainer(container.to_string())),
            Some(c) if !c.state.is_running() => Err(ExecError::Stopped(container.to_string())),
            Some(_) => Ok(ExecId::new(format!("exec-{container}"))),
        }
    }

    async fn exec_start(&self, _session: &ExecId) -> Result<ExecResult, ExecError> {
        let canned = self.state.lock().exec_result.clone();
        Ok(canned.unwrap_or(ExecResult {
            exit_code: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }))
    }
}

#[async_trait]
impl LogOps for FakeRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        _opts: &LogOptions,
    ) -> Result<LogLineStream, LogError> {
        if !self.state.lock().containers.contains_key(id.as_str()) {
            return Err(LogError::NoSuchContainer(id.to_string()));
        }
        let lines = vec![Ok(LogLine {
            content: "daemon started\n".to_string(),
            stream: LogStream::Stderr,
        })];
        Ok(Box::pin(futures::stream::iter(lines)))
    }
}

#[async_trait]
impl EventOps for FakeRuntime {
    async fn events(&self, filters: &EventFilters) -> Result<EventStream, EventError> {
        let events: Vec<_> = std::mem::take(&mut self.state.lock().events)
            .into_iter()
            .filter(|e| {
                filters
                    .labels
                    .iter()
                    .all(|(k, v)| e.labels.get(k) == Some(v))
            })
            .map(Ok)
            .collect();
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[async_trait]
impl ArchiveOps for FakeRuntime {
    async fn upload_archive(
        &self,
        id: &ContainerId,
        dir: &str,
        tar: Vec<u8>,
    ) -> Result<(), ArchiveError> {
        self.record(format!("upload {id} {dir}"));
        let mut archive = tar::Archive::new(tar.as_slice());
        let entries = archive
            .entries()
            .map_err(|e| ArchiveError::Runtime(e.to_string()))?;
        let mut state = self.state.lock();
        if !state.containers.contains_key(id.as_str()) {
            return Err(ArchiveError::NotFound(id.to_string()));
        }
        for entry in entries {
            let mut entry = entry.map_err(|e| ArchiveError::Runtime(e.to_string()))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .map_err(|e| ArchiveError::Runtime(e.to_string()))?
                .to_string_lossy()
                .into_owned();
            let mut content = Vec::new();
            entry
                .read_to_end(&mut content)
                .map_err(|e| ArchiveError::Runtime(e.to_string()))?;
            let full = format!("{}/{}", dir.trim_end_matches('/'), rel);
            state.files.insert((id.to_string(), full), content);
        }
        Ok(())
    }

    async fn download_archive(
        &self,
        id: &ContainerId,
        path: &str,
    ) -> Result<Vec<u8>, ArchiveError> {
        let state = self.state.lock();
        let key = id.to_string();
        let base = path.trim_end_matches('/');
        let top = base.rsplit('/').next().unwrap_or(base).to_string();

        let mut builder = tar::Builder::new(Vec::new());
        let mut found = false;
        for ((cid, file), content) in &state.files {
            if *cid != key {
                continue;
            }
            let name = if file == base {
                top.clone()
            } else if let Some(rest) = file.strip_prefix(&format!("{base}/")) {
                if !found {
                    let mut dir = tar::Header::new_gnu();
                    dir.set_entry_type(tar::EntryType::Directory);
                    dir.set_mode(0o755);
                    dir.set_size(0);
                    builder
                        .append_data(&mut dir, format!("{top}/"), std::io::empty())
                        .map_err(|e| ArchiveError::Runtime(e.to_string()))?;
                }
                format!("{top}/{rest}")
            } else {
                continue;
            };
            found = true;
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, name, content.as_slice())
                .map_err(|e| ArchiveError::Runtime(e.to_string()))?;
        }
        if !found {
            return Err(ArchiveError::NotFound(format!("{id}:{path}")));
        }
        builder
            .into_inner()
            .map_err(|e| ArchiveError::Runtime(e.to_string()))
    }
}
