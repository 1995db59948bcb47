// ABOUTME: Type-state bring-up of one nested engine container.
// ABOUTME: Planned -> ImageReady -> Created -> Started -> EngineReady, with rollback.

use super::error::SuperviseError;
use super::managed::ManagedSpec;
use super::retry::{RetryPolicy, retry};
use crate::health::probe_inner_engine;
use crate::nesting::NestingPlan;
use crate::runtime::{ContainerConfig, ContainerError, ContainerOps, ContainerState, ImageOps};
use crate::types::ContainerId;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const PING_TIMEOUT: Duration = Duration::from_secs(2);
const ROLLBACK_STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Nesting negotiated, nothing touched yet.
/// Available actions: `ensure_image()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Planned;

/// Image present on the outer engine.
/// Available actions: `create()`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageReady;

/// Container exists but has not started.
/// Available actions: `start()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Created {
    id: ContainerId,
}

/// Container process is running.
/// Available actions: `wait_engine_ready()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Started {
    id: ContainerId,
}

/// Inner engine answers on its socket.
/// Available actions: `finish()`, `rollback()`
#[derive(Debug, Clone)]
pub struct EngineReady {
    id: ContainerId,
}

/// States in which a container exists and can be rolled back.
pub trait HasContainer {
    fn id(&self) -> &ContainerId;
}

impl HasContainer for Created {
    fn id(&self) -> &ContainerId {
        &self.id
    }
}

impl HasContainer for Started {
    fn id(&self) -> &ContainerId {
        &self.id
    }
}

impl HasContainer for EngineReady {
    fn id(&self) -> &ContainerId {
        &self.id
    }
}

/// Result type for transitions that may need rollback on failure.
pub type LaunchResult<T, S> = Result<Launch<T>, (Launch<S>, SuperviseError)>;

/// Bring-up of one managed container, one state at a time.
#[derive(Debug)]
pub struct Launch<S> {
    config: ContainerConfig,
    plan: NestingPlan,
    retry: RetryPolicy,
    state: S,
}

impl<S> Launch<S> {
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn plan(&self) -> &NestingPlan {
        &self.plan
    }

    fn name(&self) -> &str {
        self.config.name.as_str()
    }

    fn transition<T>(self, state: T) -> Launch<T> {
        Launch {
            config: self.config,
            plan: self.plan,
            retry: self.retry,
            state,
        }
    }
}

impl Launch<Planned> {
    pub fn new(spec: &ManagedSpec, plan: NestingPlan, retry: RetryPolicy) -> Self {
        Self {
            config: spec.container_config(&plan),
            plan,
            retry,
            state: Planned,
        }
    }

    /// Pull the image unless the outer engine already has it.
    #[must_use = "launch state must be used"]
    pub async fn ensure_image<R: ImageOps>(
        self,
        runtime: &R,
    ) -> Result<Launch<ImageReady>, SuperviseError> {
        let image = self.config.image.clone();
        let present = retry(&self.retry, "image_exists", || runtime.image_exists(&image))
            .await
            .map_err(|e| SuperviseError::image(&image, e))?;

        if !present {
            tracing::info!(container = self.name(), %image, "pulling image");
            retry(&self.retry, "pull_image", || runtime.pull_image(&image, None))
                .await
                .map_err(|e| SuperviseError::image(&image, e))?;
        }
        Ok(self.transition(ImageReady))
    }
}

impl Launch<ImageReady> {
    #[must_use = "launch state must be used"]
    pub async fn create<R: ContainerOps>(
        self,
        runtime: &R,
    ) -> Result<Launch<Created>, SuperviseError> {
        if let Some(dir) = &self.plan.host_socket_dir {
            prepare_socket_dir(dir)?;
        }
        let id = retry(&self.retry, "create_container", || {
            runtime.create_container(&self.config)
        })
        .await
        .map_err(|e| SuperviseError::container(self.name(), e))?;
        tracing::debug!(container = self.name(), id = %id.short(), mode = %self.plan.mode, "created");
        Ok(self.transition(Created { id }))
    }
}

/// The inner engine may run as an unprivileged user, so the shared socket
/// directory must be writable by anyone.
fn prepare_socket_dir(dir: &Path) -> Result<(), SuperviseError> {
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o777))?;
    }
    Ok(())
}

impl Launch<Created> {
    /// Take over an existing container that is not running.
    pub fn adopt(spec: &ManagedSpec, plan: NestingPlan, retry: RetryPolicy, id: ContainerId) -> Self {
        Self {
            config: spec.container_config(&plan),
            plan,
            retry,
            state: Created { id },
        }
    }

    #[must_use = "launch state must be used"]
    pub async fn start<R: ContainerOps>(self, runtime: &R) -> LaunchResult<Started, Created> {
        let id = self.state.id.clone();
        match retry(&self.retry, "start_container", || runtime.start_container(&id)).await {
            Ok(()) | Err(ContainerError::AlreadyRunning(_)) => Ok(self.transition(Started { id })),
            Err(e) => {
                let err = SuperviseError::container(self.name(), e);
                Err((self, err))
            }
        }
    }
}

impl Launch<Started> {
    /// Poll until the inner engine answers, the container exits, or
    /// `timeout` passes.
    ///
    /// Without a host-side socket there is nothing to ping; a running
    /// container is then taken as ready.
    #[must_use = "launch state must be used"]
    pub async fn wait_engine_ready<R: ContainerOps>(
        self,
        runtime: &R,
        timeout: Duration,
    ) -> LaunchResult<EngineReady, Started> {
        let deadline = Instant::now() + timeout;
        let socket = self.plan.inner_socket_on_host();

        loop {
            match runtime.inspect_container(&self.state.id).await {
                Ok(info) if info.state.is_running() || info.state == ContainerState::Created => {}
                Ok(info) => {
                    let err = SuperviseError::ContainerExited {
                        name: self.name().to_string(),
                        exit_code: info.exit_code,
                        oom_killed: info.oom_killed,
                    };
                    return Err((self, err));
                }
                Err(e) if e.is_transient() => {
                    tracing::debug!(container = self.name(), error = %e, "inspect failed while waiting");
                }
                Err(e) => {
                    let err = SuperviseError::container(self.name(), e);
                    return Err((self, err));
                }
            }

            let ready = match &socket {
                None => true,
                Some(path) => probe_inner_engine(self.plan.engine, path, PING_TIMEOUT)
                    .await
                    .is_healthy(),
            };
            if ready {
                tracing::info!(container = self.name(), engine = %self.plan.engine, "inner engine ready");
                let id = self.state.id.clone();
                return Ok(self.transition(EngineReady { id }));
            }

            let now = Instant::now();
            if now >= deadline {
                let err = SuperviseError::EngineNotReady {
                    name: self.name().to_string(),
                    waited: timeout,
                };
                return Err((self, err));
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}

impl Launch<EngineReady> {
    /// Finish the launch, keeping the container.
    pub fn finish(self) -> ContainerId {
        self.state.id
    }
}

impl<S: HasContainer> Launch<S> {
    pub fn container_id(&self) -> &ContainerId {
        self.state.id()
    }

    /// Stop and force-remove the container created by this launch.
    pub async fn rollback<R: ContainerOps>(self, runtime: &R) -> Result<(), SuperviseError> {
        let id = self.state.id();
        tracing::warn!(container = self.name(), id = %id.short(), "rolling back launch");
        runtime
            .discard_container(id, ROLLBACK_STOP_TIMEOUT)
            .await
            .map_err(|e| SuperviseError::container(self.name(), e))
    }
}
