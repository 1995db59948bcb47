// ABOUTME: Shared helpers for connecting to the outer engine.
// ABOUTME: Detection, supervisor construction, container lookup and lock release.

use nestkeeper::config::Config;
use nestkeeper::diagnostics::{Diagnostics, Warning};
use nestkeeper::error::{Error, Result};
use nestkeeper::nesting::{HostCapabilities, OuterEngine};
use nestkeeper::output::Output;
use nestkeeper::runtime::{
    BollardRuntime, ContainerFilters, ContainerOps, ContainerSummary, RuntimeError, RuntimeInfo,
    detect,
};
use nestkeeper::supervisor::{LABEL_MANAGED, LABEL_NAME, Supervisor, SupervisorLock};
use std::collections::HashMap;
use std::sync::Arc;

pub struct Connection {
    pub runtime: Arc<BollardRuntime>,
    pub outer: OuterEngine,
}

/// Detect the outer engine, connect, and read what nesting needs from it.
pub async fn connect_to_runtime(config: &Config, output: &Output) -> Result<Connection> {
    output.progress("  → Detecting runtime...");
    let socket = detect(Some(&config.runtime)).map_err(RuntimeError::from)?;
    output.progress(&format!(
        "  → Found {} at {}",
        socket.runtime_type, socket.socket_path
    ));

    let runtime = BollardRuntime::connect(&socket).map_err(RuntimeError::from)?;
    let metadata = runtime.info().await.map_err(RuntimeError::from)?;
    tracing::debug!(
        engine = %metadata.name,
        version = %metadata.version,
        rootless = metadata.rootless,
        "connected to outer engine"
    );

    Ok(Connection {
        runtime: Arc::new(runtime),
        outer: OuterEngine::from_metadata(socket.runtime_type, &metadata),
    })
}

pub async fn build_supervisor(config: &Config, output: &Output) -> Result<Supervisor<BollardRuntime>> {
    let connection = connect_to_runtime(config, output).await?;
    Ok(Supervisor::new(
        connection.runtime,
        config.to_specs()?,
        config.supervisor_settings()?,
        HostCapabilities::probe(),
        connection.outer,
    ))
}

/// The container backing managed `name`, preferring a running one.
pub async fn find_container(runtime: &BollardRuntime, name: &str) -> Result<Option<ContainerSummary>> {
    let filters = ContainerFilters {
        labels: HashMap::from([
            (LABEL_MANAGED.to_string(), "true".to_string()),
            (LABEL_NAME.to_string(), name.to_string()),
        ]),
        name: None,
        all: true,
    };
    let containers = runtime.list_containers(&filters).await?;
    Ok(containers.into_iter().max_by_key(|c| c.state.is_running()))
}

pub fn ensure_configured(config: &Config, name: &str) -> Result<()> {
    match config.container(name) {
        Some(_) => Ok(()),
        None => Err(Error::UnknownContainer(name.to_string())),
    }
}

pub fn acquire_lock(config: &Config, force: bool, output: &Output) -> Result<SupervisorLock> {
    output.progress("  → Acquiring supervisor lock...");
    let lock = SupervisorLock::acquire(&config.state_dir()?, force)?;
    tracing::debug!(holder = %lock.info().holder, pid = lock.info().pid, "supervisor lock held");
    Ok(lock)
}

/// Release the lock; failure is reported, not raised.
pub fn release_lock(lock: SupervisorLock, diag: &mut Diagnostics) {
    if let Err(e) = lock.release() {
        diag.warn(Warning::lock_release(format!(
            "failed to release supervisor lock: {e}"
        )));
    }
}
