// ABOUTME: The supervisor: reconciles managed containers against their specs.
// ABOUTME: Tracks phase, restarts and health per container and publishes events.

use super::error::SuperviseError;
use super::launch::Launch;
use super::managed::{DesiredState, LABEL_MANAGED, LABEL_MODE, ManagedSpec};
use super::orphans::{CleanupResult, cleanup_orphans, managed_name, orphans_among};
use super::phase::Phase;
use super::planner::{Action, Observed, plan_actions};
use super::restart::{CrashTracker, RestartDecision};
use super::retry::{RetryPolicy, retry};
use crate::health::{
    ContainerReport, EventBus, HealthEvent, HealthEventKind, HealthReport, HealthStatus,
    probe_container, probe_inner_engine, watch_engine_events,
};
use crate::nesting::{HostCapabilities, ModeRequest, NestingMode, NestingPlan, OuterEngine, negotiate};
use crate::runtime::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary, FullRuntime};
use crate::types::ContainerId;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

const PING_TIMEOUT: Duration = Duration::from_secs(2);
/// Engine events come in bursts; wait for the burst to pass before reacting.
const WAKE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Knobs of the reconcile loop.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Time between reconcile passes when nothing happens.
    pub interval: Duration,
    /// Backoff for engine calls and for restarts.
    pub retry: RetryPolicy,
    pub stop_timeout: Duration,
    /// Host directory under which each container's inner socket is exposed
    /// as `<socket_root>/<name>/`. Without it inner engines are not pinged.
    pub socket_root: Option<PathBuf>,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            stop_timeout: Duration::from_secs(30),
            socket_root: None,
        }
    }
}

/// An action that failed during a pass.
#[derive(Debug, Clone)]
pub struct ActionFailure {
    pub action: String,
    pub error: String,
}

/// What one reconcile pass did.
#[derive(Debug, Default)]
pub struct ReconcileSummary {
    pub performed: Vec<String>,
    /// Actions held back by a restart delay or a failed container.
    pub deferred: Vec<String>,
    pub failures: Vec<ActionFailure>,
    pub orphans: CleanupResult,
}

impl ReconcileSummary {
    pub fn is_converged(&self) -> bool {
        self.performed.is_empty()
            && self.deferred.is_empty()
            && self.failures.is_empty()
            && self.orphans.removed.is_empty()
            && self.orphans.is_clean()
    }
}

#[derive(Debug)]
struct Tracked {
    phase: Phase,
    status: HealthStatus,
    crashes: CrashTracker,
    container: Option<ContainerId>,
    mode: Option<NestingMode>,
    restart_due: Option<Instant>,
    /// Set when nestkeeper itself stopped the container, so its exit is
    /// not a crash.
    stopped_on_purpose: bool,
    last_change: DateTime<Utc>,
}

impl Tracked {
    fn new() -> Self {
        Self {
            phase: Phase::Pending,
            status: HealthStatus::Down("not observed yet".to_string()),
            crashes: CrashTracker::default(),
            container: None,
            mode: None,
            restart_due: None,
            stopped_on_purpose: false,
            last_change: Utc::now(),
        }
    }
}

/// Keeps a set of nested engine containers in their desired state.
pub struct Supervisor<R> {
    runtime: Arc<R>,
    specs: Vec<ManagedSpec>,
    settings: SupervisorSettings,
    host: HostCapabilities,
    outer: OuterEngine,
    bus: EventBus,
    tracked: Mutex<HashMap<String, Tracked>>,
}

impl<R: FullRuntime + 'static> Supervisor<R> {
    pub fn new(
        runtime: Arc<R>,
        specs: Vec<ManagedSpec>,
        settings: SupervisorSettings,
        host: HostCapabilities,
        outer: OuterEngine,
    ) -> Self {
        let tracked = specs
            .iter()
            .map(|s| (s.name.to_string(), Tracked::new()))
            .collect();
        Self {
            runtime,
            specs,
            settings,
            host,
            outer,
            bus: EventBus::default(),
            tracked: Mutex::new(tracked),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn specs(&self) -> &[ManagedSpec] {
        &self.specs
    }

    pub fn phase(&self, name: &str) -> Option<Phase> {
        self.tracked.lock().get(name).map(|t| t.phase)
    }

    /// Reconcile until `shutdown` fires.
    ///
    /// Passes run every `interval`, and early after engine events for
    /// managed containers. Containers are left running on return.
    pub async fn run(&self, shutdown: CancellationToken) {
        let watcher = {
            let runtime = Arc::clone(&self.runtime);
            let bus = self.bus.clone();
            let token = shutdown.child_token();
            tokio::spawn(async move { watch_engine_events(runtime.as_ref(), &bus, token).await })
        };
        let mut wake = self.bus.subscribe();

        'passes: loop {
            match self.reconcile_once().await {
                Ok(summary) if summary.is_converged() => tracing::trace!("converged"),
                Ok(summary) => tracing::debug!(
                    performed = summary.performed.len(),
                    deferred = summary.deferred.len(),
                    failed = summary.failures.len(),
                    orphans = summary.orphans.removed.len(),
                    "reconcile pass done"
                ),
                Err(e) => tracing::error!(error = %e, "reconcile pass failed"),
            }

            let sleep = tokio::time::sleep(self.settings.interval);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break 'passes,
                    _ = &mut sleep => break,
                    event = wake.recv() => match event {
                        Ok(HealthEvent { kind: HealthEventKind::EngineEvent { .. }, .. }) => {
                            tokio::time::sleep(WAKE_DEBOUNCE).await;
                            while wake.try_recv().is_ok() {}
                            break;
                        }
                        Ok(_) | Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break 'passes,
                    },
                }
            }
        }

        if let Err(e) = watcher.await {
            tracing::warn!(error = %e, "event watcher ended abnormally");
        }
    }

    /// One pass: observe, clean up orphans, plan, act, then probe health.
    ///
    /// Fails only when the outer engine cannot be listed; individual action
    /// failures are collected in the summary.
    pub async fn reconcile_once(&self) -> Result<ReconcileSummary, SuperviseError> {
        let mut summary = ReconcileSummary::default();
        let containers = self.list_managed().await?;
        let observed: Vec<Observed> = containers.iter().filter_map(Observed::from_summary).collect();
        self.adopt(&containers);

        let orphans = orphans_among(containers, &self.specs);
        if !orphans.is_empty() {
            let result = cleanup_orphans(self.runtime.as_ref(), orphans, self.settings.stop_timeout).await;
            for removed in &result.removed {
                self.bus.publish(
                    HealthEvent::new(managed_name(removed), HealthEventKind::OrphanRemoved)
                        .with_detail(removed.id.short()),
                );
            }
            for failure in &result.failures {
                tracing::warn!(container = %failure.name, error = %failure.error, "orphan cleanup failed");
            }
            summary.orphans = result;
        }

        for action in plan_actions(&self.specs, &observed) {
            match self.execute(&action).await {
                Ok(true) => summary.performed.push(action.to_string()),
                Ok(false) => summary.deferred.push(action.to_string()),
                Err(e) => {
                    tracing::warn!(%action, error = %e, "action failed");
                    summary.failures.push(ActionFailure {
                        action: action.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.refresh_health().await;
        Ok(summary)
    }

    /// Observe and probe without changing any container.
    pub async fn refresh(&self) -> Result<HealthReport, SuperviseError> {
        let containers = self.list_managed().await?;
        self.adopt(&containers);
        self.refresh_health().await;
        Ok(self.report())
    }

    pub fn report(&self) -> HealthReport {
        let tracked = self.tracked.lock();
        let containers = self
            .specs
            .iter()
            .filter_map(|spec| {
                let t = tracked.get(spec.name.as_str())?;
                Some(ContainerReport {
                    name: spec.name.to_string(),
                    phase: t.phase,
                    status: t.status.clone(),
                    mode: t.mode,
                    container_id: t.container.as_ref().map(|id| id.short().to_string()),
                    restarts: t.crashes.total(),
                    last_change: t.last_change,
                })
            })
            .collect();
        HealthReport::new(containers)
    }

    /// Stop every running managed container, configured or not.
    pub async fn shutdown_all(&self) -> Result<ReconcileSummary, SuperviseError> {
        let mut summary = ReconcileSummary::default();
        for container in self.list_managed().await? {
            if !container.state.is_running() {
                continue;
            }
            let name = managed_name(&container).to_string();
            match self.stop(&name, &container.id).await {
                Ok(()) => summary.performed.push(format!("stop {name} ({})", container.id.short())),
                Err(e) => summary.failures.push(ActionFailure {
                    action: format!("stop {name}"),
                    error: e.to_string(),
                }),
            }
        }
        Ok(summary)
    }

    /// Stop and remove every managed container, configured or not.
    pub async fn remove_all(&self) -> Result<CleanupResult, SuperviseError> {
        let containers = self.list_managed().await?;
        let result = cleanup_orphans(self.runtime.as_ref(), containers, self.settings.stop_timeout).await;
        for removed in &result.removed {
            let name = managed_name(removed);
            if let Some(t) = self.tracked.lock().get_mut(name) {
                t.container = None;
                t.status = HealthStatus::Down("removed".to_string());
            }
            self.set_phase(name, Phase::Removed, None);
        }
        Ok(result)
    }

    async fn list_managed(&self) -> Result<Vec<ContainerSummary>, SuperviseError> {
        let filters = ContainerFilters::labelled(LABEL_MANAGED, "true");
        retry(&self.settings.retry, "list_containers", || {
            self.runtime.list_containers(&filters)
        })
        .await
        .map_err(|e| SuperviseError::container("managed containers", e))
    }

    fn spec(&self, name: &str) -> Option<&ManagedSpec> {
        self.specs.iter().find(|s| s.name.as_str() == name)
    }

    /// Record containers found on the engine, such as those left by an
    /// earlier supervisor run.
    fn adopt(&self, containers: &[ContainerSummary]) {
        for spec in &self.specs {
            let name = spec.name.as_str();
            let found = containers
                .iter()
                .filter(|c| managed_name(c) == name)
                .max_by_key(|c| c.state.is_running());

            let phase = {
                let mut tracked = self.tracked.lock();
                let Some(t) = tracked.get_mut(name) else { continue };
                match found {
                    None => {
                        t.container = None;
                        continue;
                    }
                    Some(c) => {
                        if t.container.as_ref() != Some(&c.id) {
                            t.container = Some(c.id.clone());
                            t.mode = c.labels.get(LABEL_MODE).and_then(|m| mode_from_label(m));
                        }
                        if !c.state.is_running() {
                            t.status = HealthStatus::Down(format!("container is {}", c.state));
                        }
                    }
                }
                t.phase
            };

            let Some(c) = found else { continue };
            if phase == Phase::Pending {
                if c.state.is_running() {
                    self.set_phase(name, Phase::Running, Some("found running".to_string()));
                } else if spec.desired == DesiredState::Stopped {
                    self.set_phase(name, Phase::Stopped, None);
                }
            }
        }
    }

    /// `Ok(false)` when the action was held back.
    async fn execute(&self, action: &Action) -> Result<bool, SuperviseError> {
        match action {
            Action::Create { name } => match self.spec(name.as_str()) {
                Some(spec) => self.bring_up(spec, None).await,
                None => Ok(false),
            },
            Action::Start { name, id } => match self.spec(name.as_str()) {
                Some(spec) => self.bring_up(spec, Some(id.clone())).await,
                None => Ok(false),
            },
            Action::Restart { name, id } => match self.spec(name.as_str()) {
                Some(spec) => self.restart(spec, id).await,
                None => Ok(false),
            },
            Action::Recreate { name, id } => match self.spec(name.as_str()) {
                Some(spec) => self.recreate(spec, id).await,
                None => Ok(false),
            },
            Action::Stop { name, id } => self.stop(name.as_str(), id).await.map(|()| true),
            Action::Remove { name, id } => self.remove(name, id).await.map(|()| true),
        }
    }

    fn current_phase(&self, name: &str) -> Phase {
        self.phase(name).unwrap_or_default()
    }

    /// Apply a phase change and publish it. Illegal changes are logged and
    /// dropped.
    fn set_phase(&self, name: &str, next: Phase, detail: Option<String>) {
        let from = {
            let mut tracked = self.tracked.lock();
            let Some(t) = tracked.get_mut(name) else { return };
            let from = t.phase;
            if from == next {
                return;
            }
            if !from.can_transition_to(next) {
                tracing::warn!(container = name, %from, to = %next, "ignoring illegal phase change");
                return;
            }
            t.phase = next;
            t.last_change = Utc::now();
            from
        };
        let mut event = HealthEvent::new(name, HealthEventKind::PhaseChanged { from, to: next });
        if let Some(detail) = detail {
            event = event.with_detail(detail);
        }
        self.bus.publish(event);
    }

    /// Failed containers stay put; backing-off ones wait for their delay.
    fn may_proceed(&self, name: &str) -> bool {
        let tracked = self.tracked.lock();
        match tracked.get(name) {
            None => false,
            Some(t) => match t.phase {
                Phase::Failed => false,
                Phase::BackingOff => t.restart_due.is_none_or(|due| Instant::now() >= due),
                _ => true,
            },
        }
    }

    fn plan_for(&self, spec: &ManagedSpec) -> Result<NestingPlan, SuperviseError> {
        let plan = negotiate(&spec.nesting, &self.host, &self.outer)?;
        Ok(match &self.settings.socket_root {
            Some(root) => plan.expose_socket_at(root.join(spec.name.as_str())),
            None => plan,
        })
    }

    fn socket_for(&self, spec: &ManagedSpec) -> Option<PathBuf> {
        let root = self.settings.socket_root.as_ref()?;
        Some(root.join(spec.name.as_str()).join(spec.nesting.engine.socket_file()))
    }

    /// Create (or start an existing) container and wait for its engine.
    async fn bring_up(&self, spec: &ManagedSpec, existing: Option<ContainerId>) -> Result<bool, SuperviseError> {
        let name = spec.name.as_str();
        if !self.may_proceed(name) {
            return Ok(false);
        }
        let first = if existing.is_some() { Phase::Starting } else { Phase::Creating };
        if !self.current_phase(name).can_transition_to(first) {
            self.set_phase(name, Phase::Stopped, Some("container went away".to_string()));
        }
        self.set_phase(name, first, None);

        match self.launch(spec, existing).await {
            Ok((id, mode)) => {
                if let Some(t) = self.tracked.lock().get_mut(name) {
                    t.container = Some(id);
                    t.mode = Some(mode);
                    t.restart_due = None;
                    t.stopped_on_purpose = false;
                    t.status = HealthStatus::Healthy;
                }
                self.set_phase(name, Phase::Ready, None);
                Ok(true)
            }
            Err(e) => {
                self.launch_failed(spec, &e);
                Err(e)
            }
        }
    }

    async fn launch(
        &self,
        spec: &ManagedSpec,
        existing: Option<ContainerId>,
    ) -> Result<(ContainerId, NestingMode), SuperviseError> {
        let runtime = self.runtime.as_ref();
        let plan = self.plan_for(spec)?;
        let mode = plan.mode;
        let retry = self.settings.retry.clone();

        let ready = match existing {
            None => {
                let created = Launch::new(spec, plan, retry)
                    .ensure_image(runtime)
                    .await?
                    .create(runtime)
                    .await?;
                self.set_phase(spec.name.as_str(), Phase::Starting, None);
                let started = match created.start(runtime).await {
                    Ok(started) => started,
                    Err((created, e)) => {
                        if let Err(re) = created.rollback(runtime).await {
                            tracing::warn!(container = %spec.name, error = %re, "rollback failed");
                        }
                        return Err(e);
                    }
                };
                match started.wait_engine_ready(runtime, spec.ready_timeout).await {
                    Ok(ready) => ready,
                    Err((started, e)) => {
                        if let Err(re) = started.rollback(runtime).await {
                            tracing::warn!(container = %spec.name, error = %re, "rollback failed");
                        }
                        return Err(e);
                    }
                }
            }
            Some(id) => {
                let started = Launch::adopt(spec, plan, retry, id)
                    .start(runtime)
                    .await
                    .map_err(|(_, e)| e)?;
                match started.wait_engine_ready(runtime, spec.ready_timeout).await {
                    Ok(ready) => ready,
                    Err((started, e)) => {
                        // Keep the container; the next restart starts it again.
                        if let Err(se) = runtime
                            .stop_container(started.container_id(), self.settings.stop_timeout)
                            .await
                        {
                            tracing::warn!(container = %spec.name, error = %se, "stop after failed start failed");
                        }
                        return Err(e);
                    }
                }
            }
        };
        Ok((ready.finish(), mode))
    }

    /// Settle a failed bring-up: back off for transient failures, give up
    /// on permanent ones or when the restart budget is spent.
    fn launch_failed(&self, spec: &ManagedSpec, err: &SuperviseError) {
        let name = spec.name.as_str();
        let exit_code = match err {
            SuperviseError::ContainerExited { exit_code, .. } => *exit_code,
            _ => None,
        };
        let now = Instant::now();
        let decision = {
            let mut tracked = self.tracked.lock();
            let Some(t) = tracked.get_mut(name) else { return };
            t.status = HealthStatus::Down(err.to_string());
            if !err.is_transient() {
                RestartDecision::GiveUp
            } else {
                let decision = t.crashes.record_exit(now, exit_code, spec.restart, &self.settings.retry);
                if let RestartDecision::Restart(delay) = decision {
                    t.restart_due = Some(now + delay);
                }
                decision
            }
        };
        match decision {
            RestartDecision::Restart(delay) => self.set_phase(
                name,
                Phase::BackingOff,
                Some(format!("{err}; retrying in {}ms", delay.as_millis())),
            ),
            RestartDecision::GiveUp => self.give_up(name, err.to_string()),
        }
    }

    fn give_up(&self, name: &str, reason: String) {
        self.set_phase(name, Phase::Failed, Some(reason.clone()));
        self.bus
            .publish(HealthEvent::new(name, HealthEventKind::GaveUp).with_detail(reason));
    }

    /// A container exited: apply its restart policy.
    ///
    /// The policy only covers exits seen while the container was up under
    /// this supervisor. One found exited on the first pass, or stopped by
    /// nestkeeper, is simply started.
    async fn restart(&self, spec: &ManagedSpec, id: &ContainerId) -> Result<bool, SuperviseError> {
        let name = spec.name.as_str();
        let phase = self.current_phase(name);
        let plain_start = match phase {
            Phase::Pending => true,
            Phase::Stopped => self.tracked.lock().get(name).is_some_and(|t| t.stopped_on_purpose),
            _ => false,
        };
        if plain_start {
            tracing::info!(container = name, id = %id.short(), "starting stopped container");
            return self.bring_up(spec, Some(id.clone())).await;
        }
        match phase {
            Phase::Failed | Phase::Stopped | Phase::Stopping | Phase::Removed => return Ok(false),
            // Exit already recorded; waiting out the delay.
            Phase::BackingOff => {}
            _ => {
                let info = self
                    .runtime
                    .inspect_container(id)
                    .await
                    .map_err(|e| SuperviseError::container(name, e))?;
                let status = HealthStatus::from_info(&info);
                let reason = status.to_string();
                let now = Instant::now();
                let decision = {
                    let mut tracked = self.tracked.lock();
                    let Some(t) = tracked.get_mut(name) else { return Ok(false) };
                    t.status = status;
                    let decision =
                        t.crashes.record_exit(now, info.exit_code, spec.restart, &self.settings.retry);
                    if let RestartDecision::Restart(delay) = decision {
                        t.restart_due = Some(now + delay);
                    }
                    decision
                };
                match decision {
                    RestartDecision::GiveUp if info.exit_code == Some(0) && !info.oom_killed => {
                        self.set_phase(name, Phase::Stopped, Some(reason));
                        return Ok(false);
                    }
                    RestartDecision::GiveUp => {
                        self.give_up(name, reason);
                        return Ok(false);
                    }
                    RestartDecision::Restart(_) => self.set_phase(name, Phase::BackingOff, Some(reason)),
                }
            }
        }

        if !self.may_proceed(name) {
            return Ok(false);
        }
        let restarts = self
            .tracked
            .lock()
            .get(name)
            .map(|t| t.crashes.total())
            .unwrap_or_default();
        self.bus
            .publish(HealthEvent::new(name, HealthEventKind::Restarted { restarts }));
        self.bring_up(spec, Some(id.clone())).await
    }

    async fn recreate(&self, spec: &ManagedSpec, id: &ContainerId) -> Result<bool, SuperviseError> {
        let name = spec.name.as_str();
        if self.current_phase(name) == Phase::Failed {
            // Drift means the configuration changed under a failed container.
            self.set_phase(name, Phase::Pending, Some("configuration changed".to_string()));
            if let Some(t) = self.tracked.lock().get_mut(name) {
                t.crashes.reset();
            }
        }
        if !self.may_proceed(name) {
            return Ok(false);
        }
        self.set_phase(name, Phase::Stopping, Some("configuration changed".to_string()));
        self.remove_container(name, id).await?;
        if let Some(t) = self.tracked.lock().get_mut(name) {
            t.container = None;
        }
        self.set_phase(name, Phase::Stopped, None);
        self.bring_up(spec, None).await
    }

    async fn stop(&self, name: &str, id: &ContainerId) -> Result<(), SuperviseError> {
        self.set_phase(name, Phase::Stopping, None);
        let timeout = self.settings.stop_timeout;
        match retry(&self.settings.retry, "stop_container", || {
            self.runtime.stop_container(id, timeout)
        })
        .await
        {
            Ok(()) | Err(ContainerError::NotRunning(_)) | Err(ContainerError::NoSuchContainer(_)) => {
                if let Some(t) = self.tracked.lock().get_mut(name) {
                    t.status = HealthStatus::Down("stopped".to_string());
                    t.stopped_on_purpose = true;
                }
                self.set_phase(name, Phase::Stopped, None);
                Ok(())
            }
            Err(e) => Err(SuperviseError::container(name, e)),
        }
    }

    async fn remove(&self, name: &str, id: &ContainerId) -> Result<(), SuperviseError> {
        self.remove_container(name, id).await?;
        let absent = self.spec(name).is_some_and(|s| s.desired == DesiredState::Absent);
        {
            let mut tracked = self.tracked.lock();
            if let Some(t) = tracked.get_mut(name)
                && (absent || t.container.as_ref() == Some(id))
            {
                t.container = None;
                t.status = HealthStatus::Down("removed".to_string());
            }
        }
        if absent {
            let volume = NestingPlan::storage_volume_name(name);
            retry(&self.settings.retry, "remove_volume", || self.runtime.remove_volume(&volume))
                .await
                .map_err(|e| SuperviseError::container(name, e))?;
            self.set_phase(name, Phase::Removed, None);
        }
        Ok(())
    }

    async fn remove_container(&self, name: &str, id: &ContainerId) -> Result<(), SuperviseError> {
        let grace = self.settings.stop_timeout;
        retry(&self.settings.retry, "discard_container", || {
            self.runtime.discard_container(id, grace)
        })
        .await
        .map_err(|e| SuperviseError::container(name, e))
    }

    /// Probe every container expected to be up and move it between
    /// running, ready and degraded.
    async fn refresh_health(&self) {
        for spec in &self.specs {
            let name = spec.name.as_str();
            let (id, phase) = {
                let tracked = self.tracked.lock();
                match tracked.get(name) {
                    Some(t) => (t.container.clone(), t.phase),
                    None => continue,
                }
            };
            let Some(id) = id else { continue };
            if !phase.is_active() {
                continue;
            }

            let status = match probe_container(self.runtime.as_ref(), &id).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::debug!(container = name, error = %e, "health probe failed");
                    continue;
                }
            };
            let status = match self.socket_for(spec) {
                Some(socket) if status.is_healthy() => {
                    probe_inner_engine(spec.nesting.engine, &socket, PING_TIMEOUT).await
                }
                _ => status,
            };
            self.apply_health(name, status);
        }
    }

    fn apply_health(&self, name: &str, status: HealthStatus) {
        let phase = {
            let mut tracked = self.tracked.lock();
            let Some(t) = tracked.get_mut(name) else { return };
            t.status = status.clone();
            t.phase
        };
        match (&status, phase) {
            (HealthStatus::Healthy, Phase::Degraded) => {
                self.set_phase(name, Phase::Ready, None);
                self.bus
                    .publish(HealthEvent::new(name, HealthEventKind::Recovered));
            }
            (HealthStatus::Healthy, Phase::Running) => self.set_phase(name, Phase::Ready, None),
            // An exit is picked up by the next pass.
            (HealthStatus::Down(_), _) => {}
            (_, Phase::Ready) => self.set_phase(name, Phase::Degraded, Some(status.to_string())),
            _ => {}
        }
    }
}

fn mode_from_label(value: &str) -> Option<NestingMode> {
    match value.parse::<ModeRequest>().ok()? {
        ModeRequest::Only(mode) => Some(mode),
        ModeRequest::Auto => None,
    }
}
