// ABOUTME: Supervision of managed nested-engine containers.
// ABOUTME: Desired state, planning, type-state bring-up, restarts, orphans and the lock.

mod error;
mod launch;
mod lock;
mod managed;
mod orphans;
mod phase;
mod planner;
mod reconciler;
mod restart;
mod retry;

pub use error::{SuperviseError, SuperviseErrorKind};
pub use launch::{
    Created, EngineReady, HasContainer, ImageReady, Launch, LaunchResult, Planned, Started,
};
pub use lock::{LOCK_FILENAME, LOCK_HEARTBEAT, LockInfo, SupervisorLock};
pub use managed::{
    DesiredState, LABEL_FINGERPRINT, LABEL_MANAGED, LABEL_MODE, LABEL_NAME, ManagedSpec,
};
pub use orphans::{
    CleanupFailure, CleanupResult, cleanup_orphans, detect_orphans, managed_name, orphans_among,
};
pub use phase::Phase;
pub use planner::{Action, Observed, plan_actions};
pub use reconciler::{ActionFailure, ReconcileSummary, Supervisor, SupervisorSettings};
pub use restart::{CrashTracker, DEFAULT_CRASH_WINDOW, RestartDecision, RestartPolicy};
pub use retry::{RetryPolicy, Transient, retry};
