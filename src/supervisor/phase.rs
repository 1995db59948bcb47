// ABOUTME: Lifecycle phase of a managed container as seen by the supervisor.
// ABOUTME: Encodes which phase changes are legal.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Known from configuration, nothing done yet.
    #[default]
    Pending,
    Creating,
    Starting,
    /// Container process is up; the inner engine has not answered yet.
    Running,
    /// Inner engine answers on its socket.
    Ready,
    /// Was ready, now fails health checks.
    Degraded,
    /// Waiting out a restart delay.
    BackingOff,
    Stopping,
    Stopped,
    /// Restart budget exhausted or setup impossible. Left alone until the
    /// container's configuration changes.
    Failed,
    Removed,
}

impl Phase {
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        if self == next || next == Removed {
            return true;
        }
        match self {
            Pending => matches!(
                next,
                Creating | Starting | Running | BackingOff | Stopping | Stopped | Failed
            ),
            Creating => matches!(next, Starting | Stopped | BackingOff | Failed),
            Starting => matches!(next, Running | Ready | BackingOff | Failed | Stopping),
            Running => matches!(next, Ready | Degraded | Stopping | Stopped | BackingOff | Failed),
            Ready => matches!(next, Degraded | Stopping | Stopped | BackingOff | Failed),
            Degraded => matches!(next, Ready | Stopping | Stopped | BackingOff | Failed),
            BackingOff => matches!(next, Creating | Starting | Stopping | Stopped | Failed),
            Stopping => matches!(next, Stopped | Failed),
            Stopped => matches!(next, Creating | Starting),
            Failed => matches!(next, Pending),
            Removed => matches!(next, Pending),
        }
    }

    /// The container is expected to be up.
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Running | Phase::Ready | Phase::Degraded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::Creating => "creating",
            Phase::Starting => "starting",
            Phase::Running => "running",
            Phase::Ready => "ready",
            Phase::Degraded => "degraded",
            Phase::BackingOff => "backing-off",
            Phase::Stopping => "stopping",
            Phase::Stopped => "stopped",
            Phase::Failed => "failed",
            Phase::Removed => "removed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 11] = [
        Phase::Pending,
        Phase::Creating,
        Phase::Starting,
        Phase::Running,
        Phase::Ready,
        Phase::Degraded,
        Phase::BackingOff,
        Phase::Stopping,
        Phase::Stopped,
        Phase::Failed,
        Phase::Removed,
    ];

    #[test]
    fn every_phase_may_be_removed() {
        for phase in ALL {
            assert!(phase.can_transition_to(Phase::Removed), "{phase}");
        }
    }

    #[test]
    fn failed_only_resets_to_pending() {
        for next in ALL {
            let allowed = matches!(next, Phase::Pending | Phase::Failed | Phase::Removed);
            assert_eq!(Phase::Failed.can_transition_to(next), allowed, "failed -> {next}");
        }
    }

    #[test]
    fn happy_path_is_legal() {
        let path = [
            Phase::Pending,
            Phase::Creating,
            Phase::Starting,
            Phase::Running,
            Phase::Ready,
            Phase::Degraded,
            Phase::Ready,
            Phase::Stopping,
            Phase::Stopped,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn illegal_jumps_are_rejected() {
        assert!(!Phase::Stopped.can_transition_to(Phase::Ready));
        assert!(!Phase::Creating.can_transition_to(Phase::Ready));
        assert!(!Phase::Stopping.can_transition_to(Phase::Running));
    }

    #[test]
    fn serializes_kebab_case() {
        assert_eq!(serde_json::to_string(&Phase::BackingOff).unwrap(), "\"backing-off\"");
    }
}
