// ABOUTME: Diagnostics accumulator for non-fatal warnings during a command.
// ABOUTME: Collects problems that should be shown to users without failing the run.

use crate::supervisor::CleanupResult;

/// Collects non-fatal warnings during supervision commands.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Record one warning per container that could not be cleaned up.
    pub fn cleanup_failures(&mut self, result: &CleanupResult) {
        for failure in &result.failures {
            self.warn(Warning::orphan_cleanup(format!(
                "could not remove {} ({}): {}",
                failure.name,
                failure.id.short(),
                failure.error
            )));
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning collected during a command.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn orphan_cleanup(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::OrphanCleanup,
            message: message.into(),
        }
    }

    pub fn lock_release(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockRelease,
            message: message.into(),
        }
    }

    pub fn lock_heartbeat(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::LockHeartbeat,
            message: message.into(),
        }
    }

    pub fn event_stream(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::EventStream,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A managed container could not be stopped or removed.
    OrphanCleanup,
    /// Failed to release the supervisor lock (lock file may remain).
    LockRelease,
    /// The supervisor lock could not be refreshed, so others may break it.
    LockHeartbeat,
    /// Supervision events were dropped before they could be shown.
    EventStream,
}
