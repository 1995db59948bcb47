// ABOUTME: Error types for supervising managed containers.
// ABOUTME: Wraps engine, nesting and lock failures with a kind for callers.

use crate::nesting::NestingError;
use crate::runtime::{ContainerError, ImageError, RuntimeInfoError};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Errors raised while bringing up, restarting or tearing down containers.
#[derive(Debug, thiserror::Error)]
pub enum SuperviseError {
    #[error("image {image}: {source}")]
    Image { image: String, source: ImageError },

    #[error("container {name}: {source}")]
    Container {
        name: String,
        source: ContainerError,
    },

    #[error(transparent)]
    Nesting(#[from] NestingError),

    #[error("inner engine of {name} did not answer within {}s", .waited.as_secs())]
    EngineNotReady { name: String, waited: Duration },

    #[error("{name} exited during startup ({})", exit_detail(.exit_code, .oom_killed))]
    ContainerExited {
        name: String,
        exit_code: Option<i64>,
        oom_killed: bool,
    },

    #[error("outer engine unavailable: {0}")]
    Engine(#[from] RuntimeInfoError),

    #[error("supervisor lock held by {holder} (pid {pid}) since {started_at}")]
    LockHeld {
        holder: String,
        pid: u32,
        started_at: DateTime<Utc>,
    },

    #[error("supervisor lock error: {0}")]
    Lock(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_detail(exit_code: &Option<i64>, oom_killed: &bool) -> String {
    let code = exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
    if *oom_killed {
        format!("exit code {code}, out of memory")
    } else {
        format!("exit code {code}")
    }
}

/// Coarse classification of [`SuperviseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperviseErrorKind {
    Image,
    Container,
    Nesting,
    NotReady,
    Exited,
    Engine,
    Lock,
    Io,
}

impl SuperviseError {
    pub fn image(image: impl ToString, source: ImageError) -> Self {
        SuperviseError::Image {
            image: image.to_string(),
            source,
        }
    }

    pub fn container(name: impl ToString, source: ContainerError) -> Self {
        SuperviseError::Container {
            name: name.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> SuperviseErrorKind {
        match self {
            SuperviseError::Image { .. } => SuperviseErrorKind::Image,
            SuperviseError::Container { .. } => SuperviseErrorKind::Container,
            SuperviseError::Nesting(_) => SuperviseErrorKind::Nesting,
            SuperviseError::EngineNotReady { .. } => SuperviseErrorKind::NotReady,
            SuperviseError::ContainerExited { .. } => SuperviseErrorKind::Exited,
            SuperviseError::Engine(_) => SuperviseErrorKind::Engine,
            SuperviseError::LockHeld { .. } | SuperviseError::Lock(_) => SuperviseErrorKind::Lock,
            SuperviseError::Io(_) => SuperviseErrorKind::Io,
        }
    }

    /// Whether the failure is worth another attempt later. Nesting failures
    /// and held locks do not go away by themselves.
    pub fn is_transient(&self) -> bool {
        match self {
            SuperviseError::Image { source, .. } => source.is_transient(),
            SuperviseError::Container { source, .. } => source.is_transient(),
            SuperviseError::EngineNotReady { .. } | SuperviseError::ContainerExited { .. } => true,
            SuperviseError::Engine(_) => true,
            SuperviseError::Nesting(_)
            | SuperviseError::LockHeld { .. }
            | SuperviseError::Lock(_)
            | SuperviseError::Io(_) => false,
        }
    }
}

impl super::retry::Transient for SuperviseError {
    fn is_transient(&self) -> bool {
        SuperviseError::is_transient(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_message_mentions_oom() {
        let err = SuperviseError::ContainerExited {
            name: "ci".into(),
            exit_code: Some(137),
            oom_killed: true,
        };
        assert_eq!(
            err.to_string(),
            "ci exited during startup (exit code 137, out of memory)"
        );
        assert_eq!(err.kind(), SuperviseErrorKind::Exited);
    }

    #[test]
    fn not_ready_formats_duration() {
        let err = SuperviseError::EngineNotReady {
            name: "ci".into(),
            waited: Duration::from_secs(90),
        };
        assert_eq!(err.to_string(), "inner engine of ci did not answer within 90s");
    }

    #[test]
    fn transience_follows_source() {
        let err = SuperviseError::container("ci", ContainerError::Engine("busy".into()));
        assert!(err.is_transient());
        let err = SuperviseError::container("ci", ContainerError::ImageMissing("x".into()));
        assert!(!err.is_transient());
        assert_eq!(err.kind(), SuperviseErrorKind::Container);
    }
}
