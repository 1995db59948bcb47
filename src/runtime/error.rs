// ABOUTME: Failure to find or reach the outer engine, as one snafu error.
// ABOUTME: Callers branch on kind() and show hint() to the user.

use snafu::Snafu;

use super::detection::DetectionError;
use super::traits::RuntimeInfoError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("could not locate an engine: {source}"))]
    Detection { source: DetectionError },

    #[snafu(display("could not talk to the engine: {source}"))]
    Connection { source: RuntimeInfoError },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    NoEngine,
    /// DOCKER_HOST names a TCP or SSH endpoint.
    RemoteHost,
    Unreachable,
    EngineFailure,
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            Self::Detection {
                source: DetectionError::NoRuntimeFound,
            } => RuntimeErrorKind::NoEngine,
            Self::Detection {
                source: DetectionError::UnsupportedHost(_),
            } => RuntimeErrorKind::RemoteHost,
            Self::Connection {
                source: RuntimeInfoError::Unreachable(_),
            } => RuntimeErrorKind::Unreachable,
            Self::Connection {
                source: RuntimeInfoError::Engine(_),
            } => RuntimeErrorKind::EngineFailure,
        }
    }

    /// What the user can do about it, when there is something obvious.
    pub fn hint(&self) -> Option<&'static str> {
        match self.kind() {
            RuntimeErrorKind::NoEngine => {
                Some("start Docker or Podman, or set `runtime.socket` in nestkeeper.yml")
            }
            RuntimeErrorKind::RemoteHost => {
                Some("nestkeeper needs a local unix socket; unset DOCKER_HOST or point it at unix://")
            }
            RuntimeErrorKind::Unreachable => {
                Some("check that the engine is running and that you may access its socket")
            }
            RuntimeErrorKind::EngineFailure => None,
        }
    }
}

impl From<DetectionError> for RuntimeError {
    fn from(source: DetectionError) -> Self {
        Self::Detection { source }
    }
}

impl From<RuntimeInfoError> for RuntimeError {
    fn from(source: RuntimeInfoError) -> Self {
        Self::Connection { source }
    }
}
