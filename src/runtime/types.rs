// ABOUTME: Runtime type definitions for Docker and Podman.
// ABOUTME: RuntimeType, the detected socket endpoint, and the explicit override.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The container engine flavour behind a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl RuntimeType {
    /// Guess from a socket path. Anything not obviously Podman is Docker.
    pub fn from_socket_path(path: &str) -> Self {
        if path.contains("podman") {
            RuntimeType::Podman
        } else {
            RuntimeType::Docker
        }
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "docker"),
            RuntimeType::Podman => write!(f, "podman"),
        }
    }
}

/// A reachable engine API socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSocket {
    pub runtime_type: RuntimeType,
    pub socket_path: String,
}

/// Explicit runtime override from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Explicit runtime type (overrides auto-detection).
    pub runtime: Option<RuntimeType>,
    /// Explicit socket path (overrides the runtime's default).
    pub socket: Option<String>,
}
