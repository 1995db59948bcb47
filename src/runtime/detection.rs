// ABOUTME: Local engine socket detection.
// ABOUTME: Honors explicit config and DOCKER_HOST, then probes Podman and Docker sockets.

use super::types::{RuntimeConfig, RuntimeSocket, RuntimeType};
use std::path::Path;

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Error during runtime detection.
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error("no container runtime found (checked DOCKER_HOST, Podman and Docker sockets)")]
    NoRuntimeFound,

    #[error("unsupported DOCKER_HOST {0:?}: only unix:// sockets are supported")]
    UnsupportedHost(String),
}

/// Detect the engine on the local system with no explicit override.
pub fn detect_local() -> Result<RuntimeSocket, DetectionError> {
    detect(None)
}

/// Detect the engine on the local system.
///
/// Order:
/// 1. Explicit `config` (runtime and/or socket)
/// 2. `DOCKER_HOST=unix://...`
/// 3. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 4. Rootful Podman socket (`/run/podman/podman.sock`)
/// 5. Docker socket (`/var/run/docker.sock`)
pub fn detect(config: Option<&RuntimeConfig>) -> Result<RuntimeSocket, DetectionError> {
    let docker_host = std::env::var("DOCKER_HOST").ok();
    let socket = detect_with(
        config,
        docker_host.as_deref(),
        current_uid().as_deref(),
        |p| p.exists(),
    )?;
    tracing::debug!(
        runtime = %socket.runtime_type,
        socket = %socket.socket_path,
        "detected container runtime"
    );
    Ok(socket)
}

/// Detection with the environment passed in, so the order can be tested.
pub(crate) fn detect_with(
    config: Option<&RuntimeConfig>,
    docker_host: Option<&str>,
    uid: Option<&str>,
    exists: impl Fn(&Path) -> bool,
) -> Result<RuntimeSocket, DetectionError> {
    if let Some(cfg) = config {
        match (cfg.runtime, &cfg.socket) {
            (Some(runtime_type), socket) => {
                return Ok(RuntimeSocket {
                    runtime_type,
                    socket_path: socket
                        .clone()
                        .unwrap_or_else(|| default_socket_path(runtime_type).to_string()),
                });
            }
            (None, Some(socket)) => {
                return Ok(RuntimeSocket {
                    runtime_type: RuntimeType::from_socket_path(socket),
                    socket_path: socket.clone(),
                });
            }
            (None, None) => {}
        }
    }

    if let Some(host) = docker_host.filter(|h| !h.is_empty()) {
        let path = host
            .strip_prefix("unix://")
            .ok_or_else(|| DetectionError::UnsupportedHost(host.to_string()))?;
        return Ok(RuntimeSocket {
            runtime_type: RuntimeType::from_socket_path(path),
            socket_path: path.to_string(),
        });
    }

    if let Some(uid) = uid {
        let rootless_socket = format!("/run/user/{uid}/podman/podman.sock");
        if exists(Path::new(&rootless_socket)) {
            return Ok(RuntimeSocket {
                runtime_type: RuntimeType::Podman,
                socket_path: rootless_socket,
            });
        }
    }

    if exists(Path::new(ROOTFUL_PODMAN)) {
        return Ok(RuntimeSocket {
            runtime_type: RuntimeType::Podman,
            socket_path: ROOTFUL_PODMAN.to_string(),
        });
    }

    if exists(Path::new(DOCKER_SOCKET)) {
        return Ok(RuntimeSocket {
            runtime_type: RuntimeType::Docker,
            socket_path: DOCKER_SOCKET.to_string(),
        });
    }

    Err(DetectionError::NoRuntimeFound)
}

fn current_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

fn default_socket_path(runtime: RuntimeType) -> &'static str {
    match runtime {
        RuntimeType::Docker => DOCKER_SOCKET,
        RuntimeType::Podman => ROOTFUL_PODMAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nothing(_: &Path) -> bool {
        false
    }

    #[test]
    fn explicit_runtime_wins_over_everything() {
        let cfg = RuntimeConfig {
            runtime: Some(RuntimeType::Podman),
            socket: None,
        };
        let found = detect_with(Some(&cfg), Some("unix:///tmp/d.sock"), None, nothing).unwrap();
        assert_eq!(found.runtime_type, RuntimeType::Podman);
        assert_eq!(found.socket_path, ROOTFUL_PODMAN);
    }

    #[test]
    fn explicit_socket_infers_type() {
        let cfg = RuntimeConfig {
            runtime: None,
            socket: Some("/run/user/1000/podman/podman.sock".into()),
        };
        let found = detect_with(Some(&cfg), None, None, nothing).unwrap();
        assert_eq!(found.runtime_type, RuntimeType::Podman);
    }

    #[test]
    fn docker_host_unix_socket_is_used() {
        let found = detect_with(None, Some("unix:///var/lib/nk/docker.sock"), None, nothing)
            .unwrap();
        assert_eq!(found.socket_path, "/var/lib/nk/docker.sock");
        assert_eq!(found.runtime_type, RuntimeType::Docker);
    }

    #[test]
    fn docker_host_tcp_is_rejected() {
        let err = detect_with(None, Some("tcp://10.0.0.1:2375"), None, nothing).unwrap_err();
        assert!(matches!(err, DetectionError::UnsupportedHost(_)));
    }

    #[test]
    fn rootless_podman_preferred_over_docker() {
        let found = detect_with(None, None, Some("1000"), |_| true).unwrap();
        assert_eq!(found.socket_path, "/run/user/1000/podman/podman.sock");
    }

    #[test]
    fn falls_back_to_docker_socket() {
        let found =
            detect_with(None, None, Some("1000"), |p| p == Path::new(DOCKER_SOCKET)).unwrap();
        assert_eq!(found.runtime_type, RuntimeType::Docker);
    }

    #[test]
    fn nothing_found() {
        assert!(matches!(
            detect_with(None, None, Some("0"), nothing),
            Err(DetectionError::NoRuntimeFound)
        ));
    }
}
