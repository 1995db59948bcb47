// ABOUTME: Probes what the host kernel can grant to a nested engine.
// ABOUTME: Reads cgroup, user namespace, fuse and container markers from /proc and /sys.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CgroupVersion {
    V1,
    V2,
}

impl fmt::Display for CgroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CgroupVersion::V1 => f.write_str("v1"),
            CgroupVersion::V2 => f.write_str("v2"),
        }
    }
}

/// Host facts that decide which nesting modes are possible.
///
/// Plain data: negotiation is tested against hand-built values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostCapabilities {
    pub cgroup: CgroupVersion,
    /// Controllers available to this cgroup subtree (cgroup v2 only).
    pub delegated_controllers: Vec<String>,
    pub user_namespaces: bool,
    pub is_root: bool,
    pub has_fuse: bool,
    /// nestkeeper itself runs inside a container.
    pub in_container: bool,
}

impl HostCapabilities {
    /// Probe the running system.
    pub fn probe() -> Self {
        let caps = Self::probe_at(Path::new("/"));
        tracing::debug!(?caps, "probed host capabilities");
        caps
    }

    /// Probe a filesystem rooted at `root`.
    pub fn probe_at(root: &Path) -> Self {
        let at = |p: &str| -> PathBuf { root.join(p.trim_start_matches('/')) };
        let read = |p: &str| std::fs::read_to_string(at(p)).ok();

        let controllers = read("/sys/fs/cgroup/cgroup.controllers");
        let cgroup = if controllers.is_some() {
            CgroupVersion::V2
        } else {
            CgroupVersion::V1
        };
        let delegated_controllers = controllers
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let max_userns = read("/proc/sys/user/max_user_namespaces")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0);
        // Debian-family kernels gate unprivileged user namespaces separately.
        let unprivileged_clone = read("/proc/sys/kernel/unprivileged_userns_clone")
            .map(|s| s.trim() == "1")
            .unwrap_or(true);

        let is_root = read("/proc/self/status")
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(2))
                    .map(|euid| euid == "0")
            })
            .unwrap_or(false);

        Self {
            cgroup,
            delegated_controllers,
            user_namespaces: max_userns > 0 && unprivileged_clone,
            is_root,
            has_fuse: at("/dev/fuse").exists(),
            in_container: at("/.dockerenv").exists() || at("/run/.containerenv").exists(),
        }
    }

    /// Whether `controller` (e.g. `memory`, `pids`) can be delegated.
    pub fn has_controller(&self, controller: &str) -> bool {
        self.delegated_controllers.iter().any(|c| c == controller)
    }
}
