// ABOUTME: Orphan detection and cleanup for managed containers.
// ABOUTME: Orphans carry the managed label but name no configured container.

use super::managed::{LABEL_MANAGED, LABEL_NAME, ManagedSpec};
use crate::nesting::NestingPlan;
use crate::runtime::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
use crate::types::ContainerId;
use std::collections::HashSet;
use std::time::Duration;

/// A container that could not be cleaned up.
#[derive(Debug, Clone)]
pub struct CleanupFailure {
    pub id: ContainerId,
    pub name: String,
    pub error: String,
}

/// Outcome of [`cleanup_orphans`].
#[derive(Debug, Clone, Default)]
pub struct CleanupResult {
    pub removed: Vec<ContainerSummary>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupResult {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The managed name of a container, falling back to its engine name.
pub fn managed_name(summary: &ContainerSummary) -> &str {
    summary
        .labels
        .get(LABEL_NAME)
        .map(String::as_str)
        .unwrap_or(summary.name.as_str())
}

/// Those of `containers` whose managed name is not in `specs`.
pub fn orphans_among(containers: Vec<ContainerSummary>, specs: &[ManagedSpec]) -> Vec<ContainerSummary> {
    let known: HashSet<&str> = specs.iter().map(|s| s.name.as_str()).collect();
    containers
        .into_iter()
        .filter(|c| !known.contains(managed_name(c)))
        .collect()
}

/// Managed containers, running or not, whose name is not in `specs`.
pub async fn detect_orphans<R: ContainerOps>(
    runtime: &R,
    specs: &[ManagedSpec],
) -> Result<Vec<ContainerSummary>, ContainerError> {
    let containers = runtime
        .list_containers(&ContainerFilters::labelled(LABEL_MANAGED, "true"))
        .await?;
    Ok(orphans_among(containers, specs))
}

/// Stop and force-remove `orphans`, then drop their storage volumes.
/// Failures are collected, not raised.
pub async fn cleanup_orphans<R: ContainerOps>(
    runtime: &R,
    orphans: Vec<ContainerSummary>,
    stop_timeout: Duration,
) -> CleanupResult {
    let mut result = CleanupResult::default();

    for orphan in orphans {
        match runtime.discard_container(&orphan.id, stop_timeout).await {
            Ok(()) => {
                let name = managed_name(&orphan).to_string();
                tracing::info!(container = %name, id = %orphan.id.short(), "removed orphan");
                let volume = NestingPlan::storage_volume_name(&name);
                if let Err(e) = runtime.remove_volume(&volume).await {
                    tracing::warn!(container = %name, volume = %volume, error = %e, "storage volume left behind");
                    result.failures.push(CleanupFailure {
                        id: orphan.id.clone(),
                        name,
                        error: format!("volume {volume}: {e}"),
                    });
                }
                result.removed.push(orphan);
            }
            Err(e) => result.failures.push(CleanupFailure {
                id: orphan.id.clone(),
                name: managed_name(&orphan).to_string(),
                error: e.to_string(),
            }),
        }
    }

    result
}
