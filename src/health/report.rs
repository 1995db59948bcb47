// ABOUTME: Point-in-time health report over all managed containers.
// ABOUTME: Serializes to JSON and renders as a plain table.

use super::status::HealthStatus;
use crate::nesting::NestingMode;
use crate::supervisor::Phase;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerReport {
    pub name: String,
    pub phase: Phase,
    #[serde(flatten)]
    pub status: HealthStatus,
    pub mode: Option<NestingMode>,
    pub container_id: Option<String>,
    pub restarts: u32,
    pub last_change: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub generated_at: DateTime<Utc>,
    pub containers: Vec<ContainerReport>,
}

impl HealthReport {
    pub fn new(mut containers: Vec<ContainerReport>) -> Self {
        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            generated_at: Utc::now(),
            containers,
        }
    }

    pub fn all_healthy(&self) -> bool {
        self.containers.iter().all(|c| c.status.is_healthy())
    }

    pub fn get(&self, name: &str) -> Option<&ContainerReport> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .containers
            .iter()
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max("NAME".len());
        writeln!(
            f,
            "{:<width$}  {:<11}  {:<10}  {:>8}  STATUS",
            "NAME", "PHASE", "MODE", "RESTARTS"
        )?;
        for c in &self.containers {
            let mode = c.mode.map(NestingMode::as_str).unwrap_or("-");
            writeln!(
                f,
                "{:<width$}  {:<11}  {:<10}  {:>8}  {}",
                c.name,
                c.phase.as_str(),
                mode,
                c.restarts,
                c.status
            )?;
        }
        Ok(())
    }
}
