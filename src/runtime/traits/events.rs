// ABOUTME: Engine event stream trait for container engines.
// ABOUTME: Typed container lifecycle events (start, die, oom, health_status, ...).

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<EngineEvent, EventError>> + Send>>;

/// Subscribe to the engine's event feed.
#[async_trait]
pub trait EventOps: Sealed + Send + Sync {
    /// Stream container events from now on. The stream ends only when the
    /// connection drops.
    async fn events(&self, filters: &EventFilters) -> Result<EventStream, EventError>;
}

/// Narrow the event feed. Only container events are ever requested.
#[derive(Debug, Clone, Default)]
pub struct EventFilters {
    /// Only containers carrying all of these labels (key=value).
    pub labels: HashMap<String, String>,
}

/// A container lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub container: ContainerId,
    /// Container name from the event attributes, if the engine sent one.
    pub name: Option<String>,
    pub action: EngineAction,
    pub labels: HashMap<String, String>,
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    Create,
    Start,
    Die { exit_code: Option<i64> },
    Stop,
    Kill,
    Oom,
    HealthStatus(String),
    Destroy,
    Other(String),
}

impl EngineAction {
    /// Parse the `Action` field of an event.
    ///
    /// Health events arrive as `health_status: healthy`. Exec events carry the
    /// command after a colon and fall through to `Other`.
    pub fn parse(action: &str, attributes: &HashMap<String, String>) -> Self {
        if let Some(status) = action.strip_prefix("health_status:") {
            return EngineAction::HealthStatus(status.trim().to_string());
        }
        match action {
            "create" => EngineAction::Create,
            "start" => EngineAction::Start,
            "die" => EngineAction::Die {
                exit_code: attributes.get("exitCode").and_then(|c| c.parse().ok()),
            },
            "stop" => EngineAction::Stop,
            "kill" => EngineAction::Kill,
            "oom" => EngineAction::Oom,
            "destroy" | "remove" => EngineAction::Destroy,
            other => EngineAction::Other(other.to_string()),
        }
    }

    /// Events that mean the container is no longer running.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineAction::Die { .. } | EngineAction::Oom | EngineAction::Destroy
        )
    }
}

impl std::fmt::Display for EngineAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineAction::Create => f.write_str("create"),
            EngineAction::Start => f.write_str("start"),
            EngineAction::Die {
                exit_code: Some(code),
            } => write!(f, "die (exit code {code})"),
            EngineAction::Die { exit_code: None } => f.write_str("die"),
            EngineAction::Stop => f.write_str("stop"),
            EngineAction::Kill => f.write_str("kill"),
            EngineAction::Oom => f.write_str("oom"),
            EngineAction::HealthStatus(status) => write!(f, "health_status: {status}"),
            EngineAction::Destroy => f.write_str("destroy"),
            EngineAction::Other(action) => f.write_str(action),
        }
    }
}

/// Errors from the event stream.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event stream error: {0}")]
    Stream(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_carries_value() {
        let action = EngineAction::parse("health_status: unhealthy", &HashMap::new());
        assert_eq!(action, EngineAction::HealthStatus("unhealthy".into()));
    }

    #[test]
    fn die_reads_exit_code_attribute() {
        let attrs = HashMap::from([("exitCode".to_string(), "137".to_string())]);
        let action = EngineAction::parse("die", &attrs);
        assert_eq!(
            action,
            EngineAction::Die {
                exit_code: Some(137)
            }
        );
        assert!(action.is_terminal());
    }

    #[test]
    fn exec_events_are_other() {
        let action = EngineAction::parse("exec_start: sh -c true", &HashMap::new());
        assert!(matches!(action, EngineAction::Other(_)));
        assert!(!action.is_terminal());
    }
}
