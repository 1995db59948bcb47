// ABOUTME: Structured supervision events and the broadcast bus that carries them.
// ABOUTME: Also forwards the outer engine's event feed for managed containers.

use crate::runtime::{EngineEvent, EventFilters, EventOps};
use crate::supervisor::{LABEL_MANAGED, LABEL_NAME, Phase};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const DEFAULT_CAPACITY: usize = 256;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HealthEventKind {
    PhaseChanged { from: Phase, to: Phase },
    EngineEvent { action: String },
    Restarted { restarts: u32 },
    GaveUp,
    Recovered,
    OrphanRemoved,
}

impl fmt::Display for HealthEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthEventKind::PhaseChanged { from, to } => write!(f, "{from} -> {to}"),
            HealthEventKind::EngineEvent { action } => write!(f, "engine: {action}"),
            HealthEventKind::Restarted { restarts } => write!(f, "restarted (#{restarts})"),
            HealthEventKind::GaveUp => f.write_str("gave up"),
            HealthEventKind::Recovered => f.write_str("recovered"),
            HealthEventKind::OrphanRemoved => f.write_str("orphan removed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthEvent {
    /// Managed container name.
    pub name: String,
    #[serde(flatten)]
    pub kind: HealthEventKind,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthEvent {
    pub fn new(name: impl Into<String>, kind: HealthEventKind) -> Self {
        Self {
            name: name.into(),
            kind,
            at: Utc::now(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn from_engine(event: &EngineEvent) -> Self {
        let name = event
            .labels
            .get(LABEL_NAME)
            .cloned()
            .or_else(|| event.name.clone())
            .unwrap_or_else(|| event.container.short().to_string());
        Self {
            name,
            kind: HealthEventKind::EngineEvent {
                action: event.action.to_string(),
            },
            at: event.at.unwrap_or_else(Utc::now),
            detail: None,
        }
    }
}

/// Fan-out of [`HealthEvent`]s. Slow subscribers lose the oldest events;
/// publishing never waits.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HealthEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: HealthEvent) {
        let detail = event.detail.as_deref().unwrap_or("");
        match &event.kind {
            HealthEventKind::PhaseChanged { from, to } => {
                tracing::info!(container = %event.name, %from, %to, detail, "phase changed")
            }
            HealthEventKind::EngineEvent { action } => {
                tracing::debug!(container = %event.name, action = %action, "engine event")
            }
            HealthEventKind::Restarted { restarts } => {
                tracing::warn!(container = %event.name, restarts, detail, "restarted")
            }
            HealthEventKind::GaveUp => {
                tracing::error!(container = %event.name, detail, "gave up restarting")
            }
            HealthEventKind::Recovered => {
                tracing::info!(container = %event.name, "recovered")
            }
            HealthEventKind::OrphanRemoved => {
                tracing::info!(container = %event.name, detail, "orphan removed")
            }
        }
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

/// Forward engine events for managed containers into `bus` until `shutdown`.
///
/// The feed is reopened after a short delay whenever it drops.
pub async fn watch_engine_events<R>(runtime: &R, bus: &EventBus, shutdown: CancellationToken)
where
    R: EventOps + ?Sized,
{
    let filters = EventFilters {
        labels: HashMap::from([(LABEL_MANAGED.to_string(), "true".to_string())]),
    };

    while !shutdown.is_cancelled() {
        match runtime.events(&filters).await {
            Ok(mut stream) => loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    next = stream.next() => match next {
                        Some(Ok(event)) => bus.publish(HealthEvent::from_engine(&event)),
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "engine event stream failed");
                            break;
                        }
                        None => {
                            tracing::debug!("engine event stream ended");
                            break;
                        }
                    },
                }
            },
            Err(e) => tracing::warn!(error = %e, "cannot subscribe to engine events"),
        }

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::EngineAction;
    use crate::runtime::fake::FakeRuntime;
    use crate::types::ContainerId;
    use std::sync::Arc;

    fn engine_event(name: &str, managed: bool, action: EngineAction) -> EngineEvent {
        let mut labels = HashMap::from([(LABEL_NAME.to_string(), name.to_string())]);
        if managed {
            labels.insert(LABEL_MANAGED.to_string(), "true".to_string());
        }
        EngineEvent {
            container: ContainerId::new("0123456789abcdef"),
            name: Some(format!("{name}-engine")),
            action,
            labels,
            at: None,
        }
    }

    #[test]
    fn serializes_flat() {
        let event = HealthEvent::new(
            "ci",
            HealthEventKind::PhaseChanged {
                from: Phase::Starting,
                to: Phase::Ready,
            },
        )
        .with_detail("engine answered");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], "ci");
        assert_eq!(json["kind"], "phase-changed");
        assert_eq!(json["from"], "starting");
        assert_eq!(json["to"], "ready");
        assert_eq!(json["detail"], "engine answered");
    }

    #[test]
    fn engine_events_prefer_the_name_label() {
        let event = HealthEvent::from_engine(&engine_event(
            "ci",
            true,
            EngineAction::Die { exit_code: Some(1) },
        ));
        assert_eq!(event.name, "ci");
        assert_eq!(
            event.kind,
            HealthEventKind::EngineEvent {
                action: "die (exit code 1)".into()
            }
        );
    }

    #[tokio::test]
    async fn lagging_subscriber_does_not_block_publisher() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.publish(HealthEvent::new(format!("c{i}"), HealthEventKind::Recovered));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap().name, "c3");
    }

    #[tokio::test]
    async fn forwards_managed_events_until_cancelled() {
        let fake = Arc::new(FakeRuntime::new());
        fake.push_event(engine_event("stranger", false, EngineAction::Start));
        fake.push_event(engine_event("ci", true, EngineAction::Oom));

        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let shutdown = CancellationToken::new();

        let task = {
            let fake = Arc::clone(&fake);
            let bus = bus.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { watch_engine_events(fake.as_ref(), &bus, shutdown).await })
        };

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.name, "ci");
        assert_eq!(
            event.kind,
            HealthEventKind::EngineEvent {
                action: "oom".into()
            }
        );

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
