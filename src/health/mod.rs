// ABOUTME: Health reporting: container and inner-engine probes, events, reports.
// ABOUTME: Everything here observes; nothing here changes container state.

mod events;
mod report;
mod status;

pub use events::{EventBus, HealthEvent, HealthEventKind, watch_engine_events};
pub use report::{ContainerReport, HealthReport};
pub use status::{HealthStatus, probe_container, probe_inner_engine};
