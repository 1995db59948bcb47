// ABOUTME: Composable capability traits for container engines.
// ABOUTME: ImageOps, ContainerOps, ExecOps, LogOps, EventOps, ArchiveOps, RuntimeInfo.

mod archive;
mod container;
mod events;
mod exec;
mod image;
mod logs;
mod runtime_info;
pub(crate) mod sealed;
mod shared_types;

pub use archive::{ArchiveError, ArchiveOps};
pub use container::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use events::{EngineAction, EngineEvent, EventError, EventFilters, EventOps, EventStream};
pub use exec::{ExecError, ExecOps};
pub use image::{ImageError, ImageOps};
pub use logs::{LogError, LogLine, LogLineStream, LogOps, LogOptions, LogStream};
pub use runtime_info::{RuntimeInfo, RuntimeInfoError};
pub use shared_types::*;

/// Everything the supervisor needs from an engine.
///
/// Implemented automatically for any type that has every capability.
pub trait FullRuntime:
    RuntimeInfo + ImageOps + ContainerOps + ExecOps + LogOps + EventOps + ArchiveOps
{
}

impl<T> FullRuntime for T where
    T: RuntimeInfo + ImageOps + ContainerOps + ExecOps + LogOps + EventOps + ArchiveOps
{
}
