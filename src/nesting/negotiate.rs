// ABOUTME: Chooses a nesting mode from the request, host and outer engine.
// ABOUTME: Explicit modes are verified; auto tries least privilege first.

use super::plan::{InnerEngine, ModeRequest, NestingMode, NestingPlan, NestingRequest};
use super::probe::{CgroupVersion, HostCapabilities};
use crate::runtime::{RuntimeMetadata, RuntimeType};
use thiserror::Error;

/// What matters about the engine nestkeeper talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OuterEngine {
    pub runtime_type: RuntimeType,
    /// The outer daemon has no root on the host.
    pub rootless: bool,
}

impl OuterEngine {
    pub fn from_metadata(runtime_type: RuntimeType, metadata: &RuntimeMetadata) -> Self {
        Self {
            runtime_type,
            rootless: metadata.rootless,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NestingError {
    #[error("{mode} nesting is not possible here: {reason}")]
    Unsupported { mode: NestingMode, reason: String },

    #[error("no nesting mode fits this host: {}", format_reasons(.0))]
    NoViableMode(Vec<(NestingMode, String)>),
}

fn format_reasons(reasons: &[(NestingMode, String)]) -> String {
    reasons
        .iter()
        .map(|(mode, reason)| format!("{mode}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why `mode` cannot be used, or `None` if it can.
fn rejection(
    mode: NestingMode,
    request: &NestingRequest,
    host: &HostCapabilities,
    outer: &OuterEngine,
) -> Option<String> {
    match mode {
        NestingMode::Privileged => {
            if !request.allow_privileged {
                Some("privileged containers are not allowed (set allow_privileged)".into())
            } else if outer.rootless {
                Some("the outer engine is rootless and cannot grant full privileges".into())
            } else {
                None
            }
        }
        NestingMode::Delegated => {
            if host.cgroup != CgroupVersion::V2 {
                Some("cgroup v2 is required to delegate a private cgroup namespace".into())
            } else if !host.has_fuse {
                Some("/dev/fuse is not available for fuse-overlayfs".into())
            } else {
                None
            }
        }
        NestingMode::Rootless => {
            if request.engine != InnerEngine::Podman {
                Some(format!("{} cannot run rootless inside a container", request.engine))
            } else if !host.user_namespaces {
                Some("user namespaces are disabled on this kernel".into())
            } else if !host.has_fuse {
                Some("/dev/fuse is not available for fuse-overlayfs".into())
            } else {
                None
            }
        }
    }
}

/// Pick the nesting mode for `request` and build its plan.
pub fn negotiate(
    request: &NestingRequest,
    host: &HostCapabilities,
    outer: &OuterEngine,
) -> Result<NestingPlan, NestingError> {
    match request.mode {
        ModeRequest::Only(mode) => match rejection(mode, request, host, outer) {
            Some(reason) => Err(NestingError::Unsupported { mode, reason }),
            None => Ok(NestingPlan::build(request, mode)),
        },
        ModeRequest::Auto => {
            let mut reasons = Vec::new();
            for mode in NestingMode::AUTO_ORDER {
                match rejection(mode, request, host, outer) {
                    None => {
                        tracing::debug!(
                            engine = %request.engine,
                            %mode,
                            skipped = reasons.len(),
                            "negotiated nesting mode"
                        );
                        return Ok(NestingPlan::build(request, mode));
                    }
                    Some(reason) => reasons.push((mode, reason)),
                }
            }
            Err(NestingError::NoViableMode(reasons))
        }
    }
}
