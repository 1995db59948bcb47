// ABOUTME: Nesting coordinator: decides how an inner engine runs inside the outer one.
// ABOUTME: Host probing, mode negotiation, and the resulting container settings.

mod negotiate;
mod plan;
mod probe;

pub use negotiate::{NestingError, OuterEngine, negotiate};
pub use plan::{
    INNER_SOCKET_DIR, InnerEngine, ModeRequest, NestingMode, NestingPlan, NestingRequest,
};
pub use probe::{CgroupVersion, HostCapabilities};
