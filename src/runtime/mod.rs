// ABOUTME: Engine client: capability traits, bollard implementation, socket detection.
// ABOUTME: Everything that talks to a Docker or Podman API socket lives here.

mod bollard;
mod detection;
mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod traits;
mod types;

pub use self::bollard::BollardRuntime;
pub use detection::{DetectionError, detect, detect_local};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::{RuntimeConfig, RuntimeSocket, RuntimeType};
