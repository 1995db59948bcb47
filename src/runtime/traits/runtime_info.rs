// ABOUTME: Identity and reachability of an engine endpoint.
// ABOUTME: Used both for the outer engine and for probing inner engines.

use super::sealed::Sealed;
use super::shared_types::RuntimeMetadata;
use async_trait::async_trait;

#[async_trait]
pub trait RuntimeInfo: Sealed + Send + Sync {
    /// Name, version, platform and whether the daemon is rootless.
    async fn info(&self) -> Result<RuntimeMetadata, RuntimeInfoError>;

    /// Cheapest round trip the API offers.
    async fn ping(&self) -> Result<(), RuntimeInfoError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeInfoError {
    /// Socket missing, refused, or the handshake failed.
    #[error("engine unreachable: {0}")]
    Unreachable(String),

    #[error("engine error: {0}")]
    Engine(String),
}

impl RuntimeInfoError {
    /// An engine that is still booting looks exactly like a broken one.
    pub fn is_transient(&self) -> bool {
        true
    }
}
