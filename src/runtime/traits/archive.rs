// ABOUTME: Archive operations trait for container engines.
// ABOUTME: Upload and download tar streams to and from container filesystems.

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;

/// Tar-based filesystem access.
#[async_trait]
pub trait ArchiveOps: Sealed + Send + Sync {
    /// Extract `tar` into directory `dir` inside the container.
    async fn upload_archive(
        &self,
        id: &ContainerId,
        dir: &str,
        tar: Vec<u8>,
    ) -> Result<(), ArchiveError>;

    /// Tar up `path` (file or directory) inside the container.
    async fn download_archive(&self, id: &ContainerId, path: &str)
    -> Result<Vec<u8>, ArchiveError>;
}

/// Errors from archive operations.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Either the container or the path inside it does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ArchiveError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ArchiveError::Runtime(_))
    }
}
