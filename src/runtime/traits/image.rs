// ABOUTME: Image handling on the outer engine.
// ABOUTME: Managed containers need their engine image present before creation.

use super::sealed::Sealed;
use super::shared_types::RegistryAuth;
use crate::types::ImageRef;
use async_trait::async_trait;

#[async_trait]
pub trait ImageOps: Sealed + Send + Sync {
    /// Fetch `reference` from its registry; `auth` is sent as-is when given.
    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError>;

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError>;

    /// Delete a local image. `force` also untags it from stopped containers.
    async fn remove_image(&self, reference: &ImageRef, force: bool) -> Result<(), ImageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("no such image: {0}")]
    Missing(String),

    #[error("registry rejected credentials for {0}")]
    Unauthorized(String),

    #[error("could not pull {0}")]
    Pull(String),

    /// Still referenced by a container.
    #[error("image {0} is in use")]
    InUse(String),

    #[error("engine error: {0}")]
    Engine(String),
}

impl ImageError {
    /// Pull failures are mostly network trouble, so they count as transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Engine(_) | Self::Pull(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_credentials_are_not_retried() {
        assert!(!ImageError::Unauthorized("ghcr.io/acme/dind".into()).is_transient());
        assert!(!ImageError::Missing("docker:dind".into()).is_transient());
        assert!(ImageError::Pull("docker:dind: EOF".into()).is_transient());
    }
}
