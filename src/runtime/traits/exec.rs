// ABOUTME: Running commands inside managed containers.
// ABOUTME: Exec sessions are prepared, then driven to completion for their output.

use super::sealed::Sealed;
use super::shared_types::{ExecConfig, ExecResult};
use crate::types::{ContainerId, ExecId};
use async_trait::async_trait;

#[async_trait]
pub trait ExecOps: Sealed + Send + Sync {
    /// Register an exec session in `container`. Nothing runs yet.
    async fn exec_create(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecId, ExecError>;

    /// Drive a prepared session to completion.
    ///
    /// Output is collected in full; the exit code is read back from the
    /// engine once the streams close.
    async fn exec_start(&self, session: &ExecId) -> Result<ExecResult, ExecError>;

    /// Prepare and run in one step.
    async fn exec(
        &self,
        container: &ContainerId,
        config: &ExecConfig,
    ) -> Result<ExecResult, ExecError> {
        let session = self.exec_create(container, config).await?;
        tracing::trace!(%container, session = %session.short(), "exec session prepared");
        self.exec_start(&session).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("no such container: {0}")]
    NoSuchContainer(String),

    /// The engine refuses exec in a stopped or paused container.
    #[error("container {0} is not running")]
    Stopped(String),

    #[error("exec session {0} is gone")]
    UnknownSession(String),

    #[error("exec output stream broke: {0}")]
    Stream(String),

    #[error("exec did not finish within {}s", .0.as_secs())]
    TimedOut(std::time::Duration),

    #[error("engine error: {0}")]
    Engine(String),
}

impl ExecError {
    /// Engine hiccups may clear up; a missing or stopped container will not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Engine(_) | Self::Stream(_))
    }
}
