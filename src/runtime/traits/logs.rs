// ABOUTME: Reading a managed container's output.
// ABOUTME: The engine's multiplexed log stream is split back into stdout and stderr lines.

use super::sealed::Sealed;
use crate::types::ContainerId;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub type LogLineStream = Pin<Box<dyn Stream<Item = Result<LogLine, LogError>> + Send>>;

#[async_trait]
pub trait LogOps: Sealed + Send + Sync {
    /// The stream ends when the requested backlog is drained, or, with
    /// `follow`, when the container goes away.
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<LogLineStream, LogError>;
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub stdout: bool,
    pub stderr: bool,
    pub follow: bool,
    /// Prefix lines with the engine's RFC 3339 timestamp.
    pub timestamps: bool,
    /// Limit the backlog to the last N lines.
    pub tail: Option<u64>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            stdout: true,
            stderr: true,
            follow: false,
            timestamps: false,
            tail: None,
        }
    }
}

impl LogOptions {
    pub fn tail(n: u64) -> Self {
        Self {
            tail: Some(n),
            ..Self::default()
        }
    }

    pub fn following(self) -> Self {
        Self {
            follow: true,
            ..self
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub content: String,
    pub stream: LogStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("no such container: {0}")]
    NoSuchContainer(String),

    #[error("log stream broke: {0}")]
    Stream(String),

    #[error("engine error: {0}")]
    Engine(String),
}
