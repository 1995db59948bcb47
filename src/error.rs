// ABOUTME: Application-wide error types for nestkeeper.
// ABOUTME: Uses thiserror; module errors convert in with #[from].

use crate::runtime::{ContainerError, ExecError, LogError, RuntimeError, RuntimeInfoError};
use crate::supervisor::SuperviseError;
use crate::transfer::TransferError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("no container named '{0}' in the configuration")]
    UnknownContainer(String),

    #[error("container '{0}' is not running")]
    NotRunning(String),

    #[error("no managed container '{0}' exists; run `nestkeeper up` first")]
    Missing(String),

    #[error("{0} action(s) failed")]
    ActionsFailed(usize),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("engine unavailable: {0}")]
    Engine(#[from] RuntimeInfoError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Supervise(#[from] SuperviseError),

    #[error("exec failed: {0}")]
    Exec(#[from] ExecError),

    #[error("logs failed: {0}")]
    Logs(#[from] LogError),

    #[error("copy failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Follow-up advice to print under the error message.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Runtime(e) => e.hint(),
            Self::ConfigNotFound(_) => Some("run `nestkeeper init` to write a template"),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
