// ABOUTME: Validated container names accepted by Docker and Podman.
// ABOUTME: Also generates random shell-safe names with a fixed prefix.

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 128;
const RANDOM_SUFFIX_LEN: usize = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerNameError {
    #[error("container name cannot be empty")]
    Empty,

    #[error("container name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("container name must start with a letter or digit")]
    InvalidStart,

    #[error("invalid character in container name: '{0}'")]
    InvalidChar(char),
}

/// Engine-valid container name: `[a-zA-Z0-9][a-zA-Z0-9_.-]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerName(String);

impl ContainerName {
    pub fn new(value: &str) -> Result<Self, ContainerNameError> {
        let first = value.chars().next().ok_or(ContainerNameError::Empty)?;

        if value.len() > MAX_LEN {
            return Err(ContainerNameError::TooLong);
        }

        if !first.is_ascii_alphanumeric() {
            return Err(ContainerNameError::InvalidStart);
        }

        if let Some(bad) = value
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '_' | '.' | '-'))
        {
            return Err(ContainerNameError::InvalidChar(bad));
        }

        Ok(Self(value.to_string()))
    }

    /// Generate `<prefix><24 random alphanumerics>`.
    ///
    /// Only alphanumerics are used so the name can be embedded anywhere a
    /// shell word is expected without quoting.
    pub fn random(prefix: &str) -> Result<Self, ContainerNameError> {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self::new(&format!("{prefix}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for ContainerName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ContainerName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}
