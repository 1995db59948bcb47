// ABOUTME: Environment entries for managed containers.
// ABOUTME: Plain scalars pass through; `{ env: VAR }` reads the supervisor's environment.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// One value under a container's `env:` key.
///
/// YAML scalars such as `1` or `true` are accepted and passed on in their
/// textual form, since the engine only takes strings anyway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    Flag(bool),
    Number(i64),
    Host(HostVar),
}

/// Copy a variable from the environment nestkeeper runs in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostVar {
    pub env: String,
    #[serde(default)]
    pub default: Option<String>,
}

impl EnvValue {
    pub fn host(env: impl Into<String>) -> Self {
        Self::Host(HostVar {
            env: env.into(),
            default: None,
        })
    }

    pub fn host_or(env: impl Into<String>, default: impl Into<String>) -> Self {
        Self::Host(HostVar {
            env: env.into(),
            default: Some(default.into()),
        })
    }

    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<String> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve with a caller-supplied lookup for host variables.
    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        match self {
            Self::Literal(text) => Ok(text.clone()),
            Self::Flag(flag) => Ok(flag.to_string()),
            Self::Number(n) => Ok(n.to_string()),
            Self::Host(HostVar { env, default }) => lookup(env)
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar(env.clone())),
        }
    }
}

/// Resolve every entry, failing on the first missing host variable.
pub fn resolve_env_map(map: &BTreeMap<String, EnvValue>) -> Result<BTreeMap<String, String>> {
    let mut resolved = BTreeMap::new();
    for (key, value) in map {
        resolved.insert(key.clone(), value.resolve()?);
    }
    Ok(resolved)
}
