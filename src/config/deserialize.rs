// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Validates the container list and user labels while parsing.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

use super::ContainerEntry;

/// Label keys under this prefix are written by nestkeeper itself.
pub const RESERVED_LABEL_PREFIX: &str = "nestkeeper.";

pub fn deserialize_containers<'de, D>(deserializer: D) -> Result<NonEmpty<ContainerEntry>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entries: Vec<ContainerEntry> = Vec::deserialize(deserializer)?;

    let mut seen = HashSet::new();
    for entry in &entries {
        if !seen.insert(entry.name.as_str()) {
            return Err(serde::de::Error::custom(format!(
                "container '{}' is defined more than once",
                entry.name
            )));
        }
    }

    NonEmpty::from_vec(entries)
        .ok_or_else(|| serde::de::Error::custom("at least one container is required"))
}

pub fn deserialize_labels<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let labels: BTreeMap<String, String> = BTreeMap::deserialize(deserializer)?;
    if let Some(key) = labels.keys().find(|k| k.starts_with(RESERVED_LABEL_PREFIX)) {
        return Err(serde::de::Error::custom(format!(
            "label '{key}' uses the reserved prefix '{RESERVED_LABEL_PREFIX}'"
        )));
    }
    Ok(labels)
}
