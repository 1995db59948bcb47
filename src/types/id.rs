// ABOUTME: Phantom-typed engine identifiers.
// ABOUTME: A container ID can never be passed where an image ID is expected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Uninhabited markers; they only exist at the type level.
pub enum ContainerMarker {}
pub enum ImageMarker {}
pub enum ExecMarker {}

/// Opaque identifier handed out by the container engine.
///
/// The marker parameter keeps identifiers of different resource kinds apart,
/// so mixing them up is a compile error rather than a 404 from the engine.
#[must_use = "IDs reference engine resources and should not be ignored"]
pub struct Id<T> {
    value: String,
    _kind: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _kind: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }

    /// The 12-character prefix engines show in their own listings.
    pub fn short(&self) -> &str {
        let end = self.value.len().min(12);
        self.value.get(..end).unwrap_or(&self.value)
    }
}

// The marker is never instantiated, so these impls must not require `T: Trait`
// the way derives would.

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Id").field(&self.value).finish()
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

pub type ContainerId = Id<ContainerMarker>;
pub type ImageId = Id<ImageMarker>;
pub type ExecId = Id<ExecMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_truncates_long_ids() {
        let id = ContainerId::new("0123456789abcdef0123");
        assert_eq!(id.short(), "0123456789ab");
    }

    #[test]
    fn short_keeps_short_ids() {
        let id = ContainerId::new("abc");
        assert_eq!(id.short(), "abc");
    }

    #[test]
    fn ids_compare_by_value() {
        let a = ContainerId::new("x");
        let b = ContainerId::new(String::from("x"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "x");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ImageId::new("sha256:abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sha256:abc\"");
        let back: ImageId = serde_json::from_str("\"sha256:abc\"").unwrap();
        assert_eq!(back, id);
    }
}
