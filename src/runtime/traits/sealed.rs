// ABOUTME: Sealed trait pattern for runtime traits.
// ABOUTME: Only crate types may implement the engine capability traits.

/// Marker every runtime implementation must carry.
///
/// The module is crate-private, so downstream code can call the capability
/// traits but never implement them.
pub trait Sealed {}
