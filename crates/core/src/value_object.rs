//! Value objects: compared by value, never by identity.

/// Marker for immutable values such as variant keys, price snapshots and
/// shipping addresses. "Changing" one means building a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
