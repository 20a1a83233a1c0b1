//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attributes. They
/// are never mutated in place: an operation on a value object returns a new
/// one (see `StockLevels` in the products crate).
///
/// ```ignore
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// struct Levels { on_hand: u64, reserved: u64 }
///
/// impl ValueObject for Levels {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
