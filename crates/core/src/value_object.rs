//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are compared by their attribute values:
/// two `Money::from_minor(500)` are the same amount. They are immutable; an
/// operation on a value object returns a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
