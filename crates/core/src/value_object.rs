//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**; identity does
/// not matter. `Money { cents: 2000 }` is a value object; an order is not.
/// To "modify" one, construct a new value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
