//! Value object trait: equality by value, not identity.
//!
//! Line items, money amounts and purchase aggregates are value objects: two
//! instances with the same attributes are interchangeable.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by value. To "modify" one, build
/// a new value (e.g. `aggregate.with_purchase(total, at)`).
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Discount { percent: u8 }
///
/// impl ValueObject for Discount {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
