//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: a price
/// comparison `{origin, 12.50}` is equal to any other with the same origin
/// and price. Stock entries and price comparisons are value objects owned by
/// their product; they have no lifecycle of their own.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct PriceComparison {
///     origin_id: ImportOriginId,
///     price: Decimal,
/// }
///
/// impl ValueObject for PriceComparison {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
