//! Per-product stock ledger: location → quantity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, LocationId, ValueObject};

/// A product's quantity at one location.
///
/// Entries are never removed: a quantity of zero means "stocked here before,
/// now depleted", which read paths report differently from "never stocked".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub location_id: LocationId,
    pub quantity: i64,
    /// Last unit price recorded for stock arriving at this location.
    ///
    /// Informational only; movements always price from the product.
    pub unit_price_at_location: Option<Decimal>,
}

impl ValueObject for StockEntry {}

/// How an amount is applied to a location's quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockMode {
    /// Add a (possibly negative) delta; absent entries start at zero.
    Increment,
    /// Replace the quantity outright (count correction).
    Set,
}

/// Ordered collection of stock entries, at most one per location.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockLocationMap {
    entries: Vec<StockEntry>,
}

impl StockLocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, location_id: LocationId) -> Option<&StockEntry> {
        self.entries.iter().find(|e| e.location_id == location_id)
    }

    /// Quantity at a location, zero when the product was never stocked there.
    pub fn quantity_at(&self, location_id: LocationId) -> i64 {
        self.entry(location_id).map(|e| e.quantity).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StockEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum over all locations. `Product` keeps this within `i64`.
    pub fn total_quantity(&self) -> i64 {
        self.entries.iter().fold(0i64, |acc, e| acc.saturating_add(e.quantity))
    }

    /// Total after replacing the quantity at `location_id`, `None` on overflow.
    pub fn total_with(&self, location_id: LocationId, quantity: i64) -> Option<i64> {
        self.entries
            .iter()
            .filter(|e| e.location_id != location_id)
            .try_fold(quantity, |acc, e| acc.checked_add(e.quantity))
    }

    /// Check that `requested` units may be taken from a location.
    ///
    /// An absent entry is `NotFound`; a present entry holding less than
    /// `requested` (including zero) is `InsufficientStock`.
    pub fn ensure_deductible(&self, location_id: LocationId, requested: i64) -> DomainResult<&StockEntry> {
        let entry = self
            .entry(location_id)
            .ok_or_else(|| DomainError::not_found(format!("no stock entry at location {location_id}")))?;
        if entry.quantity < requested {
            return Err(DomainError::insufficient_stock(location_id, entry.quantity, requested));
        }
        Ok(entry)
    }

    /// Compute the quantity a location would hold after applying `amount`.
    ///
    /// Does not mutate; callers commit the result through [`StockLocationMap::put`].
    pub fn resolve(&self, location_id: LocationId, amount: i64, mode: StockMode) -> DomainResult<i64> {
        match mode {
            StockMode::Increment => {
                let current = self.quantity_at(location_id);
                let next = current
                    .checked_add(amount)
                    .ok_or_else(|| DomainError::invalid_operation("stock quantity overflow"))?;
                if next < 0 {
                    return Err(DomainError::insufficient_stock(location_id, current, amount.saturating_neg()));
                }
                Ok(next)
            }
            StockMode::Set => {
                if amount < 0 {
                    return Err(DomainError::invalid_operation(format!(
                        "cannot set stock at location {location_id} to negative quantity {amount}"
                    )));
                }
                Ok(amount)
            }
        }
    }

    /// Upsert an absolute quantity for a location.
    ///
    /// `unit_price` only overwrites the recorded location price when given.
    pub(crate) fn put(&mut self, location_id: LocationId, quantity: i64, unit_price: Option<Decimal>) {
        debug_assert!(quantity >= 0, "stock entries never hold negative quantities");
        match self.entries.iter_mut().find(|e| e.location_id == location_id) {
            Some(entry) => {
                entry.quantity = quantity;
                if unit_price.is_some() {
                    entry.unit_price_at_location = unit_price;
                }
            }
            None => self.entries.push(StockEntry {
                location_id,
                quantity,
                unit_price_at_location: unit_price,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_depleted_entries_are_distinguishable() {
        let depleted = LocationId::new();
        let never = LocationId::new();
        let mut map = StockLocationMap::new();
        map.put(depleted, 0, None);

        assert_eq!(map.entry(depleted).map(|e| e.quantity), Some(0));
        assert!(map.entry(never).is_none());
        assert_eq!(map.quantity_at(never), 0);
    }

    #[test]
    fn both_absent_and_zero_forbid_deduction() {
        let depleted = LocationId::new();
        let never = LocationId::new();
        let mut map = StockLocationMap::new();
        map.put(depleted, 0, None);

        assert!(matches!(map.ensure_deductible(never, 1), Err(DomainError::NotFound(_))));
        assert_eq!(
            map.ensure_deductible(depleted, 1).unwrap_err(),
            DomainError::insufficient_stock(depleted, 0, 1)
        );
    }

    #[test]
    fn increment_below_zero_is_insufficient_stock() {
        let loc = LocationId::new();
        let mut map = StockLocationMap::new();
        map.put(loc, 4, None);

        assert_eq!(map.resolve(loc, -4, StockMode::Increment), Ok(0));
        assert_eq!(
            map.resolve(loc, -5, StockMode::Increment),
            Err(DomainError::insufficient_stock(loc, 4, 5))
        );
    }

    #[test]
    fn negative_set_is_invalid_operation() {
        let map = StockLocationMap::new();
        let err = map.resolve(LocationId::new(), -1, StockMode::Set).unwrap_err();
        assert!(matches!(err, DomainError::InvalidOperation(_)));
    }

    #[test]
    fn put_keeps_one_entry_per_location_in_insertion_order() {
        let a = LocationId::new();
        let b = LocationId::new();
        let mut map = StockLocationMap::new();
        map.put(a, 1, Some(Decimal::new(250, 2)));
        map.put(b, 2, None);
        map.put(a, 9, None);

        let entries: Vec<_> = map.iter().cloned().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].location_id, a);
        assert_eq!(entries[0].quantity, 9);
        assert_eq!(entries[0].unit_price_at_location, Some(Decimal::new(250, 2)));
        assert_eq!(map.total_quantity(), 11);
    }

    #[test]
    fn total_with_replaces_the_location_and_detects_overflow() {
        let a = LocationId::new();
        let b = LocationId::new();
        let mut map = StockLocationMap::new();
        map.put(a, i64::MAX, None);

        assert_eq!(map.total_with(a, 5), Some(5));
        assert_eq!(map.total_with(b, 0), Some(i64::MAX));
        assert_eq!(map.total_with(b, 1), None);
    }

    #[test]
    fn most_negative_increment_reports_insufficient_stock() {
        let a = LocationId::new();
        let mut map = StockLocationMap::new();
        map.put(a, 3, None);

        let err = map.resolve(a, i64::MIN, StockMode::Increment).unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { available: 3, requested: i64::MAX, .. }));
    }
}
