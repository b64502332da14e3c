//! Read-side query types for movements and sales.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ActorId, LocationId, ProductId};
use stockledger_inventory::{Movement, MovementType};
use stockledger_products::Product;
use stockledger_sales::Sale;

/// Pagination parameters for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of records to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000),
            offset: offset.unwrap_or(0),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of records matching the filter (across all pages).
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Cut a page out of the full, already ordered match list.
    pub fn slice(matches: Vec<T>, pagination: Pagination) -> Self {
        let total = matches.len() as u64;
        let offset = pagination.offset as usize;
        let items: Vec<T> = matches
            .into_iter()
            .skip(offset)
            .take(pagination.limit as usize)
            .collect();
        let has_more = (offset + items.len()) < total as usize;
        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }
}

/// Filter criteria for movement queries. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementFilter {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub product_id: Option<ProductId>,
    pub movement_type: Option<MovementType>,
    /// Matches either side of the movement's route.
    pub location_id: Option<LocationId>,
    /// Case-insensitive match on notes, parts number or description.
    pub search: Option<String>,
}

impl MovementFilter {
    pub fn matches(&self, movement: &Movement, product: Option<&Product>) -> bool {
        if self.date_from.is_some_and(|from| movement.occurred_at() < from) {
            return false;
        }
        if self.date_to.is_some_and(|to| movement.occurred_at() > to) {
            return false;
        }
        if self.product_id.is_some_and(|id| movement.product_id() != id) {
            return false;
        }
        if self.movement_type.is_some_and(|t| movement.movement_type() != t) {
            return false;
        }
        if let Some(loc) = self.location_id {
            if movement.from_location_id() != Some(loc) && movement.to_location_id() != Some(loc) {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                movement.notes().to_lowercase().contains(&term)
                    || product.is_some_and(|p| {
                        p.parts_number().to_lowercase().contains(&term)
                            || p.description().to_lowercase().contains(&term)
                    })
            }
        }
    }
}

/// Filter criteria for sale queries. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFilter {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub product_id: Option<ProductId>,
    pub actor_id: Option<ActorId>,
}

impl SaleFilter {
    pub fn matches(&self, sale: &Sale) -> bool {
        self.date_from.is_none_or(|from| sale.occurred_at() >= from)
            && self.date_to.is_none_or(|to| sale.occurred_at() <= to)
            && self.product_id.is_none_or(|id| sale.involves_product(id))
            && self.actor_id.is_none_or(|actor| sale.actor_id() == actor)
    }
}
