//! Read-side aggregates derived from current catalog state.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use stockledger_core::{DomainError, DomainResult, LocationId};
use stockledger_products::Product;

use crate::resolver::ReferenceResolver;

/// Stock held at one location across all products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationStock {
    pub location_id: LocationId,
    pub location_name: Option<String>,
    pub total_quantity: i64,
    /// Products with a positive quantity at this location.
    pub product_count: usize,
}

/// Group every stock entry by location, sorted by location id.
///
/// Locations whose entries are all depleted still appear with zero totals.
pub fn summarize_by_location<R>(products: &[Product], resolver: &R) -> DomainResult<Vec<LocationStock>>
where
    R: ReferenceResolver + ?Sized,
{
    let mut by_location: BTreeMap<LocationId, (i64, usize)> = BTreeMap::new();
    for entry in products.iter().flat_map(|p| p.stock().iter()) {
        let (total, count) = by_location.entry(entry.location_id).or_insert((0, 0));
        *total = total.checked_add(entry.quantity).ok_or_else(|| {
            DomainError::invalid_operation(format!("stock total at location {} overflows", entry.location_id))
        })?;
        if entry.quantity > 0 {
            *count += 1;
        }
    }

    Ok(by_location
        .into_iter()
        .map(|(location_id, (total_quantity, product_count))| LocationStock {
            location_id,
            location_name: resolver.location_name(location_id),
            total_quantity,
            product_count,
        })
        .collect())
}

/// Whole-catalog valuation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValuationSummary {
    pub product_count: usize,
    pub total_quantity: i64,
    pub value_at_cost: Decimal,
    /// Only products that carry a selling price contribute.
    pub value_at_selling_price: Decimal,
    /// Products without a selling price.
    pub unpriced_products: usize,
}

impl ValuationSummary {
    pub fn compute(products: &[Product]) -> DomainResult<Self> {
        let overflow = || DomainError::invalid_operation("catalog valuation overflow");
        let mut summary = Self {
            product_count: products.len(),
            ..Self::default()
        };
        for product in products {
            let quantity = product.stock().total_quantity();
            summary.total_quantity = summary.total_quantity.checked_add(quantity).ok_or_else(overflow)?;
            summary.value_at_cost = summary
                .value_at_cost
                .checked_add(product.stock_value_at_cost()?)
                .ok_or_else(overflow)?;
            match product.selling_price() {
                Some(price) => {
                    summary.value_at_selling_price = price
                        .checked_mul(Decimal::from(quantity))
                        .and_then(|value| summary.value_at_selling_price.checked_add(value))
                        .ok_or_else(overflow)?;
                }
                None => summary.unpriced_products += 1,
            }
        }
        Ok(summary)
    }
}
