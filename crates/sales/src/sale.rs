use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{ActorId, DomainError, LocationId, MovementId, ProductId, SaleId};
use stockledger_products::Product;

/// One basket line: which product, taken from where, how many, at what price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub unit_price_at_sale: Decimal,
}

impl SaleItem {
    /// `quantity × unit_price_at_sale`, `None` when out of range.
    pub fn line_total(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.unit_price_at_sale)
    }
}

/// Why a sale item failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    InvalidQuantity { quantity: i64 },
    NegativePrice,
    UnknownProduct,
    NotStockedAtLocation,
    InsufficientStock { available: i64, requested: i64 },
    AmountOverflow,
}

/// The first sale item that made the whole sale invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItemRejection {
    /// 1-based position in the basket.
    pub item_number: usize,
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub reason: RejectionReason,
}

impl core::fmt::Display for SaleItemRejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "item {} (product {} at location {}): ",
            self.item_number, self.product_id, self.location_id
        )?;
        match &self.reason {
            RejectionReason::InvalidQuantity { quantity } => {
                write!(f, "quantity must be positive (got {quantity})")
            }
            RejectionReason::NegativePrice => f.write_str("unit price cannot be negative"),
            RejectionReason::UnknownProduct => f.write_str("product not found"),
            RejectionReason::NotStockedAtLocation => f.write_str("product has no stock entry at location"),
            RejectionReason::InsufficientStock { available, requested } => {
                write!(f, "insufficient stock (available {available}, requested {requested})")
            }
            RejectionReason::AmountOverflow => f.write_str("line or sale total is out of range"),
        }
    }
}

impl From<SaleItemRejection> for DomainError {
    fn from(value: SaleItemRejection) -> Self {
        DomainError::validation(value.to_string())
    }
}

/// Command: RecordSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub sale_id: SaleId,
    pub items: Vec<SaleItem>,
    pub actor_id: ActorId,
    #[serde(default)]
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

impl RecordSale {
    /// Distinct products referenced by the basket, in first-seen order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !ids.contains(&item.product_id) {
                ids.push(item.product_id);
            }
        }
        ids
    }

    /// Structural checks that need no catalog state.
    pub fn validate_shape(&self) -> Result<(), DomainError> {
        if self.items.is_empty() {
            return Err(DomainError::validation("sale must contain at least one item"));
        }
        let mut total = Decimal::ZERO;
        for (idx, item) in self.items.iter().enumerate() {
            let reason = if item.quantity <= 0 {
                Some(RejectionReason::InvalidQuantity {
                    quantity: item.quantity,
                })
            } else if item.unit_price_at_sale < Decimal::ZERO {
                Some(RejectionReason::NegativePrice)
            } else {
                match item.line_total().and_then(|line| total.checked_add(line)) {
                    Some(running) => {
                        total = running;
                        None
                    }
                    None => Some(RejectionReason::AmountOverflow),
                }
            };
            if let Some(reason) = reason {
                return Err(rejection(idx, item, reason).into());
            }
        }
        Ok(())
    }

    /// Validate every item against a snapshot of the referenced products.
    ///
    /// Demand is accumulated per (product, location), so two lines drawing on
    /// the same shelf must fit together. Nothing is mutated; the first failing
    /// item is reported.
    pub fn check_availability(
        &self,
        products: &HashMap<ProductId, Product>,
    ) -> Result<(), SaleItemRejection> {
        let mut demand: HashMap<(ProductId, LocationId), i64> = HashMap::new();

        for (idx, item) in self.items.iter().enumerate() {
            let product = products
                .get(&item.product_id)
                .ok_or_else(|| rejection(idx, item, RejectionReason::UnknownProduct))?;
            let entry = product
                .find_entry(item.location_id)
                .ok_or_else(|| rejection(idx, item, RejectionReason::NotStockedAtLocation))?;

            let requested = demand.entry((item.product_id, item.location_id)).or_insert(0);
            match requested.checked_add(item.quantity) {
                Some(next) if next <= entry.quantity => *requested = next,
                next => {
                    return Err(rejection(
                        idx,
                        item,
                        RejectionReason::InsufficientStock {
                            available: entry.quantity,
                            requested: next.unwrap_or(i64::MAX),
                        },
                    ));
                }
            }
        }

        Ok(())
    }
}

fn rejection(idx: usize, item: &SaleItem, reason: RejectionReason) -> SaleItemRejection {
    SaleItemRejection {
        item_number: idx + 1,
        product_id: item.product_id,
        location_id: item.location_id,
        reason,
    }
}

/// Completed sale (immutable once recorded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    id: SaleId,
    items: Vec<SaleItem>,
    actor_id: ActorId,
    occurred_at: DateTime<Utc>,
    notes: String,
    movement_ids: Vec<MovementId>,
}

impl Sale {
    /// Build the sale record once every item has its export movement.
    pub fn completed(cmd: RecordSale, movement_ids: Vec<MovementId>) -> Result<Self, DomainError> {
        if movement_ids.len() != cmd.items.len() {
            return Err(DomainError::invariant(format!(
                "sale has {} items but {} movements",
                cmd.items.len(),
                movement_ids.len()
            )));
        }
        Ok(Self {
            id: cmd.sale_id,
            items: cmd.items,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
            notes: cmd.notes,
            movement_ids,
        })
    }

    pub fn id(&self) -> SaleId {
        self.id
    }

    pub fn items(&self) -> &[SaleItem] {
        &self.items
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Export movements produced by this sale, index-aligned with `items`.
    pub fn movement_ids(&self) -> &[MovementId] {
        &self.movement_ids
    }

    pub fn total(&self) -> Result<Decimal, DomainError> {
        self.items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| {
                item.line_total().and_then(|line| acc.checked_add(line))
            })
            .ok_or_else(|| DomainError::invalid_operation("sale total overflow"))
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().fold(0i64, |acc, i| acc.saturating_add(i.quantity))
    }

    pub fn involves_product(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|i| i.product_id == product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_products::{RegisterProduct, StockMode};

    fn stocked_product(location_id: LocationId, quantity: i64) -> Product {
        let mut product = Product::register(RegisterProduct {
            product_id: ProductId::new(),
            parts_number: format!("P-{}", ProductId::new()),
            description: "Spark plug".to_string(),
            cost_price: Decimal::from(2),
            selling_price: Some(Decimal::from(4)),
            import_origin_id: None,
            occurred_at: Utc::now(),
        })
        .unwrap();
        product
            .upsert_stock(location_id, quantity, StockMode::Increment, None, Utc::now())
            .unwrap();
        product
    }

    fn item(product: &Product, location_id: LocationId, quantity: i64) -> SaleItem {
        SaleItem {
            product_id: product.id_typed(),
            location_id,
            quantity,
            unit_price_at_sale: Decimal::from(4),
        }
    }

    fn sale(items: Vec<SaleItem>) -> RecordSale {
        RecordSale {
            sale_id: SaleId::new(),
            items,
            actor_id: ActorId::new(),
            notes: String::new(),
            occurred_at: Utc::now(),
        }
    }

    fn catalog(products: &[&Product]) -> HashMap<ProductId, Product> {
        products.iter().map(|p| (p.id_typed(), (*p).clone())).collect()
    }

    #[test]
    fn empty_basket_is_rejected() {
        assert!(matches!(sale(vec![]).validate_shape(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn shape_check_names_the_offending_item() {
        let loc = LocationId::new();
        let p = stocked_product(loc, 5);
        let cmd = sale(vec![item(&p, loc, 1), item(&p, loc, 0)]);

        match cmd.validate_shape() {
            Err(DomainError::Validation(msg)) => assert!(msg.starts_with("item 2 ")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn second_item_short_rejects_whole_basket() {
        let loc = LocationId::new();
        let a = stocked_product(loc, 5);
        let b = stocked_product(loc, 1);
        let cmd = sale(vec![item(&a, loc, 2), item(&b, loc, 3)]);

        let rejection = cmd.check_availability(&catalog(&[&a, &b])).unwrap_err();
        assert_eq!(rejection.item_number, 2);
        assert_eq!(
            rejection.reason,
            RejectionReason::InsufficientStock {
                available: 1,
                requested: 3
            }
        );
    }

    #[test]
    fn demand_on_same_location_accumulates() {
        let loc = LocationId::new();
        let p = stocked_product(loc, 5);
        let cmd = sale(vec![item(&p, loc, 3), item(&p, loc, 3)]);

        let rejection = cmd.check_availability(&catalog(&[&p])).unwrap_err();
        assert_eq!(rejection.item_number, 2);
        assert_eq!(
            rejection.reason,
            RejectionReason::InsufficientStock {
                available: 5,
                requested: 6
            }
        );
    }

    #[test]
    fn same_product_at_different_locations_is_accepted() {
        let front = LocationId::new();
        let back = LocationId::new();
        let mut p = stocked_product(front, 2);
        p.upsert_stock(back, 2, StockMode::Increment, None, Utc::now()).unwrap();
        let cmd = sale(vec![item(&p, front, 2), item(&p, back, 2)]);

        assert!(cmd.check_availability(&catalog(&[&p])).is_ok());
        assert_eq!(cmd.product_ids(), vec![p.id_typed()]);
    }

    #[test]
    fn unknown_product_and_unstocked_location_are_distinct_reasons() {
        let loc = LocationId::new();
        let p = stocked_product(loc, 5);
        let missing = SaleItem {
            product_id: ProductId::new(),
            location_id: loc,
            quantity: 1,
            unit_price_at_sale: Decimal::ONE,
        };

        let unknown = sale(vec![missing]).check_availability(&catalog(&[&p])).unwrap_err();
        assert_eq!(unknown.reason, RejectionReason::UnknownProduct);

        let unstocked = sale(vec![item(&p, LocationId::new(), 1)])
            .check_availability(&catalog(&[&p]))
            .unwrap_err();
        assert_eq!(unstocked.reason, RejectionReason::NotStockedAtLocation);
    }

    #[test]
    fn completed_sale_requires_one_movement_per_item() {
        let loc = LocationId::new();
        let p = stocked_product(loc, 5);
        let cmd = sale(vec![item(&p, loc, 2), item(&p, loc, 1)]);

        assert!(Sale::completed(cmd.clone(), vec![MovementId::new()]).is_err());
        let recorded = Sale::completed(cmd, vec![MovementId::new(), MovementId::new()]).unwrap();
        assert_eq!(recorded.total().unwrap(), Decimal::from(12));
        assert_eq!(recorded.total_quantity(), 3);
        assert!(recorded.involves_product(p.id_typed()));
    }

    #[test]
    fn basket_whose_total_overflows_is_rejected_by_shape() {
        let loc = LocationId::new();
        let p = stocked_product(loc, 5);
        let mut huge = item(&p, loc, 2);
        huge.unit_price_at_sale = Decimal::MAX;

        let err = sale(vec![huge.clone()]).validate_shape().unwrap_err();
        assert!(err.to_string().contains("item 1"));
        assert!(err.to_string().contains("out of range"));

        // Each line fits on its own; their sum does not.
        huge.quantity = 1;
        huge.unit_price_at_sale = Decimal::MAX - Decimal::from(10);
        let err = sale(vec![item(&p, loc, 1), huge.clone(), huge]).validate_shape().unwrap_err();
        assert!(err.to_string().contains("item 3"));
    }

    #[test]
    fn demand_overflow_reports_insufficient_stock() {
        let loc = LocationId::new();
        let p = stocked_product(loc, i64::MAX);
        let cmd = sale(vec![item(&p, loc, i64::MAX), item(&p, loc, 1)]);

        let err = cmd.check_availability(&catalog(&[&p])).unwrap_err();
        assert_eq!(err.item_number, 2);
        assert_eq!(
            err.reason,
            RejectionReason::InsufficientStock {
                available: i64::MAX,
                requested: i64::MAX,
            }
        );
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: an accepted basket never asks a location for more than it holds.
            #[test]
            fn accepted_baskets_fit_available_stock(
                stock in 0i64..20,
                quantities in proptest::collection::vec(1i64..8, 1..6)
            ) {
                let loc = LocationId::new();
                let p = if stock > 0 {
                    stocked_product(loc, stock)
                } else {
                    let mut p = stocked_product(loc, 1);
                    p.upsert_stock(loc, 0, StockMode::Set, None, Utc::now()).unwrap();
                    p
                };
                let items = quantities.iter().map(|q| item(&p, loc, *q)).collect();
                let cmd = sale(items);
                let accepted = cmd.check_availability(&catalog(&[&p])).is_ok();
                prop_assert_eq!(accepted, quantities.iter().sum::<i64>() <= stock);
            }
        }
    }
}
