//! Display-name lookups for locations and import origins.
//!
//! Locations and import origins are managed elsewhere; the ledger only holds
//! their ids and asks a resolver for names when building views.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use stockledger_core::{AggregateRoot, ImportOriginId, LocationId, ProductId};
use stockledger_products::{PriceComparison, Product};

pub trait ReferenceResolver: Send + Sync {
    fn location_name(&self, location_id: LocationId) -> Option<String>;
    fn import_origin_name(&self, import_origin_id: ImportOriginId) -> Option<String>;
}

impl<R> ReferenceResolver for Arc<R>
where
    R: ReferenceResolver + ?Sized,
{
    fn location_name(&self, location_id: LocationId) -> Option<String> {
        (**self).location_name(location_id)
    }

    fn import_origin_name(&self, import_origin_id: ImportOriginId) -> Option<String> {
        (**self).import_origin_name(import_origin_id)
    }
}

/// In-memory name directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryReferenceDirectory {
    locations: RwLock<HashMap<LocationId, String>>,
    import_origins: RwLock<HashMap<ImportOriginId, String>>,
}

impl InMemoryReferenceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_location(&self, name: impl Into<String>) -> LocationId {
        let id = LocationId::new();
        // A panicked writer cannot leave a half-inserted name behind.
        self.locations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, name.into());
        id
    }

    pub fn register_import_origin(&self, name: impl Into<String>) -> ImportOriginId {
        let id = ImportOriginId::new();
        self.import_origins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, name.into());
        id
    }
}

impl ReferenceResolver for InMemoryReferenceDirectory {
    fn location_name(&self, location_id: LocationId) -> Option<String> {
        self.locations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&location_id)
            .cloned()
    }

    fn import_origin_name(&self, import_origin_id: ImportOriginId) -> Option<String> {
        self.import_origins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&import_origin_id)
            .cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockEntryView {
    pub location_id: LocationId,
    pub location_name: Option<String>,
    pub quantity: i64,
    pub unit_price_at_location: Option<Decimal>,
}

/// Product as returned to callers: catalog fields, stock and resolved names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub parts_number: String,
    pub description: String,
    pub cost_price: Decimal,
    pub selling_price: Option<Decimal>,
    pub import_origin_id: Option<ImportOriginId>,
    pub import_origin_name: Option<String>,
    pub price_comparisons: Vec<PriceComparison>,
    pub stock: Vec<StockEntryView>,
    pub total_quantity: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl ProductView {
    pub fn resolve<R>(product: &Product, resolver: &R) -> Self
    where
        R: ReferenceResolver + ?Sized,
    {
        let stock = product
            .stock()
            .iter()
            .map(|entry| StockEntryView {
                location_id: entry.location_id,
                location_name: resolver.location_name(entry.location_id),
                quantity: entry.quantity,
                unit_price_at_location: entry.unit_price_at_location,
            })
            .collect();

        Self {
            id: product.id_typed(),
            parts_number: product.parts_number().to_string(),
            description: product.description().to_string(),
            cost_price: product.cost_price(),
            selling_price: product.selling_price(),
            import_origin_id: product.import_origin_id(),
            import_origin_name: product
                .import_origin_id()
                .and_then(|id| resolver.import_origin_name(id)),
            price_comparisons: product.price_comparisons().to_vec(),
            stock,
            total_quantity: product.stock().total_quantity(),
            created_at: product.created_at(),
            updated_at: product.updated_at(),
            version: product.version(),
        }
    }

    pub fn quantity_at(&self, location_id: LocationId) -> Option<i64> {
        self.stock
            .iter()
            .find(|e| e.location_id == location_id)
            .map(|e| e.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_products::{RegisterProduct, StockMode};

    #[test]
    fn view_resolves_names_and_leaves_unknown_ids_unnamed() {
        let directory = InMemoryReferenceDirectory::new();
        let shelf = directory.register_location("Shelf A");
        let origin = directory.register_import_origin("Osaka");
        let unnamed = LocationId::new();

        let mut product = Product::register(RegisterProduct {
            product_id: ProductId::new(),
            parts_number: "AF-9".into(),
            description: "Air filter".into(),
            cost_price: Decimal::from(8),
            selling_price: Some(Decimal::from(14)),
            import_origin_id: Some(origin),
            occurred_at: Utc::now(),
        })
        .unwrap();
        product
            .upsert_stock(shelf, 5, StockMode::Increment, Some(Decimal::from(8)), Utc::now())
            .unwrap();
        product
            .upsert_stock(unnamed, 2, StockMode::Increment, None, Utc::now())
            .unwrap();

        let view = ProductView::resolve(&product, &directory);
        assert_eq!(view.import_origin_name.as_deref(), Some("Osaka"));
        assert_eq!(view.stock[0].location_name.as_deref(), Some("Shelf A"));
        assert_eq!(view.stock[1].location_name, None);
        assert_eq!(view.total_quantity, 7);
        assert_eq!(view.quantity_at(unnamed), Some(2));
        assert_eq!(view.quantity_at(LocationId::new()), None);
    }

    #[test]
    fn directory_keeps_working_after_a_writer_panics() {
        let directory = InMemoryReferenceDirectory::new();
        let before = directory.register_location("Shelf A");
        let origin = directory.register_import_origin("Osaka");

        std::thread::scope(|s| {
            let locations = s.spawn(|| {
                let _guard = directory.locations.write().unwrap();
                panic!("writer died");
            });
            let origins = s.spawn(|| {
                let _guard = directory.import_origins.write().unwrap();
                panic!("writer died");
            });
            assert!(locations.join().is_err());
            assert!(origins.join().is_err());
        });
        assert!(directory.locations.is_poisoned());
        assert!(directory.import_origins.is_poisoned());

        let after = directory.register_location("Shelf B");
        let later_origin = directory.register_import_origin("Busan");
        assert_eq!(directory.location_name(before).as_deref(), Some("Shelf A"));
        assert_eq!(directory.location_name(after).as_deref(), Some("Shelf B"));
        assert_eq!(directory.import_origin_name(origin).as_deref(), Some("Osaka"));
        assert_eq!(directory.import_origin_name(later_origin).as_deref(), Some("Busan"));
    }

    #[test]
    fn view_serializes_money_as_strings() {
        let product = Product::register(RegisterProduct {
            product_id: ProductId::new(),
            parts_number: "AF-9".into(),
            description: "Air filter".into(),
            cost_price: Decimal::new(1999, 2),
            selling_price: None,
            import_origin_id: None,
            occurred_at: Utc::now(),
        })
        .unwrap();

        let json = serde_json::to_value(ProductView::resolve(&product, &InMemoryReferenceDirectory::new())).unwrap();
        assert_eq!(json["cost_price"], "19.99");
        assert!(json["selling_price"].is_null());
        assert_eq!(json["stock"], serde_json::json!([]));
    }
}
