//! Product catalog domain module.
//!
//! Owns product identity (unique parts numbers), pricing fields and the
//! per-location stock map. Implemented purely as deterministic domain logic
//! (no IO, no storage).

pub mod product;
pub mod stock;

pub use product::{
    AdjustStock, AssignImportOrigin, ImportOriginAssigned, PriceComparison, PricingUpdated,
    Product, ProductCommand, ProductEvent, ProductRegistered, RegisterProduct,
    StockLevelChanged, UpdatePricing, normalize_parts_number, validate_price,
};
pub use stock::{StockEntry, StockLocationMap, StockMode};
