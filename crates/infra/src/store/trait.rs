use std::sync::Arc;

use thiserror::Error;

use stockledger_core::{ExpectedVersion, ProductId, SaleId};
use stockledger_inventory::Movement;
use stockledger_products::Product;
use stockledger_sales::Sale;

use super::query::{MovementFilter, Page, Pagination, SaleFilter};

/// Ledger store operation error.
///
/// These are infrastructure errors (stale writes, uniqueness, poisoned
/// state) as opposed to domain errors (validation, availability).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("parts number already registered: {0}")]
    DuplicatePartsNumber(String),

    #[error("invalid commit: {0}")]
    InvalidCommit(String),

    #[error("store lock poisoned")]
    Poisoned,
}

/// A product snapshot to persist, guarded by the version it was loaded at.
#[derive(Debug, Clone)]
pub struct ProductWrite {
    pub product: Product,
    pub expected_version: ExpectedVersion,
}

/// Everything one workflow persists.
///
/// A unit of work is committed whole or not at all: product writes, movement
/// appends and the optional sale record become visible together.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    products: Vec<ProductWrite>,
    movements: Vec<Movement>,
    sale: Option<Sale>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a product write. A later write of the same product replaces the
    /// earlier one but keeps its expected version.
    pub fn write_product(&mut self, product: Product, expected_version: ExpectedVersion) -> &mut Self {
        match self
            .products
            .iter_mut()
            .find(|w| w.product.id_typed() == product.id_typed())
        {
            Some(existing) => existing.product = product,
            None => self.products.push(ProductWrite {
                product,
                expected_version,
            }),
        }
        self
    }

    pub fn append_movement(&mut self, movement: Movement) -> &mut Self {
        self.movements.push(movement);
        self
    }

    pub fn record_sale(&mut self, sale: Sale) -> &mut Self {
        self.sale = Some(sale);
        self
    }

    pub fn product_writes(&self) -> &[ProductWrite] {
        &self.products
    }

    pub fn movements(&self) -> &[Movement] {
        &self.movements
    }

    pub fn sale(&self) -> Option<&Sale> {
        self.sale.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.movements.is_empty() && self.sale.is_none()
    }

    pub(crate) fn into_parts(self) -> (Vec<ProductWrite>, Vec<Movement>, Option<Sale>) {
        (self.products, self.movements, self.sale)
    }
}

/// Receipt of a successful commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    /// `(product, version)` pairs as stored.
    pub product_versions: Vec<(ProductId, u64)>,
    pub movements_appended: usize,
    pub sale_id: Option<SaleId>,
}

/// Persistence for the product catalog, movement ledger and sales ledger.
///
/// ## Commit contract
///
/// `commit` must be atomic: either every staged product write, movement and
/// sale is applied, or none is and an error is returned. Each product write is
/// checked against its `ExpectedVersion` (`Exact(0)` for a product that must
/// not exist yet) and parts numbers are unique across the catalog.
///
/// Movements and sales are append-only; listings return newest first.
pub trait LedgerStore: Send + Sync {
    fn load_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Exact match on the normalized (trimmed) parts number.
    fn find_by_parts_number(&self, parts_number: &str) -> Result<Option<Product>, StoreError>;

    /// All products in registration order.
    fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, StoreError>;

    fn query_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<Page<Movement>, StoreError>;

    /// Every movement of one product, newest first.
    fn movements_for_product(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError>;

    fn query_sales(&self, filter: &SaleFilter, pagination: Pagination) -> Result<Page<Sale>, StoreError>;

    fn load_sale(&self, sale_id: SaleId) -> Result<Option<Sale>, StoreError>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn load_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).load_product(product_id)
    }

    fn find_by_parts_number(&self, parts_number: &str) -> Result<Option<Product>, StoreError> {
        (**self).find_by_parts_number(parts_number)
    }

    fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list_products()
    }

    fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, StoreError> {
        (**self).commit(unit)
    }

    fn query_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<Page<Movement>, StoreError> {
        (**self).query_movements(filter, pagination)
    }

    fn movements_for_product(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        (**self).movements_for_product(product_id)
    }

    fn query_sales(&self, filter: &SaleFilter, pagination: Pagination) -> Result<Page<Sale>, StoreError> {
        (**self).query_sales(filter, pagination)
    }

    fn load_sale(&self, sale_id: SaleId) -> Result<Option<Sale>, StoreError> {
        (**self).load_sale(sale_id)
    }
}

