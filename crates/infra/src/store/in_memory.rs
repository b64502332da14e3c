use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use stockledger_core::{AggregateRoot, ProductId, SaleId};
use stockledger_inventory::Movement;
use stockledger_products::Product;
use stockledger_sales::Sale;

use super::query::{MovementFilter, Page, Pagination, SaleFilter};
use super::r#trait::{CommitReceipt, LedgerStore, ProductWrite, StoreError, UnitOfWork};

#[derive(Debug, Default)]
struct LedgerState {
    products: HashMap<ProductId, Product>,
    /// Registration order, for stable product listings.
    product_order: Vec<ProductId>,
    parts_index: HashMap<String, ProductId>,
    /// Append order; readers walk it backwards.
    movements: Vec<Movement>,
    sales: Vec<Sale>,
}

impl LedgerState {
    fn current_version(&self, product_id: ProductId) -> u64 {
        self.products
            .get(&product_id)
            .map(|p| p.version())
            .unwrap_or(0)
    }

    /// Reject the whole unit before anything is applied.
    fn check(&self, writes: &[ProductWrite], movements: &[Movement], sale: Option<&Sale>) -> Result<(), StoreError> {
        let mut staged_parts: HashSet<&str> = HashSet::new();

        for write in writes {
            let product = &write.product;
            let product_id = product.id_typed();
            if !product.is_registered() {
                return Err(StoreError::InvalidCommit(format!(
                    "product {product_id} is not registered"
                )));
            }

            let current = self.current_version(product_id);
            if !write.expected_version.matches(current) {
                return Err(StoreError::Concurrency(format!(
                    "product {product_id}: expected {:?}, found {current}",
                    write.expected_version
                )));
            }

            if let Some(existing) = self.products.get(&product_id) {
                if existing.parts_number() != product.parts_number() {
                    return Err(StoreError::InvalidCommit(format!(
                        "parts number of product {product_id} is immutable"
                    )));
                }
            }
            match self.parts_index.get(product.parts_number()) {
                Some(owner) if *owner != product_id => {
                    return Err(StoreError::DuplicatePartsNumber(product.parts_number().to_string()));
                }
                _ => {}
            }
            if !staged_parts.insert(product.parts_number()) {
                return Err(StoreError::DuplicatePartsNumber(product.parts_number().to_string()));
            }
        }

        for movement in movements {
            let product_id = movement.product_id();
            let known = self.products.contains_key(&product_id)
                || writes.iter().any(|w| w.product.id_typed() == product_id);
            if !known {
                return Err(StoreError::InvalidCommit(format!(
                    "movement {} references unknown product {product_id}",
                    movement.id()
                )));
            }
        }

        if let Some(sale) = sale {
            if self.sales.iter().any(|s| s.id() == sale.id()) {
                return Err(StoreError::InvalidCommit(format!("sale {} already recorded", sale.id())));
            }
            for movement_id in sale.movement_ids() {
                if !movements.iter().any(|m| m.id() == *movement_id) {
                    return Err(StoreError::InvalidCommit(format!(
                        "sale {} references movement {movement_id} outside its commit",
                        sale.id()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. One `RwLock` over the whole ledger makes every
/// commit atomic with respect to readers.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total movements recorded (all products).
    pub fn movement_count(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.movements.len())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.products.get(&product_id).cloned())
    }

    fn find_by_parts_number(&self, parts_number: &str) -> Result<Option<Product>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .parts_index
            .get(parts_number.trim())
            .and_then(|id| state.products.get(id))
            .cloned())
    }

    fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .product_order
            .iter()
            .filter_map(|id| state.products.get(id))
            .cloned()
            .collect())
    }

    fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, StoreError> {
        let (writes, movements, sale) = unit.into_parts();

        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;
        state.check(&writes, &movements, sale.as_ref())?;

        let mut product_versions = Vec::with_capacity(writes.len());
        for write in writes {
            let product = write.product;
            let product_id = product.id_typed();
            product_versions.push((product_id, product.version()));

            if !state.products.contains_key(&product_id) {
                state.product_order.push(product_id);
                state
                    .parts_index
                    .insert(product.parts_number().to_string(), product_id);
            }
            state.products.insert(product_id, product);
        }

        let movements_appended = movements.len();
        state.movements.extend(movements);

        let sale_id = sale.as_ref().map(Sale::id);
        if let Some(sale) = sale {
            state.sales.push(sale);
        }

        Ok(CommitReceipt {
            product_versions,
            movements_appended,
            sale_id,
        })
    }

    fn query_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> Result<Page<Movement>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let matches: Vec<Movement> = state
            .movements
            .iter()
            .rev()
            .filter(|m| filter.matches(m, state.products.get(&m.product_id())))
            .cloned()
            .collect();
        Ok(Page::slice(matches, pagination))
    }

    fn movements_for_product(&self, product_id: ProductId) -> Result<Vec<Movement>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .movements
            .iter()
            .rev()
            .filter(|m| m.product_id() == product_id)
            .cloned()
            .collect())
    }

    fn query_sales(&self, filter: &SaleFilter, pagination: Pagination) -> Result<Page<Sale>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        let matches: Vec<Sale> = state
            .sales
            .iter()
            .rev()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        Ok(Page::slice(matches, pagination))
    }

    fn load_sale(&self, sale_id: SaleId) -> Result<Option<Sale>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.sales.iter().find(|s| s.id() == sale_id).cloned())
    }
}
