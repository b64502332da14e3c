//! Stock workflows.
//!
//! Every mutating workflow follows one shape: take the product locks,
//! reload under the lock, validate, mutate a working copy, build the
//! movement(s), then commit product writes and movements as one unit of work.
//! A failure anywhere before the commit leaves the store untouched.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use stockledger_core::{
    ActorId, Aggregate, AggregateRoot, DomainError, ExpectedVersion, ImportOriginId, LocationId,
    Patch, ProductId, SaleId,
};
use stockledger_inventory::{
    CorrectStock, ExportStock, ImportStock, Movement, MovementRoute, TransferStock,
    UpdateProductAndInventory,
};
use stockledger_products::{
    AssignImportOrigin, Product, ProductCommand, RegisterProduct, StockMode, UpdatePricing,
    normalize_parts_number,
};
use stockledger_sales::{RecordSale, Sale};

use crate::config::{OperationsConfig, SameLocationTransfer};
use crate::error::{OperationError, OperationResult};
use crate::locks::{LockGuard, LockKey, LockTable};
use crate::reports::{LocationStock, ValuationSummary, summarize_by_location};
use crate::resolver::{ProductView, ReferenceResolver};
use crate::store::{
    CommitReceipt, LedgerStore, MovementFilter, Page, Pagination, SaleFilter, UnitOfWork,
};

/// Stock added to an existing product, with the price correction that came with it.
struct Restock {
    cost_price: Decimal,
    selling_price: Option<Decimal>,
    import_origin_id: Option<ImportOriginId>,
    quantity: i64,
    location_id: LocationId,
    actor_id: ActorId,
    notes: String,
    occurred_at: DateTime<Utc>,
}

/// Orchestrates catalog, movement ledger and sales ledger.
#[derive(Debug)]
pub struct InventoryOperations<S, R> {
    store: S,
    resolver: R,
    locks: LockTable,
    config: OperationsConfig,
}

impl<S, R> InventoryOperations<S, R>
where
    S: LedgerStore,
    R: ReferenceResolver,
{
    pub fn new(store: S, resolver: R) -> Self {
        Self::with_config(store, resolver, OperationsConfig::default())
    }

    pub fn with_config(store: S, resolver: R, config: OperationsConfig) -> Self {
        Self {
            store,
            resolver,
            locks: LockTable::new(config.lock_timeout),
            config,
        }
    }

    pub fn config(&self) -> &OperationsConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// The lock table guarding product read-modify-write cycles.
    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    // ---------------------------------------------------------------------
    // Workflows
    // ---------------------------------------------------------------------

    /// Receive stock for a parts number, creating the product on first import.
    #[instrument(
        skip(self, cmd),
        fields(parts_number = %cmd.parts_number.trim(), location_id = %cmd.location_id, quantity = cmd.quantity),
        err
    )]
    pub fn import(&self, cmd: ImportStock) -> OperationResult<ProductView> {
        cmd.validate()?;
        let parts_number = normalize_parts_number(&cmd.parts_number)?;

        // Held for the whole workflow: no second product can be created for
        // this parts number until this import commits or fails.
        let _parts_guard = self.acquire(vec![LockKey::PartsNumber(parts_number.clone())])?;

        if let Some(existing) = self.store.find_by_parts_number(&parts_number)? {
            let product_id = existing.id_typed();
            let _product_guard = self.lock_products(&[product_id])?;
            let product = self.require_product(product_id)?;
            return self.augment_existing(
                product,
                Restock {
                    cost_price: cmd.cost_price,
                    selling_price: cmd.selling_price,
                    import_origin_id: cmd.import_origin_id,
                    quantity: cmd.quantity,
                    location_id: cmd.location_id,
                    actor_id: cmd.actor_id,
                    notes: cmd.notes,
                    occurred_at: cmd.occurred_at,
                },
            );
        }

        let mut product = Product::register(RegisterProduct {
            product_id: ProductId::new(),
            parts_number,
            description: cmd.description,
            cost_price: cmd.cost_price,
            selling_price: cmd.selling_price,
            import_origin_id: cmd.import_origin_id,
            occurred_at: cmd.occurred_at,
        })?;
        product.upsert_stock(
            cmd.location_id,
            cmd.quantity,
            StockMode::Increment,
            Some(cmd.cost_price),
            cmd.occurred_at,
        )?;

        let movement = Movement::record(
            product.id_typed(),
            MovementRoute::Import {
                to_location_id: cmd.location_id,
            },
            cmd.quantity,
            cmd.cost_price,
            cmd.actor_id,
            cmd.occurred_at,
            cmd.notes,
        )?;

        let mut unit = UnitOfWork::new();
        unit.write_product(product.clone(), ExpectedVersion::Exact(0))
            .append_movement(movement);
        self.commit(unit)?;

        info!(product_id = %product.id_typed(), version = product.version(), "product created by import");
        Ok(self.view(&product))
    }

    /// Move stock between two locations of one product.
    #[instrument(
        skip(self, cmd),
        fields(
            product_id = %cmd.product_id,
            from = %cmd.from_location_id,
            to = %cmd.to_location_id,
            quantity = cmd.quantity
        ),
        err
    )]
    pub fn transfer(&self, cmd: TransferStock) -> OperationResult<ProductView> {
        cmd.validate()?;
        let same_location = cmd.is_same_location();
        if same_location && self.config.same_location_transfer == SameLocationTransfer::Reject {
            return Err(OperationError::ValidationFailed(format!(
                "transfer source and destination are the same location {}",
                cmd.from_location_id
            )));
        }

        let _guard = self.lock_products(&[cmd.product_id])?;
        let mut product = self.require_product(cmd.product_id)?;
        let expected = ExpectedVersion::Exact(product.version());

        product
            .stock()
            .ensure_deductible(cmd.from_location_id, cmd.quantity)?;
        let unit_price = cmd.unit_price.unwrap_or_else(|| product.cost_price());

        let mut unit = UnitOfWork::new();
        if !same_location {
            product.upsert_stock(
                cmd.from_location_id,
                -cmd.quantity,
                StockMode::Increment,
                None,
                cmd.occurred_at,
            )?;
            product.upsert_stock(
                cmd.to_location_id,
                cmd.quantity,
                StockMode::Increment,
                Some(unit_price),
                cmd.occurred_at,
            )?;
            unit.write_product(product.clone(), expected);
        }

        let movement = Movement::record(
            cmd.product_id,
            MovementRoute::Transfer {
                from_location_id: cmd.from_location_id,
                to_location_id: cmd.to_location_id,
            },
            cmd.quantity,
            unit_price,
            cmd.actor_id,
            cmd.occurred_at,
            cmd.notes,
        )?;
        unit.append_movement(movement);
        self.commit(unit)?;

        info!(version = product.version(), same_location, "transfer committed");
        Ok(self.view(&product))
    }

    /// Remove stock without a destination. Irreversible.
    #[instrument(
        skip(self, cmd),
        fields(product_id = %cmd.product_id, location_id = %cmd.location_id, quantity = cmd.quantity),
        err
    )]
    pub fn export(&self, cmd: ExportStock) -> OperationResult<ProductView> {
        cmd.validate()?;

        let _guard = self.lock_products(&[cmd.product_id])?;
        let mut product = self.require_product(cmd.product_id)?;
        let expected = ExpectedVersion::Exact(product.version());

        product.stock().ensure_deductible(cmd.location_id, cmd.quantity)?;
        product.upsert_stock(
            cmd.location_id,
            -cmd.quantity,
            StockMode::Increment,
            None,
            cmd.occurred_at,
        )?;

        let movement = Movement::record(
            cmd.product_id,
            MovementRoute::Export {
                from_location_id: cmd.location_id,
            },
            cmd.quantity,
            product.cost_price(),
            cmd.actor_id,
            cmd.occurred_at,
            cmd.notes,
        )?;

        let mut unit = UnitOfWork::new();
        unit.write_product(product.clone(), expected)
            .append_movement(movement);
        self.commit(unit)?;

        info!(version = product.version(), "export committed");
        Ok(self.view(&product))
    }

    /// Correct prices of a known product and add stock in one step.
    #[instrument(
        skip(self, cmd),
        fields(product_id = %cmd.product_id, location_id = %cmd.location_id, quantity = cmd.quantity),
        err
    )]
    pub fn update_product_and_inventory(
        &self,
        cmd: UpdateProductAndInventory,
    ) -> OperationResult<ProductView> {
        cmd.validate()?;

        let _guard = self.lock_products(&[cmd.product_id])?;
        let product = self.require_product(cmd.product_id)?;
        self.augment_existing(
            product,
            Restock {
                cost_price: cmd.cost_price,
                selling_price: cmd.selling_price,
                import_origin_id: cmd.import_origin_id,
                quantity: cmd.quantity,
                location_id: cmd.location_id,
                actor_id: cmd.actor_id,
                notes: cmd.notes,
                occurred_at: cmd.occurred_at,
            },
        )
    }

    /// Replace a location's count with a physically counted quantity.
    ///
    /// The difference is logged as an IMPORT (surplus) or EXPORT (shrinkage)
    /// movement. A count equal to the current quantity changes nothing.
    #[instrument(
        skip(self, cmd),
        fields(product_id = %cmd.product_id, location_id = %cmd.location_id, counted = cmd.counted_quantity),
        err
    )]
    pub fn correct_stock(&self, cmd: CorrectStock) -> OperationResult<ProductView> {
        cmd.validate()?;

        let _guard = self.lock_products(&[cmd.product_id])?;
        let mut product = self.require_product(cmd.product_id)?;
        let expected = ExpectedVersion::Exact(product.version());

        let current = product.stock().quantity_at(cmd.location_id);
        let difference = cmd.counted_quantity - current;
        if difference == 0 {
            return Ok(self.view(&product));
        }

        product.upsert_stock(
            cmd.location_id,
            cmd.counted_quantity,
            StockMode::Set,
            None,
            cmd.occurred_at,
        )?;

        let route = if difference > 0 {
            MovementRoute::Import {
                to_location_id: cmd.location_id,
            }
        } else {
            MovementRoute::Export {
                from_location_id: cmd.location_id,
            }
        };
        let notes = if cmd.reason.trim().is_empty() {
            "stock count correction".to_string()
        } else {
            format!("stock count correction: {}", cmd.reason.trim())
        };
        let movement = Movement::record(
            cmd.product_id,
            route,
            difference.abs(),
            product.cost_price(),
            cmd.actor_id,
            cmd.occurred_at,
            notes,
        )?;

        let mut unit = UnitOfWork::new();
        unit.write_product(product.clone(), expected)
            .append_movement(movement);
        self.commit(unit)?;

        info!(previous = current, difference, "stock count corrected");
        Ok(self.view(&product))
    }

    /// Partial update of description and prices. Not stock affecting.
    #[instrument(skip(self, cmd), fields(product_id = %cmd.product_id), err)]
    pub fn update_pricing(&self, cmd: UpdatePricing) -> OperationResult<ProductView> {
        let _guard = self.lock_products(&[cmd.product_id])?;
        let mut product = self.require_product(cmd.product_id)?;
        let loaded_version = product.version();

        product.update_pricing(cmd)?;
        if product.version() == loaded_version {
            return Ok(self.view(&product));
        }

        let mut unit = UnitOfWork::new();
        unit.write_product(product.clone(), ExpectedVersion::Exact(loaded_version));
        self.commit(unit)?;

        info!(version = product.version(), "pricing updated");
        Ok(self.view(&product))
    }

    /// Record a multi-item sale.
    ///
    /// Every item is checked against current stock before anything changes;
    /// one failing item rejects the whole sale with `ValidationFailed`. On
    /// success each item yields one EXPORT movement and all product writes,
    /// movements and the sale record commit together.
    #[instrument(
        skip(self, cmd),
        fields(sale_id = %cmd.sale_id, items = cmd.items.len()),
        err
    )]
    pub fn sale(&self, cmd: RecordSale) -> OperationResult<Sale> {
        cmd.validate_shape()?;

        let product_ids = cmd.product_ids();
        let _guard = self.lock_products(&product_ids)?;

        let mut products: HashMap<ProductId, Product> = HashMap::with_capacity(product_ids.len());
        for product_id in &product_ids {
            if let Some(product) = self.store.load_product(*product_id)? {
                products.insert(*product_id, product);
            }
        }

        if let Err(rejection) = cmd.check_availability(&products) {
            warn!(item = rejection.item_number, reason = ?rejection.reason, "sale rejected");
            return Err(DomainError::from(rejection).into());
        }

        let loaded_versions: HashMap<ProductId, u64> = products
            .iter()
            .map(|(id, product)| (*id, product.version()))
            .collect();

        let notes = sale_movement_notes(cmd.sale_id, &cmd.notes);
        let mut movements = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            let product = products
                .get_mut(&item.product_id)
                .ok_or_else(|| OperationError::NotFound(format!("product {}", item.product_id)))?;
            product.upsert_stock(
                item.location_id,
                -item.quantity,
                StockMode::Increment,
                None,
                cmd.occurred_at,
            )?;
            movements.push(Movement::record(
                item.product_id,
                MovementRoute::Export {
                    from_location_id: item.location_id,
                },
                item.quantity,
                product.cost_price(),
                cmd.actor_id,
                cmd.occurred_at,
                notes.clone(),
            )?);
        }

        let movement_ids = movements.iter().map(Movement::id).collect();
        let sale = Sale::completed(cmd, movement_ids)?;
        let total = sale.total()?;

        let mut unit = UnitOfWork::new();
        for product_id in &product_ids {
            if let (Some(product), Some(version)) =
                (products.remove(product_id), loaded_versions.get(product_id))
            {
                unit.write_product(product, ExpectedVersion::Exact(*version));
            }
        }
        for movement in movements {
            unit.append_movement(movement);
        }
        unit.record_sale(sale.clone());
        self.commit(unit)?;

        info!(total = %total, quantity = sale.total_quantity(), "sale recorded");
        Ok(sale)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub fn product(&self, product_id: ProductId) -> OperationResult<ProductView> {
        let product = self.require_product(product_id)?;
        Ok(self.view(&product))
    }

    /// Exact lookup after trimming; `None` when no product carries the number.
    pub fn find_by_parts_number(&self, parts_number: &str) -> OperationResult<Option<ProductView>> {
        let parts_number = normalize_parts_number(parts_number)?;
        Ok(self
            .store
            .find_by_parts_number(&parts_number)?
            .map(|product| self.view(&product)))
    }

    /// Movements matching `filter`, newest first.
    pub fn list_movements(
        &self,
        filter: &MovementFilter,
        pagination: Pagination,
    ) -> OperationResult<Page<Movement>> {
        Ok(self.store.query_movements(filter, pagination)?)
    }

    /// Full movement history of one product, newest first.
    pub fn list_movements_by_product(&self, product_id: ProductId) -> OperationResult<Vec<Movement>> {
        self.require_product(product_id)?;
        Ok(self.store.movements_for_product(product_id)?)
    }

    pub fn stock_by_location_summary(&self) -> OperationResult<Vec<LocationStock>> {
        let products = self.store.list_products()?;
        Ok(summarize_by_location(&products, &self.resolver)?)
    }

    pub fn valuation_summary(&self) -> OperationResult<ValuationSummary> {
        let products = self.store.list_products()?;
        Ok(ValuationSummary::compute(&products)?)
    }

    /// Sales matching `filter`, newest first.
    pub fn list_sales(&self, filter: &SaleFilter, pagination: Pagination) -> OperationResult<Page<Sale>> {
        Ok(self.store.query_sales(filter, pagination)?)
    }

    pub fn sale_by_id(&self, sale_id: SaleId) -> OperationResult<Sale> {
        self.store
            .load_sale(sale_id)?
            .ok_or_else(|| OperationError::NotFound(format!("sale {sale_id}")))
    }

    // ---------------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------------

    /// Shared tail of Import (known parts number) and UpdateProductAndInventory.
    ///
    /// The caller holds the product lock and passes the product as loaded
    /// under it.
    fn augment_existing(&self, product: Product, restock: Restock) -> OperationResult<ProductView> {
        let mut product = product;
        let product_id = product.id_typed();
        let expected = ExpectedVersion::Exact(product.version());

        let mut pricing = UpdatePricing::new(product_id, restock.occurred_at);
        pricing.cost_price = Some(restock.cost_price);
        if let Some(selling) = restock.selling_price {
            pricing.selling_price = Patch::Set(selling);
        }
        product.update_pricing(pricing)?;

        if let Some(import_origin_id) = restock.import_origin_id {
            product.execute(&ProductCommand::AssignImportOrigin(AssignImportOrigin {
                product_id,
                import_origin_id,
                occurred_at: restock.occurred_at,
            }))?;
        }

        product.upsert_stock(
            restock.location_id,
            restock.quantity,
            StockMode::Increment,
            Some(restock.cost_price),
            restock.occurred_at,
        )?;

        let movement = Movement::record(
            product_id,
            MovementRoute::Import {
                to_location_id: restock.location_id,
            },
            restock.quantity,
            restock.cost_price,
            restock.actor_id,
            restock.occurred_at,
            restock.notes,
        )?;

        let mut unit = UnitOfWork::new();
        unit.write_product(product.clone(), expected)
            .append_movement(movement);
        self.commit(unit)?;

        info!(%product_id, version = product.version(), "stock added to existing product");
        Ok(self.view(&product))
    }

    fn acquire(&self, keys: Vec<LockKey>) -> OperationResult<LockGuard<'_>> {
        self.locks.acquire(keys).map_err(|err| {
            warn!(error = %err, "lock acquisition failed");
            OperationError::from(err)
        })
    }

    fn lock_products(&self, product_ids: &[ProductId]) -> OperationResult<LockGuard<'_>> {
        self.acquire(product_ids.iter().copied().map(LockKey::Product).collect())
    }

    fn require_product(&self, product_id: ProductId) -> OperationResult<Product> {
        self.store
            .load_product(product_id)?
            .ok_or_else(|| OperationError::NotFound(format!("product {product_id}")))
    }

    fn commit(&self, unit: UnitOfWork) -> OperationResult<CommitReceipt> {
        self.store.commit(unit).map_err(|err| {
            warn!(error = %err, "commit rejected");
            OperationError::from(err)
        })
    }

    fn view(&self, product: &Product) -> ProductView {
        ProductView::resolve(product, &self.resolver)
    }
}

fn sale_movement_notes(sale_id: SaleId, notes: &str) -> String {
    match notes.trim() {
        "" => format!("sale {sale_id}"),
        notes => format!("sale {sale_id}: {notes}"),
    }
}
