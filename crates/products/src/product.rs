use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    Aggregate, AggregateRoot, DomainError, DomainResult, ImportOriginId, LocationId, Patch,
    ProductId, ValueObject,
};

use crate::stock::{StockEntry, StockLocationMap, StockMode};

/// A competing price for this part from one import origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceComparison {
    pub origin_id: ImportOriginId,
    pub price: Decimal,
}

impl ValueObject for PriceComparison {}

/// Reject negative money amounts.
pub fn validate_price(field: &str, value: Decimal) -> DomainResult<Decimal> {
    if value < Decimal::ZERO {
        return Err(DomainError::validation(format!("{field} cannot be negative")));
    }
    Ok(value)
}

/// Canonical form of a parts number (surrounding whitespace removed).
///
/// Uniqueness is checked on this form.
pub fn normalize_parts_number(raw: &str) -> DomainResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("parts number cannot be empty"));
    }
    Ok(trimmed.to_string())
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    parts_number: String,
    description: String,
    cost_price: Decimal,
    selling_price: Option<Decimal>,
    import_origin_id: Option<ImportOriginId>,
    price_comparisons: Vec<PriceComparison>,
    stock: StockLocationMap,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-registered aggregate instance.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            parts_number: String::new(),
            description: String::new(),
            cost_price: Decimal::ZERO,
            selling_price: None,
            import_origin_id: None,
            price_comparisons: Vec::new(),
            stock: StockLocationMap::new(),
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    /// Register a new product in one step.
    pub fn register(cmd: RegisterProduct) -> DomainResult<Self> {
        let mut product = Self::empty(cmd.product_id);
        product.execute(&ProductCommand::RegisterProduct(cmd))?;
        Ok(product)
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn is_registered(&self) -> bool {
        self.created
    }

    pub fn parts_number(&self) -> &str {
        &self.parts_number
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn cost_price(&self) -> Decimal {
        self.cost_price
    }

    pub fn selling_price(&self) -> Option<Decimal> {
        self.selling_price
    }

    pub fn import_origin_id(&self) -> Option<ImportOriginId> {
        self.import_origin_id
    }

    pub fn price_comparisons(&self) -> &[PriceComparison] {
        &self.price_comparisons
    }

    pub fn stock(&self) -> &StockLocationMap {
        &self.stock
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Stock entry at a location, `None` if the product never held stock there.
    pub fn find_entry(&self, location_id: LocationId) -> Option<&StockEntry> {
        self.stock.entry(location_id)
    }

    /// Total stock across all locations valued at the current cost price.
    pub fn stock_value_at_cost(&self) -> DomainResult<Decimal> {
        Decimal::from(self.stock.total_quantity())
            .checked_mul(self.cost_price)
            .ok_or_else(|| DomainError::invalid_operation("stock value overflow"))
    }

    /// Apply an increment or an absolute count to one location.
    ///
    /// Returns the resulting quantity. Fails without touching state when the
    /// result would be negative.
    pub fn upsert_stock(
        &mut self,
        location_id: LocationId,
        amount: i64,
        mode: StockMode,
        unit_price: Option<Decimal>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<i64> {
        self.execute(&ProductCommand::AdjustStock(AdjustStock {
            product_id: self.id,
            location_id,
            amount,
            mode,
            unit_price,
            occurred_at,
        }))?;
        Ok(self.stock.quantity_at(location_id))
    }

    /// Partial pricing/description update.
    pub fn update_pricing(&mut self, cmd: UpdatePricing) -> DomainResult<()> {
        self.execute(&ProductCommand::UpdatePricing(cmd))?;
        Ok(())
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProduct {
    pub product_id: ProductId,
    pub parts_number: String,
    pub description: String,
    pub cost_price: Decimal,
    pub selling_price: Option<Decimal>,
    pub import_origin_id: Option<ImportOriginId>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub amount: i64,
    pub mode: StockMode,
    pub unit_price: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdatePricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePricing {
    pub product_id: ProductId,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cost_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub selling_price: Patch<Decimal>,
    #[serde(default)]
    pub price_comparisons: Option<Vec<PriceComparison>>,
    pub occurred_at: DateTime<Utc>,
}

impl UpdatePricing {
    /// An update that changes nothing yet.
    pub fn new(product_id: ProductId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            product_id,
            description: None,
            cost_price: None,
            selling_price: Patch::Unset,
            price_comparisons: None,
            occurred_at,
        }
    }

    fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.cost_price.is_none()
            && self.selling_price.is_unset()
            && self.price_comparisons.is_none()
    }
}

/// Command: AssignImportOrigin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignImportOrigin {
    pub product_id: ProductId,
    pub import_origin_id: ImportOriginId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    RegisterProduct(RegisterProduct),
    AdjustStock(AdjustStock),
    UpdatePricing(UpdatePricing),
    AssignImportOrigin(AssignImportOrigin),
}

/// Event: ProductRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRegistered {
    pub product_id: ProductId,
    pub parts_number: String,
    pub description: String,
    pub cost_price: Decimal,
    pub selling_price: Option<Decimal>,
    pub import_origin_id: Option<ImportOriginId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockLevelChanged (absolute quantities, so replay needs no arithmetic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevelChanged {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub unit_price: Option<Decimal>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PricingUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingUpdated {
    pub product_id: ProductId,
    pub description: Option<String>,
    pub cost_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Patch::is_unset")]
    pub selling_price: Patch<Decimal>,
    pub price_comparisons: Option<Vec<PriceComparison>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ImportOriginAssigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOriginAssigned {
    pub product_id: ProductId,
    pub import_origin_id: ImportOriginId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductRegistered(ProductRegistered),
    StockLevelChanged(StockLevelChanged),
    PricingUpdated(PricingUpdated),
    ImportOriginAssigned(ImportOriginAssigned),
}

impl ProductEvent {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductRegistered(e) => e.occurred_at,
            ProductEvent::StockLevelChanged(e) => e.occurred_at,
            ProductEvent::PricingUpdated(e) => e.occurred_at,
            ProductEvent::ImportOriginAssigned(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductRegistered(e) => {
                self.id = e.product_id;
                self.parts_number = e.parts_number.clone();
                self.description = e.description.clone();
                self.cost_price = e.cost_price;
                self.selling_price = e.selling_price;
                self.import_origin_id = e.import_origin_id;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ProductEvent::StockLevelChanged(e) => {
                self.stock.put(e.location_id, e.new_quantity, e.unit_price);
            }
            ProductEvent::PricingUpdated(e) => {
                if let Some(description) = &e.description {
                    self.description = description.clone();
                }
                if let Some(cost) = e.cost_price {
                    self.cost_price = cost;
                }
                e.selling_price.clone().apply_to(&mut self.selling_price);
                if let Some(comparisons) = &e.price_comparisons {
                    self.price_comparisons = comparisons.clone();
                }
            }
            ProductEvent::ImportOriginAssigned(e) => {
                self.import_origin_id = Some(e.import_origin_id);
            }
        }

        self.updated_at = Some(event.occurred_at());
        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::RegisterProduct(cmd) => self.handle_register(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            ProductCommand::UpdatePricing(cmd) => self.handle_update_pricing(cmd),
            ProductCommand::AssignImportOrigin(cmd) => self.handle_assign_origin(cmd),
        }
    }
}

impl Product {
    fn ensure_registered(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("product {}", self.id)));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }
        self.ensure_product_id(cmd.product_id)?;

        // Catalog-wide uniqueness is the store's job; the aggregate only sees itself.
        let parts_number = normalize_parts_number(&cmd.parts_number)?;
        let cost_price = validate_price("cost price", cmd.cost_price)?;
        if let Some(selling) = cmd.selling_price {
            validate_price("selling price", selling)?;
        }

        Ok(vec![ProductEvent::ProductRegistered(ProductRegistered {
            product_id: cmd.product_id,
            parts_number,
            description: cmd.description.clone(),
            cost_price,
            selling_price: cmd.selling_price,
            import_origin_id: cmd.import_origin_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_registered()?;
        self.ensure_product_id(cmd.product_id)?;

        if cmd.mode == StockMode::Increment && cmd.amount == 0 {
            return Err(DomainError::validation("stock delta cannot be zero"));
        }
        if let Some(price) = cmd.unit_price {
            validate_price("unit price", price)?;
        }

        let previous = self.stock.entry(cmd.location_id).map(|e| e.quantity);
        let new_quantity = self.stock.resolve(cmd.location_id, cmd.amount, cmd.mode)?;
        if self.stock.total_with(cmd.location_id, new_quantity).is_none() {
            return Err(DomainError::invalid_operation("total stock quantity overflow"));
        }

        // Setting an existing entry to its current count is a no-op.
        if previous == Some(new_quantity) && cmd.mode == StockMode::Set {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::StockLevelChanged(StockLevelChanged {
            product_id: cmd.product_id,
            location_id: cmd.location_id,
            previous_quantity: previous.unwrap_or(0),
            new_quantity,
            unit_price: cmd.unit_price,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_pricing(&self, cmd: &UpdatePricing) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_registered()?;
        self.ensure_product_id(cmd.product_id)?;

        if cmd.is_empty() {
            return Ok(vec![]);
        }
        if let Some(cost) = cmd.cost_price {
            validate_price("cost price", cost)?;
        }
        if let Some(selling) = cmd.selling_price.value() {
            validate_price("selling price", *selling)?;
        }
        if let Some(comparisons) = &cmd.price_comparisons {
            for (idx, c) in comparisons.iter().enumerate() {
                validate_price("comparison price", c.price)?;
                if comparisons[..idx].iter().any(|o| o.origin_id == c.origin_id) {
                    return Err(DomainError::validation(format!(
                        "duplicate price comparison for origin {}",
                        c.origin_id
                    )));
                }
            }
        }

        Ok(vec![ProductEvent::PricingUpdated(PricingUpdated {
            product_id: cmd.product_id,
            description: cmd.description.clone(),
            cost_price: cmd.cost_price,
            selling_price: cmd.selling_price.clone(),
            price_comparisons: cmd.price_comparisons.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_origin(&self, cmd: &AssignImportOrigin) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_registered()?;
        self.ensure_product_id(cmd.product_id)?;

        if self.import_origin_id == Some(cmd.import_origin_id) {
            return Ok(vec![]);
        }

        Ok(vec![ProductEvent::ImportOriginAssigned(ImportOriginAssigned {
            product_id: cmd.product_id,
            import_origin_id: cmd.import_origin_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
