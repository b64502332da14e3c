//! Stock workflow commands.
//!
//! Each command validates its own shape (positive quantities, non-negative
//! prices, non-blank parts numbers) before any store is touched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{ActorId, DomainError, DomainResult, ImportOriginId, LocationId, ProductId};
use stockledger_products::{normalize_parts_number, validate_price};

/// Moved quantities are magnitudes and must be strictly positive.
pub fn ensure_positive_quantity(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "quantity must be positive (got {quantity})"
        )));
    }
    Ok(())
}

/// Command: ImportStock.
///
/// Creates the product on first import of a parts number, otherwise augments it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStock {
    pub parts_number: String,
    pub description: String,
    pub quantity: i64,
    pub cost_price: Decimal,
    pub location_id: LocationId,
    #[serde(default)]
    pub import_origin_id: Option<ImportOriginId>,
    #[serde(default)]
    pub selling_price: Option<Decimal>,
    pub actor_id: ActorId,
    #[serde(default)]
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

impl ImportStock {
    pub fn validate(&self) -> DomainResult<()> {
        normalize_parts_number(&self.parts_number)?;
        ensure_positive_quantity(self.quantity)?;
        validate_price("cost price", self.cost_price)?;
        if let Some(selling) = self.selling_price {
            validate_price("selling price", selling)?;
        }
        Ok(())
    }
}

/// Command: TransferStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStock {
    pub product_id: ProductId,
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub quantity: i64,
    /// Price recorded on the movement; the product's cost price when absent.
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    pub actor_id: ActorId,
    #[serde(default)]
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

impl TransferStock {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_positive_quantity(self.quantity)?;
        if let Some(price) = self.unit_price {
            validate_price("unit price", price)?;
        }
        Ok(())
    }

    pub fn is_same_location(&self) -> bool {
        self.from_location_id == self.to_location_id
    }
}

/// Command: ExportStock (removal without destination; irreversible).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportStock {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
    pub actor_id: ActorId,
    #[serde(default)]
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

impl ExportStock {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_positive_quantity(self.quantity)
    }
}

/// Command: UpdateProductAndInventory.
///
/// Price correction plus stock addition on a known product id. The stock and
/// movement effect matches an import into an existing product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProductAndInventory {
    pub product_id: ProductId,
    pub cost_price: Decimal,
    pub quantity: i64,
    pub location_id: LocationId,
    #[serde(default)]
    pub selling_price: Option<Decimal>,
    #[serde(default)]
    pub import_origin_id: Option<ImportOriginId>,
    pub actor_id: ActorId,
    #[serde(default)]
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

impl UpdateProductAndInventory {
    pub fn validate(&self) -> DomainResult<()> {
        ensure_positive_quantity(self.quantity)?;
        validate_price("cost price", self.cost_price)?;
        if let Some(selling) = self.selling_price {
            validate_price("selling price", selling)?;
        }
        Ok(())
    }
}

/// Command: CorrectStock (replace a location's count after a physical count).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectStock {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub counted_quantity: i64,
    pub actor_id: ActorId,
    #[serde(default)]
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

impl CorrectStock {
    pub fn validate(&self) -> DomainResult<()> {
        if self.counted_quantity < 0 {
            return Err(DomainError::invalid_operation(format!(
                "counted quantity cannot be negative (got {})",
                self.counted_quantity
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(parts_number: &str, quantity: i64, cost: i64) -> ImportStock {
        ImportStock {
            parts_number: parts_number.to_string(),
            description: "Oil filter".to_string(),
            quantity,
            cost_price: Decimal::from(cost),
            location_id: LocationId::new(),
            import_origin_id: None,
            selling_price: None,
            actor_id: ActorId::new(),
            notes: String::new(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn import_validation_covers_quantity_price_and_parts_number() {
        assert!(import("P1", 10, 5).validate().is_ok());
        assert!(matches!(import("P1", 0, 5).validate(), Err(DomainError::Validation(_))));
        assert!(matches!(import("P1", 1, -5).validate(), Err(DomainError::Validation(_))));
        assert!(matches!(import(" ", 1, 5).validate(), Err(DomainError::Validation(_))));

        let mut negative_selling = import("P1", 1, 5);
        negative_selling.selling_price = Some(Decimal::from(-2));
        assert!(negative_selling.validate().is_err());
    }

    #[test]
    fn transfer_detects_same_location() {
        let loc = LocationId::new();
        let cmd = TransferStock {
            product_id: ProductId::new(),
            from_location_id: loc,
            to_location_id: loc,
            quantity: 1,
            unit_price: None,
            actor_id: ActorId::new(),
            notes: String::new(),
            occurred_at: Utc::now(),
        };
        assert!(cmd.is_same_location());
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn export_rejects_non_positive_quantity() {
        let cmd = ExportStock {
            product_id: ProductId::new(),
            location_id: LocationId::new(),
            quantity: -1,
            actor_id: ActorId::new(),
            notes: String::new(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(cmd.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn negative_count_correction_is_invalid_operation() {
        let cmd = CorrectStock {
            product_id: ProductId::new(),
            location_id: LocationId::new(),
            counted_quantity: -1,
            actor_id: ActorId::new(),
            reason: "cycle count".to_string(),
            occurred_at: Utc::now(),
        };
        assert!(matches!(cmd.validate(), Err(DomainError::InvalidOperation(_))));
    }

    #[test]
    fn import_json_defaults_optional_fields() {
        let body = format!(
            r#"{{
                "parts_number": "P1",
                "description": "Oil filter",
                "quantity": 3,
                "cost_price": "4.75",
                "location_id": "{}",
                "actor_id": "{}",
                "occurred_at": "2026-03-01T10:00:00Z"
            }}"#,
            LocationId::new(),
            ActorId::new()
        );
        let cmd: ImportStock = serde_json::from_str(&body).unwrap();
        assert_eq!(cmd.cost_price, Decimal::new(475, 2));
        assert_eq!(cmd.selling_price, None);
        assert_eq!(cmd.notes, "");
        assert!(cmd.validate().is_ok());
    }
}
