use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{ActorId, DomainError, DomainResult, LocationId, MovementId, ProductId};
use stockledger_products::validate_price;

use crate::command::ensure_positive_quantity;

/// Kind of stock-affecting event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Import,
    Transfer,
    Export,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Import => "IMPORT",
            MovementType::Transfer => "TRANSFER",
            MovementType::Export => "EXPORT",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where stock came from and went to.
///
/// Imports only have a destination, exports only a source, transfers both.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementRoute {
    Import {
        to_location_id: LocationId,
    },
    Transfer {
        from_location_id: LocationId,
        to_location_id: LocationId,
    },
    Export {
        from_location_id: LocationId,
    },
}

impl MovementRoute {
    pub fn movement_type(&self) -> MovementType {
        match self {
            MovementRoute::Import { .. } => MovementType::Import,
            MovementRoute::Transfer { .. } => MovementType::Transfer,
            MovementRoute::Export { .. } => MovementType::Export,
        }
    }

    pub fn from_location_id(&self) -> Option<LocationId> {
        match *self {
            MovementRoute::Import { .. } => None,
            MovementRoute::Transfer { from_location_id, .. } => Some(from_location_id),
            MovementRoute::Export { from_location_id } => Some(from_location_id),
        }
    }

    pub fn to_location_id(&self) -> Option<LocationId> {
        match *self {
            MovementRoute::Import { to_location_id } => Some(to_location_id),
            MovementRoute::Transfer { to_location_id, .. } => Some(to_location_id),
            MovementRoute::Export { .. } => None,
        }
    }
}

/// Immutable audit record of one stock-affecting event.
///
/// `quantity` is always the magnitude moved; the direction lives in the route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    id: MovementId,
    product_id: ProductId,
    #[serde(flatten)]
    route: MovementRoute,
    quantity: i64,
    unit_price: Decimal,
    actor_id: ActorId,
    occurred_at: DateTime<Utc>,
    notes: String,
}

impl Movement {
    pub fn record(
        product_id: ProductId,
        route: MovementRoute,
        quantity: i64,
        unit_price: Decimal,
        actor_id: ActorId,
        occurred_at: DateTime<Utc>,
        notes: impl Into<String>,
    ) -> DomainResult<Self> {
        ensure_positive_quantity(quantity)?;
        validate_price("movement unit price", unit_price)?;

        Ok(Self {
            id: MovementId::new(),
            product_id,
            route,
            quantity,
            unit_price,
            actor_id,
            occurred_at,
            notes: notes.into(),
        })
    }

    pub fn id(&self) -> MovementId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn route(&self) -> MovementRoute {
        self.route
    }

    pub fn movement_type(&self) -> MovementType {
        self.route.movement_type()
    }

    pub fn from_location_id(&self) -> Option<LocationId> {
        self.route.from_location_id()
    }

    pub fn to_location_id(&self) -> Option<LocationId> {
        self.route.to_location_id()
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    /// `quantity × unit_price`.
    pub fn value(&self) -> DomainResult<Decimal> {
        Decimal::from(self.quantity)
            .checked_mul(self.unit_price)
            .ok_or_else(|| DomainError::invalid_operation("movement value overflow"))
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

    /// Signed effect of this movement on one location's quantity.
    pub fn net_effect_at(&self, location_id: LocationId) -> i64 {
        let mut net = 0;
        if self.from_location_id() == Some(location_id) {
            net -= self.quantity;
        }
        if self.to_location_id() == Some(location_id) {
            net += self.quantity;
        }
        net
    }
}
