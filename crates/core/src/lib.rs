//! `stockledger-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the catalog,
//! movement and sales crates (no infrastructure concerns).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod patch;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{ActorId, ImportOriginId, LocationId, MovementId, ProductId, SaleId};
pub use patch::Patch;
pub use value_object::ValueObject;
