//! Inventory movement ledger and stock workflow commands.
//!
//! A [`Movement`] is the immutable audit record of one stock-affecting event.
//! The command types describe the workflows that produce them; executing them
//! against a store is the infrastructure layer's job.

pub mod command;
pub mod movement;

pub use command::{
    CorrectStock, ExportStock, ImportStock, TransferStock, UpdateProductAndInventory,
    ensure_positive_quantity,
};
pub use movement::{Movement, MovementRoute, MovementType};
