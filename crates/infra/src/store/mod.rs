//! Ledger persistence boundary.
//!
//! Products, movements and sales live behind one store so that a stock
//! mutation and the movement that audits it commit together.

pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use query::{MovementFilter, Page, Pagination, SaleFilter};
pub use r#trait::{CommitReceipt, LedgerStore, ProductWrite, StoreError, UnitOfWork};
