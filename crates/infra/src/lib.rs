//! Infrastructure layer: stores, locking, configuration and the workflow
//! orchestrator that ties the domain crates together.

pub mod config;
pub mod error;
pub mod locks;
pub mod operations;
pub mod reports;
pub mod resolver;
pub mod store;


pub use config::{OperationsConfig, SameLocationTransfer};
pub use error::{OperationError, OperationResult};
pub use operations::InventoryOperations;
pub use resolver::{InMemoryReferenceDirectory, ProductView, ReferenceResolver, StockEntryView};
pub use locks::{LockError, LockGuard, LockKey, LockTable};
pub use reports::{LocationStock, ValuationSummary};
pub use store::{
    CommitReceipt, InMemoryLedgerStore, LedgerStore, MovementFilter, Page, Pagination, ProductWrite,
    SaleFilter, StoreError, UnitOfWork,
};
