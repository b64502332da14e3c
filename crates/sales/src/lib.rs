//! Sales ledger domain module.
//!
//! A sale is a multi-item export that also keeps the price charged per item.
//! This crate holds the record types and the all-or-nothing availability
//! check that runs before any stock is deducted.

pub mod sale;

pub use sale::{RecordSale, RejectionReason, Sale, SaleItem, SaleItemRejection};
