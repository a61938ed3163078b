//! Inventory domain module.
//!
//! Products, categories, the append-only stock ledger and the stock balance
//! derived from it. Everything here is deterministic domain logic (no IO, no
//! HTTP, no storage); stores apply entries through [`projector::project`].

pub mod balance;
pub mod category;
pub mod error;
pub mod ledger;
pub mod product;
pub mod projector;

pub use balance::StockBalance;
pub use category::{Category, NewCategory};
pub use error::LedgerError;
pub use ledger::{EntryType, LedgerEntry, StockDirection, StockRequest};
pub use product::{NewProduct, Product, ProductUpdate};
pub use projector::{Reconciliation, net_quantity, project, reconcile, replay};
