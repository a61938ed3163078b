//! Infrastructure layer: inventory stores and the services built on them.
//!
//! Services take the acting [`stockbook_auth::Principal`] on every call and
//! run the authorization guard before touching a store.

pub mod audit;
pub mod catalog;
pub mod dashboard;
pub mod error;
pub mod recorder;
pub mod store;

pub use audit::StockAuditor;
pub use catalog::{Catalog, ProductDetail};
pub use dashboard::{Dashboard, DashboardStats};
pub use error::ServiceError;
pub use recorder::LedgerRecorder;
pub use store::{
    EntryFilter, InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, ProductFilter, Recorded,
    StockedProduct, StoreError,
};
