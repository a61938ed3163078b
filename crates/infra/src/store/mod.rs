//! Inventory persistence boundary.
//!
//! A store owns the atomic unit of work for stock movements: `apply_entry`
//! checks the balance, appends the entry and updates the balance as one step,
//! delegating the rule itself to [`stockbook_inventory::project`].

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockbook_core::{CategoryId, Money, ProductId};
use stockbook_inventory::{Category, EntryType, LedgerEntry, LedgerError, Product, StockBalance};

pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("sku '{0}' is already in use")]
    DuplicateSku(String),

    #[error("category name '{0}' is already in use")]
    DuplicateCategory(String),

    #[error("category {0} does not exist")]
    UnknownCategory(CategoryId),

    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(String),

    #[error("lock poisoned")]
    Poisoned,
}

/// A committed movement: the entry as stored and the balance it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recorded {
    pub entry: LedgerEntry,
    pub balance: StockBalance,
}

/// A live product with its balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockedProduct {
    pub product: Product,
    pub balance: StockBalance,
}

impl StockedProduct {
    pub fn is_low(&self) -> bool {
        self.balance.is_low(self.product.reorder_level)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring of name or SKU.
    pub search: Option<String>,
    pub include_inactive: bool,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        (self.include_inactive || product.is_active)
            && self.category_id.is_none_or(|c| product.category_id == Some(c))
            && self.search.as_deref().is_none_or(|s| product.matches_search(s))
    }
}

/// Ledger query. `from` is inclusive, `to` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub entry_type: Option<EntryType>,
    pub product_id: Option<ProductId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.entry_type.is_none_or(|t| entry.entry_type == t)
            && self.product_id.is_none_or(|p| entry.product_id == p)
            && self.from.is_none_or(|from| entry.created_at >= from)
            && self.to.is_none_or(|to| entry.created_at < to)
    }
}

#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Insert a product together with its opening balance.
    async fn insert_product(&self, product: Product, balance: StockBalance) -> Result<(), StoreError>;

    /// Replace a live product and re-value its balance at the new purchase price.
    async fn update_product(&self, product: Product) -> Result<StockedProduct, StoreError>;

    async fn soft_delete_product(&self, id: ProductId, at: DateTime<Utc>) -> Result<Product, StoreError>;

    /// Live (not soft-deleted) product, or `None`.
    async fn get_product(&self, id: ProductId) -> Result<Option<StockedProduct>, StoreError>;

    /// Live products matching the filter, sorted by name.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<StockedProduct>, StoreError>;

    async fn insert_category(&self, category: Category) -> Result<(), StoreError>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError>;

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    /// Replace a category's name and description. `NotFound` if it is gone.
    async fn update_category(&self, category: Category) -> Result<Category, StoreError>;

    /// Remove a category. Products that referenced it keep existing with no category.
    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError>;

    /// Check, stamp, append and update in one atomic step.
    ///
    /// `created_at` is set while the balance is locked, so per product the
    /// ledger's time order is its commit order. Fails with
    /// `LedgerError::ProductNotFound` for unknown or deleted products and
    /// `LedgerError::InsufficientStock` for oversells; nothing is written on
    /// failure.
    async fn apply_entry(&self, entry: LedgerEntry) -> Result<Recorded, StoreError>;

    /// Matching entries, newest first.
    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Full ledger of one product in application order, with the stored balance.
    async fn product_history(&self, id: ProductId) -> Result<Option<(StockBalance, Vec<LedgerEntry>)>, StoreError>;

    /// Sum of `total_amount` over matching entries (`limit` ignored).
    async fn sum_amount(&self, filter: &EntryFilter) -> Result<Money, StoreError> {
        let unbounded = EntryFilter {
            limit: None,
            ..filter.clone()
        };
        let entries = self.list_entries(&unbounded).await?;
        Ok(entries.iter().map(|e| e.total_amount).sum())
    }
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn insert_product(&self, product: Product, balance: StockBalance) -> Result<(), StoreError> {
        (**self).insert_product(product, balance).await
    }

    async fn update_product(&self, product: Product) -> Result<StockedProduct, StoreError> {
        (**self).update_product(product).await
    }

    async fn soft_delete_product(&self, id: ProductId, at: DateTime<Utc>) -> Result<Product, StoreError> {
        (**self).soft_delete_product(id, at).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<StockedProduct>, StoreError> {
        (**self).get_product(id).await
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<StockedProduct>, StoreError> {
        (**self).list_products(filter).await
    }

    async fn insert_category(&self, category: Category) -> Result<(), StoreError> {
        (**self).insert_category(category).await
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        (**self).get_category(id).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        (**self).list_categories().await
    }

    async fn update_category(&self, category: Category) -> Result<Category, StoreError> {
        (**self).update_category(category).await
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError> {
        (**self).delete_category(id).await
    }

    async fn apply_entry(&self, entry: LedgerEntry) -> Result<Recorded, StoreError> {
        (**self).apply_entry(entry).await
    }

    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).list_entries(filter).await
    }

    async fn product_history(&self, id: ProductId) -> Result<Option<(StockBalance, Vec<LedgerEntry>)>, StoreError> {
        (**self).product_history(id).await
    }

    async fn sum_amount(&self, filter: &EntryFilter) -> Result<Money, StoreError> {
        (**self).sum_amount(filter).await
    }
}
