use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use stockbook_core::{CategoryId, ProductId};
use stockbook_inventory::{Category, LedgerEntry, LedgerError, Product, StockBalance, project};

use super::{EntryFilter, InventoryStore, ProductFilter, Recorded, StockedProduct, StoreError};

/// One product's mutable state. The row mutex is the unit of atomicity.
#[derive(Debug)]
struct ProductRow {
    product: Product,
    balance: StockBalance,
    entries: Vec<LedgerEntry>,
}

impl ProductRow {
    fn stocked(&self) -> StockedProduct {
        StockedProduct {
            product: self.product.clone(),
            balance: self.balance.clone(),
        }
    }
}

type SharedRow = Arc<Mutex<ProductRow>>;

/// In-memory inventory store.
///
/// Intended for tests/dev. Lock order is `categories` → `skus` → `rows` → row
/// mutex; ledger writes only take `rows` (read) then the row mutex.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    /// Live SKU → product.
    skus: RwLock<HashMap<String, ProductId>>,
    rows: RwLock<HashMap<ProductId, SharedRow>>,
    categories: RwLock<Vec<Category>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, id: ProductId) -> Result<Option<SharedRow>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.get(&id).cloned())
    }

    fn all_rows(&self) -> Result<Vec<SharedRow>, StoreError> {
        let rows = self.rows.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.values().cloned().collect())
    }
}

fn ensure_category(categories: &[Category], id: Option<CategoryId>) -> Result<(), StoreError> {
    match id {
        Some(id) if !categories.iter().any(|c| c.id == id) => Err(StoreError::UnknownCategory(id)),
        _ => Ok(()),
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn insert_product(&self, product: Product, balance: StockBalance) -> Result<(), StoreError> {
        if balance.product_id != product.id {
            return Err(LedgerError::ProductMismatch {
                balance: balance.product_id,
                entry: product.id,
            }
            .into());
        }

        let categories = self.categories.read().map_err(|_| StoreError::Poisoned)?;
        ensure_category(&categories, product.category_id)?;

        let mut skus = self.skus.write().map_err(|_| StoreError::Poisoned)?;
        if skus.contains_key(&product.sku) {
            return Err(StoreError::DuplicateSku(product.sku));
        }

        let mut rows = self.rows.write().map_err(|_| StoreError::Poisoned)?;
        skus.insert(product.sku.clone(), product.id);
        rows.insert(
            product.id,
            Arc::new(Mutex::new(ProductRow {
                product,
                balance,
                entries: Vec::new(),
            })),
        );
        Ok(())
    }

    async fn update_product(&self, product: Product) -> Result<StockedProduct, StoreError> {
        let categories = self.categories.read().map_err(|_| StoreError::Poisoned)?;
        ensure_category(&categories, product.category_id)?;

        let mut skus = self.skus.write().map_err(|_| StoreError::Poisoned)?;
        let row = self.row(product.id)?.ok_or(StoreError::NotFound)?;
        let mut row = row.lock().map_err(|_| StoreError::Poisoned)?;

        if row.product.is_deleted() {
            return Err(StoreError::NotFound);
        }
        if skus.get(&product.sku).is_some_and(|owner| *owner != product.id) {
            return Err(StoreError::DuplicateSku(product.sku));
        }

        let balance = row.balance.revalue(product.purchase_price, product.updated_at)?;

        skus.remove(&row.product.sku);
        skus.insert(product.sku.clone(), product.id);
        row.product = product;
        row.balance = balance;
        Ok(row.stocked())
    }

    async fn soft_delete_product(&self, id: ProductId, at: DateTime<Utc>) -> Result<Product, StoreError> {
        let mut skus = self.skus.write().map_err(|_| StoreError::Poisoned)?;
        let row = self.row(id)?.ok_or(StoreError::NotFound)?;
        let mut row = row.lock().map_err(|_| StoreError::Poisoned)?;

        let deleted = row.product.soft_deleted(at).map_err(|_| StoreError::NotFound)?;
        skus.remove(&deleted.sku);
        row.product = deleted.clone();
        Ok(deleted)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<StockedProduct>, StoreError> {
        let Some(row) = self.row(id)? else {
            return Ok(None);
        };
        let row = row.lock().map_err(|_| StoreError::Poisoned)?;
        Ok((!row.product.is_deleted()).then(|| row.stocked()))
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<StockedProduct>, StoreError> {
        let mut out = Vec::new();
        for row in self.all_rows()? {
            let row = row.lock().map_err(|_| StoreError::Poisoned)?;
            if !row.product.is_deleted() && filter.matches(&row.product) {
                out.push(row.stocked());
            }
        }
        out.sort_by(|a, b| {
            a.product
                .name
                .to_lowercase()
                .cmp(&b.product.name.to_lowercase())
                .then_with(|| a.product.sku.cmp(&b.product.sku))
        });
        Ok(out)
    }

    async fn insert_category(&self, category: Category) -> Result<(), StoreError> {
        let mut categories = self.categories.write().map_err(|_| StoreError::Poisoned)?;
        if categories
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(&category.name))
        {
            return Err(StoreError::DuplicateCategory(category.name));
        }
        categories.push(category);
        Ok(())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, StoreError> {
        let categories = self.categories.read().map_err(|_| StoreError::Poisoned)?;
        Ok(categories.iter().find(|c| c.id == id).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let categories = self.categories.read().map_err(|_| StoreError::Poisoned)?;
        let mut out = categories.clone();
        out.sort_by_key(|c| c.name.to_lowercase());
        Ok(out)
    }

    async fn update_category(&self, category: Category) -> Result<Category, StoreError> {
        let mut categories = self.categories.write().map_err(|_| StoreError::Poisoned)?;
        if categories
            .iter()
            .any(|c| c.id != category.id && c.name.eq_ignore_ascii_case(&category.name))
        {
            return Err(StoreError::DuplicateCategory(category.name));
        }
        let slot = categories
            .iter_mut()
            .find(|c| c.id == category.id)
            .ok_or(StoreError::NotFound)?;
        *slot = category.clone();
        Ok(category)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), StoreError> {
        let mut categories = self.categories.write().map_err(|_| StoreError::Poisoned)?;
        let index = categories
            .iter()
            .position(|c| c.id == id)
            .ok_or(StoreError::NotFound)?;
        categories.remove(index);

        // Same effect as the `ON DELETE SET NULL` foreign key.
        for row in self.all_rows()? {
            let mut row = row.lock().map_err(|_| StoreError::Poisoned)?;
            if row.product.category_id == Some(id) {
                row.product.category_id = None;
            }
        }
        Ok(())
    }

    async fn apply_entry(&self, entry: LedgerEntry) -> Result<Recorded, StoreError> {
        let not_found = || StoreError::Ledger(LedgerError::ProductNotFound(entry.product_id));

        let row = self.row(entry.product_id)?.ok_or_else(not_found)?;
        let mut row = row.lock().map_err(|_| StoreError::Poisoned)?;
        if row.product.is_deleted() {
            return Err(not_found());
        }

        // Stamp, check and update under the same row lock.
        let entry = entry.stamped(row.balance.next_entry_time(Utc::now()));
        let next = project(&row.balance, &entry)?;
        row.entries.push(entry.clone());
        row.balance = next.clone();
        Ok(Recorded { entry, balance: next })
    }

    async fn list_entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = match filter.product_id {
            Some(id) => self.row(id)?.into_iter().collect(),
            None => self.all_rows()?,
        };

        let mut out = Vec::new();
        for row in rows {
            let row = row.lock().map_err(|_| StoreError::Poisoned)?;
            out.extend(row.entries.iter().filter(|e| filter.matches(e)).cloned());
        }

        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    async fn product_history(&self, id: ProductId) -> Result<Option<(StockBalance, Vec<LedgerEntry>)>, StoreError> {
        let Some(row) = self.row(id)? else {
            return Ok(None);
        };
        let row = row.lock().map_err(|_| StoreError::Poisoned)?;
        if row.product.is_deleted() {
            return Ok(None);
        }
        Ok(Some((row.balance.clone(), row.entries.clone())))
    }
}
