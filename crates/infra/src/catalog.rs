//! Product and category maintenance.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use stockbook_auth::{Permission, Principal, authorize};
use stockbook_core::{CategoryId, ProductId};
use stockbook_inventory::{Category, LedgerEntry, NewCategory, NewProduct, Product, ProductUpdate, StockBalance};

use crate::error::ServiceError;
use crate::store::{InventoryStore, ProductFilter, StockedProduct};

/// Product detail: the product, its balance and its ledger, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub product: Product,
    pub balance: StockBalance,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone)]
pub struct Catalog<S> {
    store: S,
}

impl<S> Catalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: InventoryStore> Catalog<S> {
    #[instrument(skip(self, principal, input), fields(actor = %principal.user_id, sku = %input.sku), err)]
    pub async fn create_product(&self, principal: &Principal, input: NewProduct) -> Result<StockedProduct, ServiceError> {
        authorize(principal, Permission::ProductsWrite)?;
        self.ensure_category(input.category_id).await?;

        let now = Utc::now();
        let product = Product::create(input, now)?;
        let balance = StockBalance::opening(product.id, product.purchase_price, now);

        self.store.insert_product(product.clone(), balance.clone()).await?;
        tracing::info!(product_id = %product.id, "product created");

        Ok(StockedProduct { product, balance })
    }

    #[instrument(skip(self, principal, update), fields(actor = %principal.user_id, product_id = %id), err)]
    pub async fn update_product(
        &self,
        principal: &Principal,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<StockedProduct, ServiceError> {
        authorize(principal, Permission::ProductsWrite)?;
        self.ensure_category(update.category_id).await?;

        let current = self.store.get_product(id).await?.ok_or(ServiceError::NotFound)?;
        let updated = current.product.updated(update, Utc::now())?;

        Ok(self.store.update_product(updated).await?)
    }

    /// Soft delete. The ledger is kept; the product disappears from reads.
    #[instrument(skip(self, principal), fields(actor = %principal.user_id, product_id = %id), err)]
    pub async fn delete_product(&self, principal: &Principal, id: ProductId) -> Result<Product, ServiceError> {
        authorize(principal, Permission::ProductsWrite)?;
        let deleted = self.store.soft_delete_product(id, Utc::now()).await?;
        tracing::info!("product soft-deleted");
        Ok(deleted)
    }

    pub async fn get_product(&self, principal: &Principal, id: ProductId) -> Result<ProductDetail, ServiceError> {
        authorize(principal, Permission::ProductsRead)?;

        let product = self.store.get_product(id).await?.ok_or(ServiceError::NotFound)?.product;
        // Balance and entries come from one consistent read.
        let (balance, mut entries) = self
            .store
            .product_history(id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        entries.reverse();

        Ok(ProductDetail {
            product,
            balance,
            entries,
        })
    }

    pub async fn list_products(
        &self,
        principal: &Principal,
        filter: &ProductFilter,
    ) -> Result<Vec<StockedProduct>, ServiceError> {
        authorize(principal, Permission::ProductsRead)?;
        Ok(self.store.list_products(filter).await?)
    }

    /// Active products at or below their reorder level.
    pub async fn low_stock(&self, principal: &Principal) -> Result<Vec<StockedProduct>, ServiceError> {
        authorize(principal, Permission::ProductsRead)?;
        let products = self.store.list_products(&ProductFilter::default()).await?;
        Ok(products.into_iter().filter(StockedProduct::is_low).collect())
    }

    #[instrument(skip(self, principal, input), fields(actor = %principal.user_id), err)]
    pub async fn create_category(&self, principal: &Principal, input: NewCategory) -> Result<Category, ServiceError> {
        authorize(principal, Permission::CategoriesWrite)?;
        let category = Category::create(input, Utc::now())?;
        self.store.insert_category(category.clone()).await?;
        Ok(category)
    }

    pub async fn list_categories(&self, principal: &Principal) -> Result<Vec<Category>, ServiceError> {
        authorize(principal, Permission::CategoriesRead)?;
        Ok(self.store.list_categories().await?)
    }

    pub async fn get_category(&self, principal: &Principal, id: CategoryId) -> Result<Category, ServiceError> {
        authorize(principal, Permission::CategoriesRead)?;
        self.store.get_category(id).await?.ok_or(ServiceError::NotFound)
    }

    #[instrument(skip(self, principal, input), fields(actor = %principal.user_id, category_id = %id), err)]
    pub async fn update_category(
        &self,
        principal: &Principal,
        id: CategoryId,
        input: NewCategory,
    ) -> Result<Category, ServiceError> {
        authorize(principal, Permission::CategoriesWrite)?;
        let current = self.store.get_category(id).await?.ok_or(ServiceError::NotFound)?;
        let updated = current.updated(input)?;
        Ok(self.store.update_category(updated).await?)
    }

    /// Products in the category are kept and become uncategorised.
    #[instrument(skip(self, principal), fields(actor = %principal.user_id, category_id = %id), err)]
    pub async fn delete_category(&self, principal: &Principal, id: CategoryId) -> Result<(), ServiceError> {
        authorize(principal, Permission::CategoriesWrite)?;
        self.store.delete_category(id).await?;
        tracing::info!("category deleted");
        Ok(())
    }

    async fn ensure_category(&self, id: Option<CategoryId>) -> Result<(), ServiceError> {
        let Some(id) = id else {
            return Ok(());
        };
        match self.store.get_category(id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::Validation(format!("category {id} does not exist"))),
        }
    }
}
