use chrono::{DateTime, Datelike, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use stockbook_auth::{Permission, Principal, authorize};
use stockbook_core::Money;
use stockbook_inventory::{EntryType, LedgerEntry};

use crate::error::ServiceError;
use crate::store::{EntryFilter, InventoryStore, ProductFilter, StockedProduct};

const RECENT_ENTRIES: usize = 10;
const TOP_PRODUCTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Active, non-deleted products.
    pub total_products: usize,
    pub total_categories: usize,
    pub low_stock_products: usize,
    /// Sum of `total_value` over active products.
    pub inventory_value: Money,
    /// Sale amounts since midnight UTC.
    pub today_sales: Money,
    /// Sale amounts since the first of the month UTC.
    pub monthly_sales: Money,
    pub recent_entries: Vec<LedgerEntry>,
    /// Active products with the least stock on hand, lowest first.
    pub top_products: Vec<StockedProduct>,
}

#[derive(Debug, Clone)]
pub struct Dashboard<S> {
    store: S,
}

impl<S> Dashboard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: InventoryStore> Dashboard<S> {
    #[instrument(skip(self, principal), fields(actor = %principal.user_id), err)]
    pub async fn stats(&self, principal: &Principal, now: DateTime<Utc>) -> Result<DashboardStats, ServiceError> {
        authorize(principal, Permission::DashboardRead)?;

        let products = self.store.list_products(&ProductFilter::default()).await?;
        let categories = self.store.list_categories().await?;

        let today = start_of_day(now);
        let month = now
            .date_naive()
            .with_day(1)
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
            .unwrap_or(today);

        let sales_since = |from: DateTime<Utc>| EntryFilter {
            entry_type: Some(EntryType::Sale),
            from: Some(from),
            ..Default::default()
        };
        let today_sales = self.store.sum_amount(&sales_since(today)).await?;
        let monthly_sales = self.store.sum_amount(&sales_since(month)).await?;

        let recent_entries = self
            .store
            .list_entries(&EntryFilter {
                limit: Some(RECENT_ENTRIES),
                ..Default::default()
            })
            .await?;

        Ok(DashboardStats {
            total_products: products.len(),
            total_categories: categories.len(),
            low_stock_products: products.iter().filter(|p| p.is_low()).count(),
            inventory_value: products.iter().map(|p| p.balance.total_value).sum(),
            today_sales,
            monthly_sales,
            recent_entries,
            top_products: least_stocked(products),
        })
    }
}

/// `products` arrives sorted by name, so the stable sort breaks ties by name.
fn least_stocked(mut products: Vec<StockedProduct>) -> Vec<StockedProduct> {
    products.sort_by_key(|p| p.balance.quantity);
    products.truncate(TOP_PRODUCTS);
    products
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}
