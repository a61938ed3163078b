use std::sync::Arc;

use stockbook_infra::{
    Catalog, Dashboard, InMemoryInventoryStore, InventoryStore, LedgerRecorder, PostgresInventoryStore,
    StockAuditor,
};

use crate::config::ApiConfig;

pub type SharedStore = Arc<dyn InventoryStore>;

/// Services shared by every handler, all over the same store.
pub struct AppServices {
    pub recorder: LedgerRecorder<SharedStore>,
    pub catalog: Catalog<SharedStore>,
    pub auditor: StockAuditor<SharedStore>,
    pub dashboard: Dashboard<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore) -> Self {
        Self {
            recorder: LedgerRecorder::new(store.clone()),
            catalog: Catalog::new(store.clone()),
            auditor: StockAuditor::new(store.clone()),
            dashboard: Dashboard::new(store),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryInventoryStore::new()))
    }
}

/// Postgres when `DATABASE_URL` is configured (migrations applied on connect),
/// otherwise an in-memory store.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
        return Ok(AppServices::in_memory());
    };

    let store = PostgresInventoryStore::connect(url).await?;
    tracing::info!("connected to postgres");
    Ok(AppServices::new(Arc::new(store)))
}
