use tracing::instrument;

use stockbook_auth::{Permission, Principal, authorize};
use stockbook_core::ProductId;
use stockbook_inventory::{Reconciliation, reconcile};

use crate::error::ServiceError;
use crate::store::{InventoryStore, ProductFilter};

/// Compares stored balances with the net effect of their ledgers.
#[derive(Debug, Clone)]
pub struct StockAuditor<S> {
    store: S,
}

impl<S> StockAuditor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: InventoryStore> StockAuditor<S> {
    #[instrument(skip(self, principal), fields(actor = %principal.user_id, product_id = %id), err)]
    pub async fn reconcile(&self, principal: &Principal, id: ProductId) -> Result<Reconciliation, ServiceError> {
        authorize(principal, Permission::StockAudit)?;
        self.reconcile_one(id).await
    }

    /// Every live product, inactive ones included.
    #[instrument(skip(self, principal), fields(actor = %principal.user_id), err)]
    pub async fn reconcile_all(&self, principal: &Principal) -> Result<Vec<Reconciliation>, ServiceError> {
        authorize(principal, Permission::StockAudit)?;

        let filter = ProductFilter {
            include_inactive: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        for stocked in self.store.list_products(&filter).await? {
            out.push(self.reconcile_one(stocked.product.id).await?);
        }
        Ok(out)
    }

    async fn reconcile_one(&self, id: ProductId) -> Result<Reconciliation, ServiceError> {
        let (balance, entries) = self
            .store
            .product_history(id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let result = reconcile(&balance, &entries);
        if !result.consistent {
            tracing::warn!(
                product_id = %id,
                stored = result.stored_quantity,
                ledger = result.ledger_quantity,
                drift = result.drift,
                replay_error = result.replay_error.as_deref(),
                "stock balance does not match its ledger"
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use stockbook_core::Money;
    use stockbook_inventory::{NewProduct, StockDirection, StockRequest};

    use crate::catalog::Catalog;
    use crate::recorder::LedgerRecorder;
    use crate::store::InMemoryInventoryStore;

    #[tokio::test]
    async fn recorded_history_always_reconciles() {
        let store = Arc::new(InMemoryInventoryStore::new());
        let admin = Principal::admin();
        let catalog = Catalog::new(store.clone());
        let recorder = LedgerRecorder::new(store.clone());

        let a = catalog
            .create_product(&admin, NewProduct::new("A", "Apples", Money::from_minor(50), Money::from_minor(90)))
            .await
            .unwrap();
        let b = catalog
            .create_product(&admin, NewProduct::new("B", "Bananas", Money::from_minor(20), Money::from_minor(35)))
            .await
            .unwrap();

        let a_id = a.product.id;
        recorder.record_purchase(&admin, StockRequest::new(a_id, 40, Money::from_minor(50))).await.unwrap();
        recorder.record_sale(&admin, StockRequest::new(a_id, 15, Money::from_minor(90))).await.unwrap();
        let _ = recorder.record_sale(&admin, StockRequest::new(a_id, 100, Money::from_minor(90))).await;
        recorder
            .record_adjustment(&admin, StockDirection::Out, StockRequest::new(a_id, 2, Money::ZERO))
            .await
            .unwrap();

        let report = StockAuditor::new(store.clone()).reconcile_all(&Principal::manager()).await.unwrap();
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|r| r.consistent && r.replay_error.is_none()));

        let a_report = report.iter().find(|r| r.product_id == a_id).unwrap();
        assert_eq!(a_report.ledger_quantity, 23);
        assert!(report.iter().any(|r| r.product_id == b.product.id && r.ledger_quantity == 0));
    }

    #[tokio::test]
    async fn staff_cannot_audit() {
        let store = Arc::new(InMemoryInventoryStore::new());
        let err = StockAuditor::new(store)
            .reconcile(&Principal::staff(), ProductId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let store = Arc::new(InMemoryInventoryStore::new());
        let err = StockAuditor::new(store)
            .reconcile(&Principal::admin(), ProductId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }
}
