//! Ledger recorder: the write path for stock movements.
//!
//! Every operation runs the same pipeline:
//!
//! ```text
//! authorize(principal, permission)
//!   ↓
//! LedgerEntry::record (quantity/price checks, total_amount)
//!   ↓
//! store.apply_entry (atomic check + append + balance update)
//! ```
//!
//! Nothing is written unless the whole pipeline succeeds.

use chrono::Utc;
use tracing::instrument;

use stockbook_auth::{Permission, Principal, authorize};
use stockbook_inventory::{EntryType, LedgerEntry, LedgerError, StockDirection, StockRequest};

use crate::error::ServiceError;
use crate::store::{EntryFilter, InventoryStore, Recorded};

#[derive(Debug, Clone)]
pub struct LedgerRecorder<S> {
    store: S,
}

impl<S> LedgerRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: InventoryStore> LedgerRecorder<S> {
    pub async fn record_purchase(&self, principal: &Principal, request: StockRequest) -> Result<Recorded, ServiceError> {
        self.record(principal, Permission::StockRecord, EntryType::Purchase, StockDirection::In, request)
            .await
    }

    pub async fn record_sale(&self, principal: &Principal, request: StockRequest) -> Result<Recorded, ServiceError> {
        self.record(principal, Permission::StockRecord, EntryType::Sale, StockDirection::Out, request)
            .await
    }

    /// Customer return: stock comes back in.
    pub async fn record_return(&self, principal: &Principal, request: StockRequest) -> Result<Recorded, ServiceError> {
        self.record(principal, Permission::StockRecord, EntryType::Return, StockDirection::In, request)
            .await
    }

    /// Stock leaving for another location. Checked like a sale.
    pub async fn record_transfer(&self, principal: &Principal, request: StockRequest) -> Result<Recorded, ServiceError> {
        self.record(principal, Permission::StockRecord, EntryType::Transfer, StockDirection::Out, request)
            .await
    }

    /// Manual correction in either direction (stock counts, damage, found items).
    pub async fn record_adjustment(
        &self,
        principal: &Principal,
        direction: StockDirection,
        request: StockRequest,
    ) -> Result<Recorded, ServiceError> {
        self.record(principal, Permission::StockAdjust, EntryType::Adjustment, direction, request)
            .await
    }

    /// Ledger query, newest first.
    pub async fn list_entries(&self, principal: &Principal, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, ServiceError> {
        authorize(principal, Permission::StockRead)?;
        Ok(self.store.list_entries(filter).await?)
    }

    #[instrument(
        skip(self, principal, request),
        fields(
            actor = %principal.user_id,
            product_id = %request.product_id,
            entry_type = %entry_type,
            quantity = request.quantity
        ),
        err
    )]
    async fn record(
        &self,
        principal: &Principal,
        permission: Permission,
        entry_type: EntryType,
        direction: StockDirection,
        request: StockRequest,
    ) -> Result<Recorded, ServiceError> {
        authorize(principal, permission)?;

        let entry = LedgerEntry::record(entry_type, direction, principal.user_id, &request, Utc::now())?;

        let recorded = match self.store.apply_entry(entry).await {
            Ok(recorded) => recorded,
            Err(err) => {
                let err = ServiceError::from(err);
                if let ServiceError::Ledger(LedgerError::InsufficientStock { requested, available, .. }) = &err {
                    tracing::warn!(requested, available, "outbound movement refused");
                }
                return Err(err);
            }
        };

        tracing::info!(
            entry_id = %recorded.entry.id,
            total_amount = %recorded.entry.total_amount,
            quantity_after = recorded.balance.quantity,
            "ledger entry committed"
        );

        Ok(recorded)
    }
}
