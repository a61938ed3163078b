use thiserror::Error;

use stockbook_auth::AuthzError;
use stockbook_core::DomainError;
use stockbook_inventory::LedgerError;

use crate::store::StoreError;

/// What callers of the inventory services see.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The principal may not perform the operation.
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    /// Stock movement refused (not found, bad quantity/price, oversell).
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Catalog input failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    /// Uniqueness conflict (SKU or category name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage failed; the operation had no effect.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::NotFound => ServiceError::NotFound,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Ledger(err) => ServiceError::Ledger(err),
            StoreError::DuplicateSku(sku) => ServiceError::Conflict(format!("sku '{sku}' is already in use")),
            StoreError::DuplicateCategory(name) => {
                ServiceError::Conflict(format!("category '{name}' already exists"))
            }
            StoreError::UnknownCategory(id) => ServiceError::Validation(format!("category {id} does not exist")),
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::Database(msg) => ServiceError::Storage(msg),
            StoreError::Poisoned => ServiceError::Storage("lock poisoned".to_string()),
        }
    }
}
