use thiserror::Error;

use stockbook_core::ProductId;

/// Ledger error taxonomy.
///
/// Every variant is recoverable and reported to the caller. When one of these
/// is returned, nothing was written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("quantity must be greater than zero (got {0})")]
    InvalidQuantity(i64),

    #[error("unit price cannot be negative (got {0})")]
    InvalidUnitPrice(String),

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },

    #[error("entry for product {entry} cannot be applied to balance of product {balance}")]
    ProductMismatch { balance: ProductId, entry: ProductId },

    #[error("{0} direction does not match entry type {1}")]
    DirectionMismatch(&'static str, &'static str),

    #[error("amount overflow")]
    AmountOverflow,
}
