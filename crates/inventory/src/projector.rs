//! Balance projector.
//!
//! `project` is the single place where a ledger entry changes a balance. The
//! stores call it for live writes; `replay` and `reconcile` reuse it to audit
//! a stored balance against the ledger.

use serde::{Deserialize, Serialize};

use stockbook_core::ProductId;

use crate::{EntryType, LedgerEntry, LedgerError, StockBalance, StockDirection};

/// Apply one entry to a balance, returning the new balance.
pub fn project(balance: &StockBalance, entry: &LedgerEntry) -> Result<StockBalance, LedgerError> {
    if entry.product_id != balance.product_id {
        return Err(LedgerError::ProductMismatch {
            balance: balance.product_id,
            entry: entry.product_id,
        });
    }
    if entry.quantity <= 0 {
        return Err(LedgerError::InvalidQuantity(entry.quantity));
    }

    if entry.direction == StockDirection::Out && entry.quantity > balance.available() {
        return Err(LedgerError::InsufficientStock {
            product_id: balance.product_id,
            requested: entry.quantity,
            available: balance.available().max(0),
        });
    }

    let quantity = balance
        .quantity
        .checked_add(entry.signed_quantity())
        .ok_or(LedgerError::AmountOverflow)?;
    let total_value = balance
        .unit_cost
        .checked_mul(quantity)
        .ok_or(LedgerError::AmountOverflow)?;

    let last_restocked_at = if entry.entry_type == EntryType::Purchase {
        Some(entry.created_at)
    } else {
        balance.last_restocked_at
    };

    Ok(StockBalance {
        quantity,
        total_value,
        last_restocked_at,
        version: balance.version + 1,
        updated_at: entry.created_at,
        ..balance.clone()
    })
}

/// Net quantity effect of a sequence of entries.
pub fn net_quantity<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> i64 {
    entries
        .into_iter()
        .fold(0i64, |acc, e| acc.saturating_add(e.signed_quantity()))
}

/// Re-apply entries in order on top of an opening balance.
pub fn replay<'a>(
    opening: StockBalance,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> Result<StockBalance, LedgerError> {
    entries
        .into_iter()
        .try_fold(opening, |balance, entry| project(&balance, entry))
}

/// Result of comparing a stored balance with its ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub product_id: ProductId,
    pub stored_quantity: i64,
    pub ledger_quantity: i64,
    /// `stored_quantity - ledger_quantity`.
    pub drift: i64,
    /// Set when replaying the ledger in order is refused, e.g. a sale that
    /// took more than was on hand at the time.
    pub replay_error: Option<String>,
    pub consistent: bool,
}

pub fn reconcile<'a>(
    stored: &StockBalance,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> Reconciliation {
    let entries: Vec<&LedgerEntry> = entries
        .into_iter()
        .filter(|e| e.product_id == stored.product_id)
        .collect();
    let ledger_quantity = net_quantity(entries.iter().copied());
    let drift = stored.quantity.saturating_sub(ledger_quantity);

    let opened_at = entries.first().map_or(stored.updated_at, |e| e.created_at);
    let opening = StockBalance::opening(stored.product_id, stored.unit_cost, opened_at);
    let replay_error = replay(opening, entries.iter().copied())
        .err()
        .map(|e| e.to_string());

    Reconciliation {
        product_id: stored.product_id,
        stored_quantity: stored.quantity,
        ledger_quantity,
        drift,
        consistent: drift == 0 && replay_error.is_none(),
        replay_error,
    }
}
