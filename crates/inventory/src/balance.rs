use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{AggregateRoot, Money, ProductId};

use crate::LedgerError;

/// Current stock of one product, derived from its ledger.
///
/// Quantity only moves through [`crate::project`]. `version` increments once
/// per applied entry and once per revaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    pub product_id: ProductId,
    pub quantity: i64,
    pub reserved_quantity: i64,
    /// Purchase price used for valuation.
    pub unit_cost: Money,
    pub total_value: Money,
    pub last_restocked_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl StockBalance {
    /// The zero balance created alongside a product.
    pub fn opening(product_id: ProductId, unit_cost: Money, at: DateTime<Utc>) -> Self {
        Self {
            product_id,
            quantity: 0,
            reserved_quantity: 0,
            unit_cost,
            total_value: Money::ZERO,
            last_restocked_at: None,
            version: 0,
            updated_at: at,
        }
    }

    pub fn available(&self) -> i64 {
        self.quantity - self.reserved_quantity
    }

    pub fn is_low(&self, reorder_level: i64) -> bool {
        self.quantity <= reorder_level
    }

    /// Commit time for the next entry against this balance.
    ///
    /// Microsecond precision (what Postgres stores) and strictly after the last
    /// change, so entry timestamps follow commit order per product.
    pub fn next_entry_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = now.trunc_subsecs(6);
        if now > self.updated_at {
            now
        } else {
            self.updated_at.trunc_subsecs(6) + Duration::microseconds(1)
        }
    }

    /// Re-value at a new purchase price. Quantity is untouched.
    pub fn revalue(&self, unit_cost: Money, at: DateTime<Utc>) -> Result<Self, LedgerError> {
        let total_value = unit_cost
            .checked_mul(self.quantity)
            .ok_or(LedgerError::AmountOverflow)?;

        Ok(Self {
            unit_cost,
            total_value,
            version: self.version + 1,
            updated_at: at,
            ..self.clone()
        })
    }
}

impl AggregateRoot for StockBalance {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
