use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, EntryId, Money, ProductId, UserId};

use crate::LedgerError;

/// Kind of stock movement recorded in the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Purchase,
    Sale,
    Return,
    Adjustment,
    Transfer,
}

impl EntryType {
    pub const ALL: [EntryType; 5] = [
        EntryType::Purchase,
        EntryType::Sale,
        EntryType::Return,
        EntryType::Adjustment,
        EntryType::Transfer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Purchase => "purchase",
            EntryType::Sale => "sale",
            EntryType::Return => "return",
            EntryType::Adjustment => "adjustment",
            EntryType::Transfer => "transfer",
        }
    }

    /// Direction implied by the type; `None` for adjustments, which carry their own.
    pub fn fixed_direction(&self) -> Option<StockDirection> {
        match self {
            EntryType::Purchase | EntryType::Return => Some(StockDirection::In),
            EntryType::Sale | EntryType::Transfer => Some(StockDirection::Out),
            EntryType::Adjustment => None,
        }
    }
}

impl core::fmt::Display for EntryType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntryType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DomainError::validation(format!("unknown transaction type '{s}'")))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    In,
    Out,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::In => "in",
            StockDirection::Out => "out",
        }
    }
}

impl FromStr for StockDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" => Ok(StockDirection::In),
            "out" => Ok(StockDirection::Out),
            _ => Err(DomainError::validation(format!("unknown stock direction '{s}'"))),
        }
    }
}

/// Caller input for one stock movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reference_number: Option<String>,
}

impl StockRequest {
    pub fn new(product_id: ProductId, quantity: i64, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
            notes: None,
            reference_number: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_reference(mut self, reference_number: impl Into<String>) -> Self {
        self.reference_number = Some(reference_number.into());
        self
    }

    /// Shape checks that need no stored state.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.quantity <= 0 {
            return Err(LedgerError::InvalidQuantity(self.quantity));
        }
        if self.unit_price.is_negative() {
            return Err(LedgerError::InvalidUnitPrice(self.unit_price.to_string()));
        }
        Ok(())
    }
}

/// Immutable ledger record. Never updated or deleted once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub product_id: ProductId,
    pub entry_type: EntryType,
    pub direction: StockDirection,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_amount: Money,
    pub actor: UserId,
    pub notes: Option<String>,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build a validated entry from a request.
    ///
    /// Blank notes/reference strings are dropped.
    pub fn record(
        entry_type: EntryType,
        direction: StockDirection,
        actor: UserId,
        request: &StockRequest,
        at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        request.validate()?;

        if let Some(fixed) = entry_type.fixed_direction() {
            if fixed != direction {
                return Err(LedgerError::DirectionMismatch(
                    direction.as_str(),
                    entry_type.as_str(),
                ));
            }
        }

        let total_amount = request
            .unit_price
            .checked_mul(request.quantity)
            .ok_or(LedgerError::AmountOverflow)?;

        Ok(Self {
            id: EntryId::new(),
            product_id: request.product_id,
            entry_type,
            direction,
            quantity: request.quantity,
            unit_price: request.unit_price,
            total_amount,
            actor,
            notes: non_blank(request.notes.as_deref()),
            reference_number: non_blank(request.reference_number.as_deref()),
            created_at: at,
        })
    }

    /// Set the commit time. Stores call this while holding the balance lock.
    pub fn stamped(self, at: DateTime<Utc>) -> Self {
        Self { created_at: at, ..self }
    }

    /// Effect on stock quantity: positive for inbound, negative for outbound.
    pub fn signed_quantity(&self) -> i64 {
        match self.direction {
            StockDirection::In => self.quantity,
            StockDirection::Out => -self.quantity,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
