use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockbook_core::{CategoryId, DomainError, DomainResult, Money, ProductId};

pub const DEFAULT_REORDER_LEVEL: i64 = 10;
pub const DEFAULT_UNIT: &str = "piece";
const MAX_NAME_LEN: usize = 255;

/// Catalog entry. The stock balance lives beside it, one-to-one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<CategoryId>,
    pub purchase_price: Money,
    pub selling_price: Money,
    pub reorder_level: i64,
    pub unit: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set on soft delete. Deleted products are invisible to reads and the ledger.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    pub purchase_price: Money,
    pub selling_price: Money,
    #[serde(default = "default_reorder_level")]
    pub reorder_level: i64,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_reorder_level() -> i64 {
    DEFAULT_REORDER_LEVEL
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

fn default_active() -> bool {
    true
}

/// Full replacement of a product's editable fields.
pub type ProductUpdate = NewProduct;

impl NewProduct {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, purchase_price: Money, selling_price: Money) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            description: None,
            category_id: None,
            purchase_price,
            selling_price,
            reorder_level: DEFAULT_REORDER_LEVEL,
            unit: default_unit(),
            is_active: true,
        }
    }

    /// Trim text fields and check ranges.
    pub fn normalized(self) -> DomainResult<Self> {
        let sku = self.sku.trim().to_string();
        let name = self.name.trim().to_string();
        let unit = self.unit.trim().to_string();

        if sku.is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::validation(format!(
                "name cannot exceed {MAX_NAME_LEN} characters"
            )));
        }
        if unit.is_empty() {
            return Err(DomainError::validation("unit cannot be empty"));
        }
        if self.purchase_price.is_negative() {
            return Err(DomainError::validation("purchase_price cannot be negative"));
        }
        if self.selling_price.is_negative() {
            return Err(DomainError::validation("selling_price cannot be negative"));
        }
        if self.reorder_level < 0 {
            return Err(DomainError::validation("reorder_level cannot be negative"));
        }

        Ok(Self {
            sku,
            name,
            unit,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            ..self
        })
    }
}

impl Product {
    pub fn create(input: NewProduct, at: DateTime<Utc>) -> DomainResult<Self> {
        let input = input.normalized()?;
        Ok(Self {
            id: ProductId::new(),
            sku: input.sku,
            name: input.name,
            description: input.description,
            category_id: input.category_id,
            purchase_price: input.purchase_price,
            selling_price: input.selling_price,
            reorder_level: input.reorder_level,
            unit: input.unit,
            is_active: input.is_active,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        })
    }

    /// Replace editable fields. Returns the updated copy; `self` is untouched.
    pub fn updated(&self, update: ProductUpdate, at: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_live()?;
        let update = update.normalized()?;
        Ok(Self {
            sku: update.sku,
            name: update.name,
            description: update.description,
            category_id: update.category_id,
            purchase_price: update.purchase_price,
            selling_price: update.selling_price,
            reorder_level: update.reorder_level,
            unit: update.unit,
            is_active: update.is_active,
            updated_at: at,
            ..self.clone()
        })
    }

    pub fn soft_deleted(&self, at: DateTime<Utc>) -> DomainResult<Self> {
        self.ensure_live()?;
        Ok(Self {
            deleted_at: Some(at),
            updated_at: at,
            ..self.clone()
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Case-insensitive substring match on name or SKU.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        needle.is_empty()
            || self.name.to_lowercase().contains(&needle)
            || self.sku.to_lowercase().contains(&needle)
    }

    fn ensure_live(&self) -> DomainResult<()> {
        if self.is_deleted() {
            return Err(DomainError::not_found());
        }
        Ok(())
    }
}
