use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// The set is closed: every guarded operation names exactly one of these.
/// The string form (`"stock.record"`) is what appears in logs and error bodies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "products.read")]
    ProductsRead,
    #[serde(rename = "products.write")]
    ProductsWrite,
    #[serde(rename = "categories.read")]
    CategoriesRead,
    #[serde(rename = "categories.write")]
    CategoriesWrite,
    /// List ledger entries and balances.
    #[serde(rename = "stock.read")]
    StockRead,
    /// Purchases, sales, returns and transfers.
    #[serde(rename = "stock.record")]
    StockRecord,
    /// Manual stock adjustments.
    #[serde(rename = "stock.adjust")]
    StockAdjust,
    /// Ledger/balance reconciliation.
    #[serde(rename = "stock.audit")]
    StockAudit,
    #[serde(rename = "dashboard.read")]
    DashboardRead,
}

impl Permission {
    pub const ALL: [Permission; 9] = [
        Permission::ProductsRead,
        Permission::ProductsWrite,
        Permission::CategoriesRead,
        Permission::CategoriesWrite,
        Permission::StockRead,
        Permission::StockRecord,
        Permission::StockAdjust,
        Permission::StockAudit,
        Permission::DashboardRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ProductsRead => "products.read",
            Permission::ProductsWrite => "products.write",
            Permission::CategoriesRead => "categories.read",
            Permission::CategoriesWrite => "categories.write",
            Permission::StockRead => "stock.read",
            Permission::StockRecord => "stock.record",
            Permission::StockAdjust => "stock.adjust",
            Permission::StockAudit => "stock.audit",
            Permission::DashboardRead => "dashboard.read",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
