use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Permission;

/// Role identifier used for RBAC.
///
/// Every user holds exactly one role. The role → permission mapping is fixed
/// in code (see [`Role::permissions`]). Serialized lowercase; parsed from
/// token claims case-insensitively.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Role {
    /// Full access.
    Admin,
    /// Catalog maintenance, stock adjustments and audits.
    Manager,
    /// Day-to-day purchases and sales; read-only catalog.
    Staff,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}' (expected admin, manager or staff)")]
pub struct UnknownRole(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Staff => "staff",
        }
    }

    /// Permissions granted by this role.
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;

        match self {
            Role::Admin => &Permission::ALL,
            Role::Manager => &[
                ProductsRead,
                ProductsWrite,
                CategoriesRead,
                CategoriesWrite,
                StockRead,
                StockRecord,
                StockAdjust,
                StockAudit,
                DashboardRead,
            ],
            Role::Staff => &[
                ProductsRead,
                CategoriesRead,
                StockRead,
                StockRecord,
                DashboardRead,
            ],
        }
    }

    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "staff" => Ok(Role::Staff),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
