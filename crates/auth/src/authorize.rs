use thiserror::Error;

use crate::{Permission, Principal, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("user account is deactivated")]
    InactiveUser,

    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    Forbidden { role: Role, permission: Permission },
}

/// Authorize a principal for one permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: Permission) -> Result<(), AuthzError> {
    if !principal.active {
        tracing::warn!(user_id = %principal.user_id, permission = %required, "inactive user refused");
        return Err(AuthzError::InactiveUser);
    }

    if principal.role.grants(required) {
        Ok(())
    } else {
        tracing::warn!(
            user_id = %principal.user_id,
            role = %principal.role,
            permission = %required,
            "authorization denied"
        );
        Err(AuthzError::Forbidden {
            role: principal.role,
            permission: required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staff_is_denied_adjustments_with_explanation() {
        let staff = Principal::staff();
        let err = authorize(&staff, Permission::StockAdjust).unwrap_err();
        assert_eq!(
            err,
            AuthzError::Forbidden {
                role: Role::Staff,
                permission: Permission::StockAdjust,
            }
        );
        assert_eq!(
            err.to_string(),
            "forbidden: role 'staff' lacks permission 'stock.adjust'"
        );
    }

    #[test]
    fn granted_permission_passes() {
        assert!(authorize(&Principal::staff(), Permission::StockRecord).is_ok());
        assert!(authorize(&Principal::manager(), Permission::StockAudit).is_ok());
    }

    #[test]
    fn inactive_admin_is_refused() {
        let admin = Principal::admin().deactivated();
        assert_eq!(
            authorize(&admin, Permission::ProductsRead),
            Err(AuthzError::InactiveUser)
        );
    }
}
