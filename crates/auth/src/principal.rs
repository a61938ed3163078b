use serde::{Deserialize, Serialize};

use stockbook_core::UserId;

use crate::Role;

/// An authenticated actor: who is acting, and under which role.
///
/// Construction is decoupled from storage and transport: the API derives it
/// from verified token claims, tests build it directly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    /// Deactivated users keep their identity but are refused every permission.
    pub active: bool,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            active: true,
        }
    }

    pub fn admin() -> Self {
        Self::new(UserId::new(), Role::Admin)
    }

    pub fn manager() -> Self {
        Self::new(UserId::new(), Role::Manager)
    }

    pub fn staff() -> Self {
        Self::new(UserId::new(), Role::Staff)
    }

    pub fn deactivated(self) -> Self {
        Self {
            active: false,
            ..self
        }
    }
}
