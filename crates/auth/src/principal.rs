use serde::{Deserialize, Serialize};

use storefront_core::UserId;

use crate::Role;

/// An authenticated caller.
///
/// Customers come out of [`crate::IdentityVerifier`] plus the user directory.
/// Admins are provisioned out of band and built with [`Principal::admin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
