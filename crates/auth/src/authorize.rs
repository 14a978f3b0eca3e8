use thiserror::Error;

use storefront_core::UserId;

use crate::Principal;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Admin-only operations (catalog edits, status changes, listing all orders).
pub fn require_admin(principal: &Principal) -> Result<(), AuthzError> {
    if principal.is_admin() {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(format!(
            "{} is not an admin",
            principal.user_id
        )))
    }
}

/// Reading a user's own record, or any record as admin.
pub fn require_owner_or_admin(principal: &Principal, owner: UserId) -> Result<(), AuthzError> {
    if principal.is_admin() || principal.user_id == owner {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(
            "record belongs to another user".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customers_are_not_admins() {
        let err = require_admin(&Principal::customer(UserId::new())).unwrap_err();
        match err {
            AuthzError::Forbidden(_) => {}
        }
        assert!(require_admin(&Principal::admin(UserId::new())).is_ok());
    }

    #[test]
    fn owner_or_admin_may_read() {
        let owner = UserId::new();
        assert!(require_owner_or_admin(&Principal::customer(owner), owner).is_ok());
        assert!(require_owner_or_admin(&Principal::admin(UserId::new()), owner).is_ok());
        assert!(require_owner_or_admin(&Principal::customer(UserId::new()), owner).is_err());
    }
}
