//! Service-level errors and the uniform failure envelope.

use serde::Serialize;
use thiserror::Error;

use storefront_auth::{AuthzError, IdentityError};
use storefront_core::DomainError;

use crate::command_dispatcher::DispatchError;
use crate::external::StorageError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure failure from the dispatch pipeline. Domain refusals
    /// never land here; they are unwrapped into `Domain`.
    #[error(transparent)]
    Dispatch(DispatchError),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("image upload failed: {0}")]
    UploadFailed(String),

    #[error("image storage failed: {0}")]
    Storage(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Domain(e) => ServiceError::Domain(e),
            other => ServiceError::Dispatch(other),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Forbidden(msg) => ServiceError::Domain(DomainError::Forbidden(msg)),
        }
    }
}

impl From<IdentityError> for ServiceError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::Unauthenticated(msg) => ServiceError::Unauthenticated(msg),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::UploadFailed(msg) => ServiceError::UploadFailed(msg),
            StorageError::RemoveFailed(msg) => ServiceError::Storage(msg),
        }
    }
}

impl ServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Domain(e) => match e {
                DomainError::Validation(_)
                | DomainError::InvalidId(_)
                | DomainError::EmptyOrder
                | DomainError::InsufficientStock { .. }
                | DomainError::OutOfStock { .. }
                | DomainError::AlreadyCancelled
                | DomainError::TerminalState(_) => 400,
                DomainError::Forbidden(_) => 403,
                DomainError::NotFound(_) => 404,
                DomainError::Conflict(_) => 409,
                DomainError::InvariantViolation(_) => 500,
            },
            ServiceError::Dispatch(DispatchError::Concurrency(_)) => 409,
            ServiceError::Dispatch(_) => 500,
            ServiceError::Unauthenticated(_) => 401,
            ServiceError::UploadFailed(_) | ServiceError::Storage(_) => 502,
        }
    }

    /// Structured detail for clients that want more than the message.
    pub fn details(&self) -> Vec<String> {
        match self {
            ServiceError::Domain(DomainError::InsufficientStock {
                requested,
                available,
            }) => vec![
                format!("requested: {requested}"),
                format!("available: {available}"),
            ],
            ServiceError::Domain(DomainError::OutOfStock { item, size }) => {
                vec![format!("item: {item}"), format!("size: {size}")]
            }
            _ => Vec::new(),
        }
    }
}

/// `{success:false, message, statusCode, errors, data:null}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    pub status_code: u16,
    pub errors: Vec<String>,
    pub data: Option<()>,
}

impl From<&ServiceError> for ErrorEnvelope {
    fn from(err: &ServiceError) -> Self {
        let status_code = err.status_code();
        // Internal failures do not leak store details.
        let message = if status_code == 500 {
            "internal server error".to_string()
        } else {
            err.to_string()
        };
        Self {
            success: false,
            message,
            status_code,
            errors: err.details(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use storefront_core::Resource;

    use super::*;
    use crate::event_store::EventStoreError;

    fn envelope(err: impl Into<ServiceError>) -> ErrorEnvelope {
        ErrorEnvelope::from(&err.into())
    }

    #[test]
    fn insufficient_stock_carries_available_count() {
        let env = envelope(DomainError::insufficient_stock(3, 2));
        assert_eq!(env.status_code, 400);
        assert_eq!(env.errors, vec!["requested: 3", "available: 2"]);
        assert!(!env.success);
    }

    #[test]
    fn status_codes_follow_the_error_kind() {
        assert_eq!(envelope(DomainError::not_found(Resource::Order)).status_code, 404);
        assert_eq!(envelope(DomainError::forbidden("no")).status_code, 403);
        assert_eq!(envelope(DomainError::conflict("dup")).status_code, 409);
        assert_eq!(envelope(DomainError::terminal_state("shipped")).status_code, 400);
        assert_eq!(
            envelope(DispatchError::Concurrency("moved".to_string())).status_code,
            409
        );
        assert_eq!(
            envelope(IdentityError::Unauthenticated("bad token".to_string())).status_code,
            401
        );
        assert_eq!(
            envelope(StorageError::UploadFailed("a.jpg".to_string())).status_code,
            502
        );
        assert_eq!(
            envelope(AuthzError::Forbidden("not admin".to_string())).status_code,
            403
        );
    }

    #[test]
    fn domain_errors_inside_dispatch_are_unwrapped() {
        let err: ServiceError = DispatchError::Domain(DomainError::EmptyOrder).into();
        assert!(matches!(err, ServiceError::Domain(DomainError::EmptyOrder)));
    }

    #[test]
    fn internal_errors_hide_their_message() {
        let env = envelope(DispatchError::Store(EventStoreError::Unavailable(
            "lock poisoned".to_string(),
        )));
        assert_eq!(env.status_code, 500);
        assert_eq!(env.message, "internal server error");
    }

    #[test]
    fn serializes_with_camel_case_and_null_data() {
        let json = serde_json::to_value(envelope(DomainError::EmptyOrder)).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["statusCode"], 400);
        assert!(json["data"].is_null());
        assert!(json["errors"].as_array().unwrap().is_empty());
    }
}
