//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// The kind of record a lookup failed to find.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Resource {
    Product,
    Variant,
    Cart,
    CartItem,
    Order,
    User,
    Address,
    Collection,
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Resource::Product => "product",
            Resource::Variant => "variant",
            Resource::Cart => "cart",
            Resource::CartItem => "cart item",
            Resource::Order => "order",
            Resource::User => "user",
            Resource::Address => "address",
            Resource::Collection => "collection",
        };
        f.write_str(name)
    }
}

/// Domain-level error.
///
/// Deterministic business failures only. Storage and transport failures are
/// wrapped by the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing or malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("{0} not found")]
    NotFound(Resource),

    /// Duplicate variant key, duplicate slug, or a stale write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Requested quantity exceeds what the variant holds.
    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: u32, available: u32 },

    /// Checkout found a cart line whose live stock no longer covers it.
    #[error("{item} ({size}) is out of stock")]
    OutOfStock { item: String, size: String },

    #[error("order has no items")]
    EmptyOrder,

    /// Acting on someone else's record or outside the caller's role.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("order is already cancelled")]
    AlreadyCancelled,

    /// The order can no longer be changed from its current status.
    #[error("order is {0} and can no longer be changed")]
    TerminalState(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(resource: Resource) -> Self {
        Self::NotFound(resource)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn insufficient_stock(requested: u32, available: u32) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn out_of_stock(item: impl Into<String>, size: impl Into<String>) -> Self {
        Self::OutOfStock {
            item: item.into(),
            size: size.into(),
        }
    }

    pub fn terminal_state(status: impl Into<String>) -> Self {
        Self::TerminalState(status.into())
    }
}
