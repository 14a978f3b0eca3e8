//! `storefront-core`: domain building blocks shared by the catalog, cart and
//! order aggregates.
//!
//! Pure domain primitives only (no IO, no storage).

pub mod aggregate;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult, Resource};
pub use id::{AggregateId, UserId};
pub use money::{Money, line_total};
pub use value_object::ValueObject;
