//! Infrastructure layer: event store, dispatch pipeline, read models,
//! application services, config and external collaborators.

pub mod command_dispatcher;
pub mod config;
pub mod errors;
pub mod event_store;
pub mod external;
pub mod projections;
pub mod read_model;
pub mod services;

pub use command_dispatcher::{CommandDispatcher, Committed, DispatchError};
pub use config::StorefrontConfig;
pub use errors::{ErrorEnvelope, ServiceError, ServiceResult};
pub use services::Storefront;
