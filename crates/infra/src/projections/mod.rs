//! Read-model builders fed from committed events.
//!
//! Projections are rebuildable and idempotent: each keeps a per-stream cursor
//! and skips anything it has already applied, so at-least-once delivery is
//! safe. A gap means an envelope was missed or reordered; the caller repairs
//! it by replaying that stream from the event store.

pub mod collections;
pub mod cursors;
pub mod feed;
pub mod orders;
pub mod products;

use thiserror::Error;

pub use collections::{COLLECTION_AGGREGATE, CollectionView, CollectionsProjection};
pub use cursors::{SequenceCursors, SequenceGap};
pub use feed::ReadModels;
pub use orders::{ORDER_AGGREGATE, OrderView, OrdersProjection};
pub use products::{PRODUCT_AGGREGATE, ProductCatalogProjection, ProductView};

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Gap(#[from] SequenceGap),

    #[error("envelope mismatch: {0}")]
    Mismatch(String),
}
