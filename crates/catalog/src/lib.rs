//! Catalog domain (event-sourced): products, their (size, color) variants,
//! the per-variant stock those variants carry, and merchandising collections.
//!
//! Deterministic domain logic only. Conditional persistence of stock changes
//! is the infrastructure layer's job.

pub mod collection;
pub mod details;
pub mod product;
pub mod slug;
pub mod variant;

pub use collection::{
    Collection, CollectionCommand, CollectionCreated, CollectionDeleted, CollectionDetails,
    CollectionEvent, CollectionId, CollectionPatch, CollectionUpdated, CreateCollection,
    DeleteCollection, UpdateCollection,
};
pub use details::{ProductDetails, ProductPatch, ProductStatus};
pub use product::{
    AddImages, AddVariant, AdjustStock, CreateProduct, DeleteProduct, ImageRemoved, ImagesAdded,
    Product, ProductCommand, ProductCreated, ProductDeleted, ProductEvent, ProductId,
    ProductUpdated, RemoveImage, SetVariantStock, StockAdjusted, UpdateProduct, VariantAdded,
    VariantStockSet,
};
pub use slug::slugify;
pub use variant::{Variant, VariantKey};
