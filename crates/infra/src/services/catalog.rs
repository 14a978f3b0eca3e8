//! Catalog administration and product queries.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

use storefront_auth::{Principal, require_admin};
use storefront_catalog::{
    AddImages, CreateProduct, DeleteProduct, ProductCommand, ProductId, ProductPatch, RemoveImage,
    UpdateProduct, Variant, VariantKey, slugify,
};
use storefront_core::{AggregateId, DomainError, Money, Resource};
use storefront_events::{EventBus, EventEnvelope};

use super::inventory::{InventoryLedger, empty_product};
use crate::command_dispatcher::CommandDispatcher;
use crate::errors::ServiceResult;
use crate::event_store::EventStore;
use crate::external::{ObjectStorage, discard_uploads};
use crate::projections::{PRODUCT_AGGREGATE, ProductView, ReadModels};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVariant {
    pub size: String,
    pub color: String,
    pub stock: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub material: String,
    pub category: String,
    pub price: Money,
    /// Defaults to `price`.
    pub discount_price: Option<Money>,
    pub is_featured: bool,
    pub variants: Vec<NewVariant>,
    /// Local files, uploaded before the product is recorded.
    pub image_paths: Vec<String>,
}

pub struct CatalogService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    ledger: Arc<InventoryLedger<S, B>>,
    read: Arc<ReadModels<S>>,
    storage: Arc<dyn ObjectStorage>,
    conflict_retries: u32,
}

impl<S, B> CatalogService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        ledger: Arc<InventoryLedger<S, B>>,
        read: Arc<ReadModels<S>>,
        storage: Arc<dyn ObjectStorage>,
        conflict_retries: u32,
    ) -> Self {
        Self {
            dispatcher,
            ledger,
            read,
            storage,
            conflict_retries,
        }
    }

    pub fn create_product(&self, principal: &Principal, input: NewProduct) -> ServiceResult<ProductView> {
        require_admin(principal)?;
        let product_id = ProductId::new(AggregateId::new());
        self.ensure_slug_free(&slugify(&input.name), product_id)?;

        let variants = input
            .variants
            .iter()
            .map(|v| Ok(Variant::new(VariantKey::new(&v.size, &v.color)?, v.stock)))
            .collect::<Result<Vec<_>, DomainError>>()?;
        let images = self.upload_all(&input.image_paths)?;

        let cmd = ProductCommand::CreateProduct(CreateProduct {
            product_id,
            name: input.name,
            description: input.description,
            material: input.material,
            category: input.category,
            price: input.price,
            discount_price: input.discount_price,
            is_featured: input.is_featured,
            variants,
            images: images.clone(),
            occurred_at: Utc::now(),
        });
        let committed = self
            .dispatcher
            .dispatch(product_id.0, PRODUCT_AGGREGATE, &cmd, empty_product)
            .inspect_err(|_| self.discard(&images))?;
        self.read.settle(product_id.0, &committed);

        info!(product_id = %product_id, slug = committed.state.slug(), "product created");
        view_of(&committed.state)
    }

    /// Allow-listed partial update. Renaming re-slugs.
    pub fn update_product(
        &self,
        principal: &Principal,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> ServiceResult<ProductView> {
        require_admin(principal)?;
        if let Some(name) = &patch.name {
            self.ensure_slug_free(&slugify(name), product_id)?;
        }

        let cmd = ProductCommand::UpdateProduct(UpdateProduct {
            product_id,
            patch,
            occurred_at: Utc::now(),
        });
        let committed = self.dispatcher.dispatch_with_retry(
            self.conflict_retries,
            product_id.0,
            PRODUCT_AGGREGATE,
            &cmd,
            empty_product,
        )?;
        self.read.settle(product_id.0, &committed);

        info!(product_id = %product_id, "product updated");
        view_of(&committed.state)
    }

    /// Uploads every file first; if any upload fails nothing is recorded.
    pub fn add_images(
        &self,
        principal: &Principal,
        product_id: ProductId,
        paths: &[String],
    ) -> ServiceResult<ProductView> {
        require_admin(principal)?;
        self.ledger.load_product(product_id)?;
        let urls = self.upload_all(paths)?;

        let cmd = ProductCommand::AddImages(AddImages {
            product_id,
            urls: urls.clone(),
            occurred_at: Utc::now(),
        });
        let committed = self
            .dispatcher
            .dispatch_with_retry(
                self.conflict_retries,
                product_id.0,
                PRODUCT_AGGREGATE,
                &cmd,
                empty_product,
            )
            .inspect_err(|_| self.discard(&urls))?;
        self.read.settle(product_id.0, &committed);

        info!(product_id = %product_id, count = paths.len(), "images added");
        view_of(&committed.state)
    }

    pub fn remove_image(
        &self,
        principal: &Principal,
        product_id: ProductId,
        url: &str,
    ) -> ServiceResult<ProductView> {
        require_admin(principal)?;
        let cmd = ProductCommand::RemoveImage(RemoveImage {
            product_id,
            url: url.to_string(),
            occurred_at: Utc::now(),
        });
        let committed = self.dispatcher.dispatch_with_retry(
            self.conflict_retries,
            product_id.0,
            PRODUCT_AGGREGATE,
            &cmd,
            empty_product,
        )?;
        self.read.settle(product_id.0, &committed);

        info!(product_id = %product_id, url, "image removed");
        view_of(&committed.state)
    }

    /// The product is `NotFound` for every later operation.
    pub fn delete_product(&self, principal: &Principal, product_id: ProductId) -> ServiceResult<()> {
        require_admin(principal)?;
        let cmd = ProductCommand::DeleteProduct(DeleteProduct {
            product_id,
            occurred_at: Utc::now(),
        });
        let committed = self.dispatcher.dispatch_with_retry(
            self.conflict_retries,
            product_id.0,
            PRODUCT_AGGREGATE,
            &cmd,
            empty_product,
        )?;
        self.read.settle(product_id.0, &committed);

        info!(product_id = %product_id, "product deleted");
        Ok(())
    }

    pub fn get_product(&self, product_id: ProductId) -> ServiceResult<ProductView> {
        view_of(&self.ledger.load_product(product_id)?)
    }

    pub fn list_active_products(&self) -> Vec<ProductView> {
        self.read.products().list_active()
    }

    pub fn list_by_category(&self, category: &str) -> Vec<ProductView> {
        self.read.products().list_by_category(category)
    }

    pub fn list_categories(&self) -> Vec<String> {
        self.read.products().categories()
    }

    fn ensure_slug_free(&self, slug: &str, owner: ProductId) -> ServiceResult<()> {
        match self.read.products().find_by_slug(slug) {
            Some(existing) if existing.product_id != owner => {
                Err(DomainError::conflict(format!("slug '{slug}' is already in use")).into())
            }
            _ => Ok(()),
        }
    }

    /// All or nothing: a failed upload removes the ones before it.
    fn upload_all(&self, paths: &[String]) -> ServiceResult<Vec<String>> {
        let mut urls = Vec::with_capacity(paths.len());
        for path in paths {
            match self.storage.upload(path) {
                Ok(url) => urls.push(url),
                Err(err) => {
                    self.discard(&urls);
                    return Err(err.into());
                }
            }
        }
        Ok(urls)
    }

    fn discard(&self, urls: &[String]) {
        discard_uploads(self.storage.as_ref(), urls);
    }
}

fn view_of(product: &storefront_catalog::Product) -> ServiceResult<ProductView> {
    ProductView::from_product(product).ok_or_else(|| DomainError::not_found(Resource::Product).into())
}
