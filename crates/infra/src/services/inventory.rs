//! Inventory ledger: per-variant stock, changed only through conditional
//! appends to the owning product's stream.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::info;

use storefront_auth::{Principal, require_admin};
use storefront_catalog::{
    AddVariant, AdjustStock, Product, ProductCommand, ProductId, SetVariantStock, Variant,
    VariantKey,
};
use storefront_core::{DomainError, Resource};
use storefront_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, Committed};
use crate::errors::ServiceResult;
use crate::event_store::EventStore;
use crate::projections::{PRODUCT_AGGREGATE, ProductView, ReadModels};

pub(crate) fn empty_product(aggregate_id: storefront_core::AggregateId) -> Product {
    Product::empty(ProductId::new(aggregate_id))
}

/// Restoring stock only adds to it, so a conflicting writer can never make
/// it invalid. It is re-decided until it lands.
const RESTOCK_RETRIES: u32 = u32::MAX;

#[derive(Debug)]
pub struct InventoryLedger<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    read: Arc<ReadModels<S>>,
    conflict_retries: u32,
}

impl<S, B> InventoryLedger<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        read: Arc<ReadModels<S>>,
        conflict_retries: u32,
    ) -> Self {
        Self {
            dispatcher,
            read,
            conflict_retries,
        }
    }

    /// Current product state; `NotFound(product)` if it was never created or
    /// has been deleted.
    pub fn load_product(&self, product_id: ProductId) -> ServiceResult<Product> {
        let product = self.dispatcher.load(product_id.0, empty_product)?;
        if !product.exists() {
            return Err(DomainError::not_found(Resource::Product).into());
        }
        Ok(product)
    }

    /// Case-insensitive on size and color.
    pub fn find_variant(&self, product_id: ProductId, size: &str, color: &str) -> ServiceResult<Variant> {
        let key = VariantKey::new(size, color)?;
        let product = self.load_product(product_id)?;
        product
            .find_variant(&key)
            .cloned()
            .ok_or_else(|| DomainError::not_found(Resource::Variant).into())
    }

    /// Apply a signed stock change and return the new stock.
    ///
    /// The product decides against its current version and the append only
    /// lands if nobody wrote in between; otherwise the decision is re-run.
    /// Stock can therefore never go below zero.
    pub fn adjust_stock(
        &self,
        product_id: ProductId,
        size: &str,
        color: &str,
        delta: i64,
    ) -> ServiceResult<u32> {
        let key = VariantKey::new(size, color)?;
        self.adjust(product_id, &key, delta)
    }

    pub(crate) fn adjust(&self, product_id: ProductId, key: &VariantKey, delta: i64) -> ServiceResult<u32> {
        self.adjust_with(self.conflict_retries, product_id, key, delta)
    }

    /// Put back stock taken by an order that was cancelled or never placed.
    /// Concurrent writers only delay it; it fails only when the product or
    /// variant is gone or the store itself errors.
    pub(crate) fn restock(&self, product_id: ProductId, key: &VariantKey, quantity: u32) -> ServiceResult<u32> {
        self.adjust_with(RESTOCK_RETRIES, product_id, key, i64::from(quantity))
    }

    fn adjust_with(
        &self,
        retries: u32,
        product_id: ProductId,
        key: &VariantKey,
        delta: i64,
    ) -> ServiceResult<u32> {
        let cmd = ProductCommand::AdjustStock(AdjustStock {
            product_id,
            key: key.clone(),
            delta,
            occurred_at: Utc::now(),
        });
        let committed = self.dispatcher.dispatch_with_retry(
            retries,
            product_id.0,
            PRODUCT_AGGREGATE,
            &cmd,
            empty_product,
        )?;
        self.settle(product_id, &committed);

        let stock = committed
            .state
            .find_variant(key)
            .map(|v| v.stock)
            .ok_or_else(|| DomainError::not_found(Resource::Variant))?;
        info!(product_id = %product_id, variant = %key, delta, stock, "stock adjusted");
        Ok(stock)
    }

    /// Admin restock: set an absolute level.
    pub fn set_variant_stock(
        &self,
        principal: &Principal,
        product_id: ProductId,
        size: &str,
        color: &str,
        stock: u32,
    ) -> ServiceResult<Variant> {
        require_admin(principal)?;
        let key = VariantKey::new(size, color)?;
        let cmd = ProductCommand::SetVariantStock(SetVariantStock {
            product_id,
            key: key.clone(),
            stock,
            occurred_at: Utc::now(),
        });
        let committed = self.dispatcher.dispatch_with_retry(
            self.conflict_retries,
            product_id.0,
            PRODUCT_AGGREGATE,
            &cmd,
            empty_product,
        )?;
        self.settle(product_id, &committed);

        info!(product_id = %product_id, variant = %key, stock, "variant stock set");
        committed
            .state
            .find_variant(&key)
            .cloned()
            .ok_or_else(|| DomainError::not_found(Resource::Variant).into())
    }

    /// `Conflict` when the normalized key already exists on the product.
    pub fn add_variant(
        &self,
        principal: &Principal,
        product_id: ProductId,
        size: &str,
        color: &str,
        stock: u32,
    ) -> ServiceResult<ProductView> {
        require_admin(principal)?;
        let variant = Variant::new(VariantKey::new(size, color)?, stock);
        let cmd = ProductCommand::AddVariant(AddVariant {
            product_id,
            variant: variant.clone(),
            occurred_at: Utc::now(),
        });
        let committed = self.dispatcher.dispatch_with_retry(
            self.conflict_retries,
            product_id.0,
            PRODUCT_AGGREGATE,
            &cmd,
            empty_product,
        )?;
        self.settle(product_id, &committed);

        info!(product_id = %product_id, variant = %variant.key, stock, "variant added");
        ProductView::from_product(&committed.state)
            .ok_or_else(|| DomainError::not_found(Resource::Product).into())
    }

    fn settle(&self, product_id: ProductId, committed: &Committed<Product>) {
        self.read.settle(product_id.0, committed);
    }
}
