use std::sync::{Mutex, MutexGuard};

use serde_json::Value as JsonValue;
use tracing::warn;

use storefront_catalog::{CollectionId, ProductId};
use storefront_core::AggregateId;
use storefront_events::{EventEnvelope, Subscription};
use storefront_orders::OrderId;

use super::{
    CollectionView, CollectionsProjection, OrderView, OrdersProjection, ProductCatalogProjection,
    ProductView, ProjectionError,
};
use crate::command_dispatcher::Committed;
use crate::event_store::EventStore;
use crate::read_model::InMemoryKeyValueStore;

pub type ProductCatalog = ProductCatalogProjection<InMemoryKeyValueStore<ProductId, ProductView>>;
pub type OrderHistory = OrdersProjection<InMemoryKeyValueStore<OrderId, OrderView>>;
pub type CollectionShelf = CollectionsProjection<InMemoryKeyValueStore<CollectionId, CollectionView>>;

/// The read side, fed from one bus subscription.
///
/// There is no background worker: every query calls [`catch_up`](Self::catch_up)
/// first, which drains whatever was published since the last query. A reader
/// therefore sees every write that completed before it started.
pub struct ReadModels<S> {
    store: S,
    subscription: Mutex<Subscription<EventEnvelope<JsonValue>>>,
    products: ProductCatalog,
    orders: OrderHistory,
    collections: CollectionShelf,
}

impl<S> ReadModels<S>
where
    S: EventStore,
{
    /// `subscription` must be taken before the first command is dispatched.
    pub fn new(store: S, subscription: Subscription<EventEnvelope<JsonValue>>) -> Self {
        Self {
            store,
            subscription: Mutex::new(subscription),
            products: ProductCatalogProjection::new(InMemoryKeyValueStore::new()),
            orders: OrdersProjection::new(InMemoryKeyValueStore::new()),
            collections: CollectionsProjection::new(InMemoryKeyValueStore::new()),
        }
    }

    pub fn products(&self) -> &ProductCatalog {
        self.catch_up();
        &self.products
    }

    pub fn orders(&self) -> &OrderHistory {
        self.catch_up();
        &self.orders
    }

    pub fn collections(&self) -> &CollectionShelf {
        self.catch_up();
        &self.collections
    }

    /// Apply everything queued on the subscription. Failures are logged and
    /// skipped; the next envelope for the same stream repairs them.
    pub fn catch_up(&self) {
        let Some(subscription) = self.lock_subscription() else {
            return;
        };
        self.drain(&subscription);
    }

    /// Rebuild one stream's views straight from the store.
    pub fn refresh(&self, aggregate_id: AggregateId) {
        let Some(subscription) = self.lock_subscription() else {
            return;
        };
        self.drain(&subscription);
        if let Err(err) = self.replay(aggregate_id) {
            warn!(aggregate_id = %aggregate_id, error = %err, "read model refresh failed");
        }
    }

    /// A write that reached the store but not the bus would otherwise stay
    /// invisible until the stream's next event.
    pub fn settle<A>(&self, aggregate_id: AggregateId, committed: &Committed<A>) {
        if !committed.is_published() {
            self.refresh(aggregate_id);
        }
    }

    // Held for the whole pass so envelopes are applied one at a time.
    fn lock_subscription(
        &self,
    ) -> Option<MutexGuard<'_, Subscription<EventEnvelope<JsonValue>>>> {
        match self.subscription.lock() {
            Ok(s) => Some(s),
            Err(_) => {
                warn!("read model subscription lock poisoned, serving stale data");
                None
            }
        }
    }

    fn drain(&self, subscription: &Subscription<EventEnvelope<JsonValue>>) {
        for envelope in subscription.drain() {
            if let Err(err) = self.apply(&envelope) {
                warn!(
                    aggregate_id = %envelope.aggregate_id(),
                    sequence_number = envelope.sequence_number(),
                    error = %err,
                    "read model update failed"
                );
            }
        }
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        match self.apply_once(envelope) {
            Err(ProjectionError::Gap(gap)) => self.replay(gap.aggregate_id),
            other => other,
        }
    }

    fn apply_once(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        self.products.apply_envelope(envelope)?;
        self.orders.apply_envelope(envelope)?;
        self.collections.apply_envelope(envelope)
    }

    /// Envelopes from concurrent writers can reach the bus out of order. The
    /// store has the full stream, so replay it; already-applied events are
    /// skipped by the cursors.
    fn replay(&self, aggregate_id: AggregateId) -> Result<(), ProjectionError> {
        let stream = self
            .store
            .load_stream(aggregate_id)
            .map_err(|e| ProjectionError::Mismatch(format!("replay failed: {e}")))?;
        for stored in &stream {
            self.apply_once(&stored.to_envelope())?;
        }
        Ok(())
    }
}

impl<S> core::fmt::Debug for ReadModels<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReadModels")
            .field("products", &self.products)
            .field("orders", &self.orders)
            .field("collections", &self.collections)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use storefront_catalog::{AdjustStock, CreateProduct, Product, ProductCommand, Variant, VariantKey};
    use storefront_events::{EventBus, InMemoryEventBus};

    use super::*;
    use crate::command_dispatcher::CommandDispatcher;
    use crate::event_store::InMemoryEventStore;
    use crate::projections::PRODUCT_AGGREGATE;

    fn key() -> VariantKey {
        VariantKey::new("s", "blue").unwrap()
    }

    #[test]
    fn missed_envelopes_are_replayed_from_the_store() {
        let store = Arc::new(InMemoryEventStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = CommandDispatcher::new(store.clone(), bus.clone());

        let id = ProductId::new(AggregateId::new());
        let make = |aid| Product::empty(ProductId::new(aid));
        dispatcher
            .dispatch(
                id.0,
                PRODUCT_AGGREGATE,
                &ProductCommand::CreateProduct(CreateProduct {
                    product_id: id,
                    name: "Denim Jacket".to_string(),
                    description: String::new(),
                    material: "denim".to_string(),
                    category: "jackets".to_string(),
                    price: 4_000,
                    discount_price: None,
                    is_featured: true,
                    variants: vec![Variant::new(key(), 3)],
                    images: vec![],
                    occurred_at: Utc::now(),
                }),
                make,
            )
            .unwrap();

        // Subscribed late: the create envelope is never delivered.
        let read = ReadModels::new(store.clone(), bus.subscribe());
        dispatcher
            .dispatch(
                id.0,
                PRODUCT_AGGREGATE,
                &ProductCommand::AdjustStock(AdjustStock {
                    product_id: id,
                    key: key(),
                    delta: -1,
                    occurred_at: Utc::now(),
                }),
                make,
            )
            .unwrap();

        let view = read.products().get(&id).unwrap();
        assert_eq!(view.variants[0].stock, 2);
        assert_eq!(view.details.slug, "denim-jacket");
    }

    #[test]
    fn refresh_pulls_an_unpublished_stream_from_the_store() {
        let store = Arc::new(InMemoryEventStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let read = ReadModels::new(store.clone(), bus.subscribe());
        // Writes through a bus the read side never hears from.
        let dispatcher = CommandDispatcher::new(store.clone(), Arc::new(InMemoryEventBus::new()));

        let id = ProductId::new(AggregateId::new());
        dispatcher
            .dispatch(
                id.0,
                PRODUCT_AGGREGATE,
                &ProductCommand::CreateProduct(CreateProduct {
                    product_id: id,
                    name: "Wool Scarf".to_string(),
                    description: String::new(),
                    material: "wool".to_string(),
                    category: "accessories".to_string(),
                    price: 1_200,
                    discount_price: None,
                    is_featured: false,
                    variants: vec![Variant::new(key(), 6)],
                    images: vec![],
                    occurred_at: Utc::now(),
                }),
                |aid| Product::empty(ProductId::new(aid)),
            )
            .unwrap();
        assert!(read.products().get(&id).is_none());

        read.refresh(id.0);

        assert_eq!(read.products().get(&id).unwrap().variants[0].stock, 6);
    }
}
