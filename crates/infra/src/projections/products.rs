use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use storefront_catalog::{Product, ProductDetails, ProductEvent, ProductId, ProductStatus, Variant, VariantKey};
use storefront_events::EventEnvelope;

use super::ProjectionError;
use super::cursors::{Position, SequenceCursors};
use crate::read_model::KeyValueStore;

pub const PRODUCT_AGGREGATE: &str = "catalog.product";

/// Shopper-facing product record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductView {
    pub product_id: ProductId,
    #[serde(flatten)]
    pub details: ProductDetails,
    pub images: Vec<String>,
    pub variants: Vec<Variant>,
}

impl ProductView {
    /// `None` for a product that was never created or has been deleted.
    pub fn from_product(product: &Product) -> Option<Self> {
        if !product.exists() {
            return None;
        }
        Some(Self {
            product_id: product.id_typed(),
            details: product.details().clone(),
            images: product.images().to_vec(),
            variants: product.variants().to_vec(),
        })
    }

    fn set_stock(&mut self, key: &VariantKey, stock: u32) {
        if let Some(v) = self.variants.iter_mut().find(|v| &v.key == key) {
            v.stock = stock;
        }
    }
}

/// Catalog listing and slug lookup. Deleted products are dropped from the
/// store, which also frees their slug.
#[derive(Debug)]
pub struct ProductCatalogProjection<S>
where
    S: KeyValueStore<ProductId, ProductView>,
{
    store: S,
    cursors: SequenceCursors,
}

impl<S> ProductCatalogProjection<S>
where
    S: KeyValueStore<ProductId, ProductView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: SequenceCursors::new(),
        }
    }

    pub fn get(&self, product_id: &ProductId) -> Option<ProductView> {
        self.store.get(product_id)
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<ProductView> {
        self.store.list().into_iter().find(|p| p.details.slug == slug)
    }

    /// Active products, by name.
    pub fn list_active(&self) -> Vec<ProductView> {
        let mut products: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|p| p.details.status == ProductStatus::Active)
            .collect();
        products.sort_by(|a, b| {
            a.details
                .name
                .cmp(&b.details.name)
                .then_with(|| a.product_id.0.as_uuid().cmp(b.product_id.0.as_uuid()))
        });
        products
    }

    /// Active products in one category, matched case-insensitively.
    pub fn list_by_category(&self, category: &str) -> Vec<ProductView> {
        let wanted = category.trim().to_lowercase();
        self.list_active()
            .into_iter()
            .filter(|p| p.details.category.to_lowercase() == wanted)
            .collect()
    }

    /// Distinct categories that have at least one active product, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for product in self.list_active() {
            let category = product.details.category.to_lowercase();
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen.sort();
        seen
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != PRODUCT_AGGREGATE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if self.cursors.position(aggregate_id, seq)? == Position::Duplicate {
            return Ok(());
        }

        let ev: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let product_id = match &ev {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductUpdated(e) => e.product_id,
            ProductEvent::VariantAdded(e) => e.product_id,
            ProductEvent::VariantStockSet(e) => e.product_id,
            ProductEvent::StockAdjusted(e) => e.product_id,
            ProductEvent::ImagesAdded(e) => e.product_id,
            ProductEvent::ImageRemoved(e) => e.product_id,
            ProductEvent::ProductDeleted(e) => e.product_id,
        };
        if product_id.0 != aggregate_id {
            return Err(ProjectionError::Mismatch(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    e.product_id,
                    ProductView {
                        product_id: e.product_id,
                        details: e.details,
                        images: e.images,
                        variants: e.variants,
                    },
                );
            }
            ProductEvent::ProductDeleted(e) => {
                self.store.remove(&e.product_id);
            }
            other => {
                if let Some(mut view) = self.store.get(&product_id) {
                    match other {
                        ProductEvent::ProductUpdated(e) => view.details = e.details,
                        ProductEvent::VariantAdded(e) => view.variants.push(e.variant),
                        ProductEvent::VariantStockSet(e) => view.set_stock(&e.key, e.stock),
                        ProductEvent::StockAdjusted(e) => view.set_stock(&e.key, e.stock_after),
                        ProductEvent::ImagesAdded(e) => view.images.extend(e.urls),
                        ProductEvent::ImageRemoved(e) => view.images.retain(|url| url != &e.url),
                        ProductEvent::ProductCreated(_) | ProductEvent::ProductDeleted(_) => {}
                    }
                    self.store.upsert(product_id, view);
                }
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use storefront_catalog::{ProductCreated, ProductDeleted, StockAdjusted};
    use storefront_core::AggregateId;
    use uuid::Uuid;

    use super::*;
    use crate::read_model::InMemoryKeyValueStore;

    type Projection = ProductCatalogProjection<InMemoryKeyValueStore<ProductId, ProductView>>;

    fn key() -> VariantKey {
        VariantKey::new("m", "red").unwrap()
    }

    fn details(name: &str, status: ProductStatus) -> ProductDetails {
        ProductDetails {
            name: name.to_string(),
            slug: storefront_catalog::slugify(name),
            description: String::new(),
            material: "cotton".to_string(),
            category: "tees".to_string(),
            price: 1_000,
            discount_price: 800,
            is_featured: false,
            status,
        }
    }

    fn envelope(id: ProductId, seq: u64, ev: ProductEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            id.0,
            PRODUCT_AGGREGATE,
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn created(id: ProductId, name: &str, status: ProductStatus) -> EventEnvelope<JsonValue> {
        envelope(
            id,
            1,
            ProductEvent::ProductCreated(ProductCreated {
                product_id: id,
                details: details(name, status),
                variants: vec![Variant::new(key(), 5)],
                images: vec![],
                occurred_at: Utc::now(),
            }),
        )
    }

    fn adjusted(id: ProductId, seq: u64, stock_after: u32) -> EventEnvelope<JsonValue> {
        envelope(
            id,
            seq,
            ProductEvent::StockAdjusted(StockAdjusted {
                product_id: id,
                key: key(),
                delta: -1,
                stock_after,
                occurred_at: Utc::now(),
            }),
        )
    }

    #[test]
    fn duplicates_are_skipped() {
        let p = Projection::new(InMemoryKeyValueStore::new());
        let id = ProductId::new(AggregateId::new());

        p.apply_envelope(&created(id, "Tee", ProductStatus::Active)).unwrap();
        p.apply_envelope(&adjusted(id, 2, 4)).unwrap();
        p.apply_envelope(&adjusted(id, 2, 4)).unwrap();

        assert_eq!(p.get(&id).unwrap().variants[0].stock, 4);
    }

    #[test]
    fn gaps_are_reported() {
        let p = Projection::new(InMemoryKeyValueStore::new());
        let id = ProductId::new(AggregateId::new());

        p.apply_envelope(&created(id, "Tee", ProductStatus::Active)).unwrap();
        let err = p.apply_envelope(&adjusted(id, 3, 2)).unwrap_err();

        assert!(matches!(err, ProjectionError::Gap(_)));
    }

    #[test]
    fn listing_hides_inactive_and_deleted_products() {
        let p = Projection::new(InMemoryKeyValueStore::new());
        let a = ProductId::new(AggregateId::new());
        let b = ProductId::new(AggregateId::new());
        let c = ProductId::new(AggregateId::new());

        p.apply_envelope(&created(a, "Shirt", ProductStatus::Active)).unwrap();
        p.apply_envelope(&created(b, "Apron", ProductStatus::Inactive)).unwrap();
        p.apply_envelope(&created(c, "Cap", ProductStatus::Active)).unwrap();
        p.apply_envelope(&envelope(
            c,
            2,
            ProductEvent::ProductDeleted(ProductDeleted {
                product_id: c,
                occurred_at: Utc::now(),
            }),
        ))
        .unwrap();

        let names: Vec<_> = p.list_active().into_iter().map(|v| v.details.name).collect();
        assert_eq!(names, vec!["Shirt".to_string()]);
        assert!(p.find_by_slug("cap").is_none());
        assert!(p.find_by_slug("apron").is_some());
    }

    #[test]
    fn category_browsing_ignores_case_and_inactive_products() {
        let p = Projection::new(InMemoryKeyValueStore::new());
        let mut tee = details("Tee", ProductStatus::Active);
        tee.category = "Tops".to_string();
        let mut apron = details("Apron", ProductStatus::Inactive);
        apron.category = "aprons".to_string();
        let mut jeans = details("Jeans", ProductStatus::Active);
        jeans.category = "bottoms".to_string();

        for d in [tee, apron, jeans] {
            let id = ProductId::new(AggregateId::new());
            p.apply_envelope(&envelope(
                id,
                1,
                ProductEvent::ProductCreated(ProductCreated {
                    product_id: id,
                    details: d,
                    variants: vec![Variant::new(key(), 1)],
                    images: vec![],
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        }

        let tops: Vec<_> = p.list_by_category(" TOPS ").into_iter().map(|v| v.details.name).collect();
        assert_eq!(tops, vec!["Tee".to_string()]);
        assert_eq!(p.categories(), vec!["bottoms".to_string(), "tops".to_string()]);
        assert!(p.list_by_category("aprons").is_empty());
    }

    #[test]
    fn other_aggregates_are_ignored() {
        let p = Projection::new(InMemoryKeyValueStore::new());
        let env = EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::new(),
            "orders.order",
            1,
            JsonValue::Null,
        );
        p.apply_envelope(&env).unwrap();
        assert!(p.list_active().is_empty());
    }
}
