use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, Resource};
use storefront_events::Event;

use crate::details::{ProductDetails, ProductPatch, ProductStatus};
use crate::slug::slugify;
use crate::variant::{Variant, VariantKey};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Product aggregate. Owns its variants, so every stock change for a variant is
/// a write to this product's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    details: ProductDetails,
    images: Vec<String>,
    variants: Vec<Variant>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            details: ProductDetails {
                name: String::new(),
                slug: String::new(),
                description: String::new(),
                material: String::new(),
                category: String::new(),
                price: 0,
                discount_price: 0,
                is_featured: false,
                status: ProductStatus::Active,
            },
            images: Vec::new(),
            variants: Vec::new(),
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn details(&self) -> &ProductDetails {
        &self.details
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn slug(&self) -> &str {
        &self.details.slug
    }

    pub fn price(&self) -> Money {
        self.details.price
    }

    pub fn discount_price(&self) -> Money {
        self.details.discount_price
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn find_variant(&self, key: &VariantKey) -> Option<&Variant> {
        self.variants.iter().find(|v| &v.key == key)
    }

    /// Created and not deleted.
    pub fn exists(&self) -> bool {
        self.created && !self.deleted
    }

    /// Visible to shoppers.
    pub fn is_purchasable(&self) -> bool {
        self.exists() && self.details.status == ProductStatus::Active
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub material: String,
    pub category: String,
    pub price: Money,
    /// Defaults to `price` when absent.
    pub discount_price: Option<Money>,
    pub is_featured: bool,
    pub variants: Vec<Variant>,
    pub images: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProduct {
    pub product_id: ProductId,
    pub patch: ProductPatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddVariant {
    pub product_id: ProductId,
    pub variant: Variant,
    pub occurred_at: DateTime<Utc>,
}

/// Admin restock: overwrite the count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetVariantStock {
    pub product_id: ProductId,
    pub key: VariantKey,
    pub stock: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Relative stock change: negative on purchase, positive on cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub product_id: ProductId,
    pub key: VariantKey,
    pub delta: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddImages {
    pub product_id: ProductId,
    pub urls: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveImage {
    pub product_id: ProductId,
    pub url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProduct {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    UpdateProduct(UpdateProduct),
    AddVariant(AddVariant),
    SetVariantStock(SetVariantStock),
    AdjustStock(AdjustStock),
    AddImages(AddImages),
    RemoveImage(RemoveImage),
    DeleteProduct(DeleteProduct),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub variants: Vec<Variant>,
    pub images: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Carries the whole merged record, not the patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdated {
    pub product_id: ProductId,
    pub details: ProductDetails,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAdded {
    pub product_id: ProductId,
    pub variant: Variant,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantStockSet {
    pub product_id: ProductId,
    pub key: VariantKey,
    pub stock: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub product_id: ProductId,
    pub key: VariantKey,
    pub delta: i64,
    pub stock_after: u32,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagesAdded {
    pub product_id: ProductId,
    pub urls: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRemoved {
    pub product_id: ProductId,
    pub url: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeleted {
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductUpdated(ProductUpdated),
    VariantAdded(VariantAdded),
    VariantStockSet(VariantStockSet),
    StockAdjusted(StockAdjusted),
    ImagesAdded(ImagesAdded),
    ImageRemoved(ImageRemoved),
    ProductDeleted(ProductDeleted),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductUpdated(_) => "catalog.product.updated",
            ProductEvent::VariantAdded(_) => "catalog.product.variant_added",
            ProductEvent::VariantStockSet(_) => "catalog.product.variant_stock_set",
            ProductEvent::StockAdjusted(_) => "catalog.product.stock_adjusted",
            ProductEvent::ImagesAdded(_) => "catalog.product.images_added",
            ProductEvent::ImageRemoved(_) => "catalog.product.image_removed",
            ProductEvent::ProductDeleted(_) => "catalog.product.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductUpdated(e) => e.occurred_at,
            ProductEvent::VariantAdded(e) => e.occurred_at,
            ProductEvent::VariantStockSet(e) => e.occurred_at,
            ProductEvent::StockAdjusted(e) => e.occurred_at,
            ProductEvent::ImagesAdded(e) => e.occurred_at,
            ProductEvent::ImageRemoved(e) => e.occurred_at,
            ProductEvent::ProductDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.details = e.details.clone();
                self.variants = e.variants.clone();
                self.images = e.images.clone();
                self.created = true;
            }
            ProductEvent::ProductUpdated(e) => {
                self.details = e.details.clone();
            }
            ProductEvent::VariantAdded(e) => {
                self.variants.push(e.variant.clone());
            }
            ProductEvent::VariantStockSet(e) => {
                self.set_stock(&e.key, e.stock);
            }
            ProductEvent::StockAdjusted(e) => {
                self.set_stock(&e.key, e.stock_after);
            }
            ProductEvent::ImagesAdded(e) => {
                self.images.extend(e.urls.iter().cloned());
            }
            ProductEvent::ImageRemoved(e) => {
                self.images.retain(|url| url != &e.url);
            }
            ProductEvent::ProductDeleted(_) => {
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::UpdateProduct(cmd) => self.handle_update(cmd),
            ProductCommand::AddVariant(cmd) => self.handle_add_variant(cmd),
            ProductCommand::SetVariantStock(cmd) => self.handle_set_stock(cmd),
            ProductCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            ProductCommand::AddImages(cmd) => self.handle_add_images(cmd),
            ProductCommand::RemoveImage(cmd) => self.handle_remove_image(cmd),
            ProductCommand::DeleteProduct(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Product {
    fn set_stock(&mut self, key: &VariantKey, stock: u32) {
        if let Some(v) = self.variants.iter_mut().find(|v| &v.key == key) {
            v.stock = stock;
        }
    }

    fn ensure_exists(&self, product_id: ProductId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found(Resource::Product));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn variant_for(&self, key: &VariantKey) -> Result<&Variant, DomainError> {
        self.find_variant(key)
            .ok_or(DomainError::not_found(Resource::Variant))
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        let details = ProductDetails {
            name: cmd.name.trim().to_string(),
            slug: slugify(&cmd.name),
            description: cmd.description.clone(),
            material: cmd.material.trim().to_string(),
            category: cmd.category.trim().to_string(),
            price: cmd.price,
            discount_price: cmd.discount_price.unwrap_or(cmd.price),
            is_featured: cmd.is_featured,
            status: ProductStatus::Active,
        };
        details.validate()?;

        if cmd.variants.is_empty() {
            return Err(DomainError::validation("at least one variant is required"));
        }
        for (i, v) in cmd.variants.iter().enumerate() {
            if cmd.variants[..i].iter().any(|earlier| earlier.key == v.key) {
                return Err(DomainError::conflict(format!("duplicate variant {}", v.key)));
            }
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            product_id: cmd.product_id,
            details,
            variants: cmd.variants.clone(),
            images: cmd.images.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        if cmd.patch.is_empty() {
            return Err(DomainError::validation("no updatable fields supplied"));
        }

        let details = cmd.patch.merge(&self.details)?;

        Ok(vec![ProductEvent::ProductUpdated(ProductUpdated {
            product_id: cmd.product_id,
            details,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_variant(&self, cmd: &AddVariant) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        if self.find_variant(&cmd.variant.key).is_some() {
            return Err(DomainError::conflict(format!(
                "variant {} already exists",
                cmd.variant.key
            )));
        }

        Ok(vec![ProductEvent::VariantAdded(VariantAdded {
            product_id: cmd.product_id,
            variant: cmd.variant.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_stock(&self, cmd: &SetVariantStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        self.variant_for(&cmd.key)?;

        Ok(vec![ProductEvent::VariantStockSet(VariantStockSet {
            product_id: cmd.product_id,
            key: cmd.key.clone(),
            stock: cmd.stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;
        let stock_after = self.variant_for(&cmd.key)?.stock_after(cmd.delta)?;

        Ok(vec![ProductEvent::StockAdjusted(StockAdjusted {
            product_id: cmd.product_id,
            key: cmd.key.clone(),
            delta: cmd.delta,
            stock_after,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_images(&self, cmd: &AddImages) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        if cmd.urls.is_empty() {
            return Err(DomainError::validation("no images supplied"));
        }

        Ok(vec![ProductEvent::ImagesAdded(ImagesAdded {
            product_id: cmd.product_id,
            urls: cmd.urls.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_image(&self, cmd: &RemoveImage) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        if !self.images.iter().any(|url| url == &cmd.url) {
            return Err(DomainError::validation("image is not attached to this product"));
        }

        Ok(vec![ProductEvent::ImageRemoved(ImageRemoved {
            product_id: cmd.product_id,
            url: cmd.url.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_exists(cmd.product_id)?;

        Ok(vec![ProductEvent::ProductDeleted(ProductDeleted {
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_events::execute;

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn key(size: &str, color: &str) -> VariantKey {
        VariantKey::new(size, color).unwrap()
    }

    fn create_cmd(product_id: ProductId) -> CreateProduct {
        CreateProduct {
            product_id,
            name: "Linen Shirt".to_string(),
            description: "Breathable".to_string(),
            material: "linen".to_string(),
            category: "shirts".to_string(),
            price: 2_000,
            discount_price: Some(1_500),
            is_featured: false,
            variants: vec![Variant::new(key("m", "red"), 5), Variant::new(key("l", "red"), 1)],
            images: vec!["https://cdn.test/a.jpg".to_string()],
            occurred_at: test_time(),
        }
    }

    fn created_product() -> Product {
        let id = test_product_id();
        let mut product = Product::empty(id);
        execute(&mut product, &ProductCommand::CreateProduct(create_cmd(id))).unwrap();
        product
    }

    fn adjust(product_id: ProductId, size: &str, color: &str, delta: i64) -> ProductCommand {
        ProductCommand::AdjustStock(AdjustStock {
            product_id,
            key: key(size, color),
            delta,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn create_product_derives_slug_and_defaults() {
        let product = created_product();
        assert_eq!(product.slug(), "linen-shirt");
        assert_eq!(product.discount_price(), 1_500);
        assert_eq!(product.details().status, ProductStatus::Active);
        assert_eq!(product.version(), 1);
        assert!(product.is_purchasable());
    }

    #[test]
    fn create_product_defaults_discount_to_price() {
        let id = test_product_id();
        let mut cmd = create_cmd(id);
        cmd.discount_price = None;
        let mut product = Product::empty(id);
        execute(&mut product, &ProductCommand::CreateProduct(cmd)).unwrap();
        assert_eq!(product.discount_price(), 2_000);
    }

    #[test]
    fn create_product_rejects_duplicate_variant_keys() {
        let id = test_product_id();
        let mut cmd = create_cmd(id);
        cmd.variants.push(Variant::new(key("M", "Red"), 9));

        let err = Product::empty(id)
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error for duplicate variant"),
        }
    }

    #[test]
    fn create_product_requires_variants() {
        let id = test_product_id();
        let mut cmd = create_cmd(id);
        cmd.variants.clear();
        let err = Product::empty(id)
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn add_variant_conflicts_on_normalized_duplicate() {
        let product = created_product();
        let cmd = ProductCommand::AddVariant(AddVariant {
            product_id: product.id_typed(),
            variant: Variant::new(key(" M ", "RED"), 3),
            occurred_at: test_time(),
        });

        match product.handle(&cmd).unwrap_err() {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict error"),
        }
    }

    #[test]
    fn add_variant_appends_new_key() {
        let mut product = created_product();
        let cmd = ProductCommand::AddVariant(AddVariant {
            product_id: product.id_typed(),
            variant: Variant::new(key("s", "blue"), 4),
            occurred_at: test_time(),
        });
        execute(&mut product, &cmd).unwrap();
        assert_eq!(product.find_variant(&key("S", "Blue")).unwrap().stock, 4);
    }

    #[test]
    fn adjust_stock_deducts_and_restores() {
        let mut product = created_product();
        let pid = product.id_typed();
        execute(&mut product, &adjust(pid, "m", "red", -3)).unwrap();
        assert_eq!(product.find_variant(&key("m", "red")).unwrap().stock, 2);

        execute(&mut product, &adjust(pid, "M", "RED", 3)).unwrap();
        assert_eq!(product.find_variant(&key("m", "red")).unwrap().stock, 5);
    }

    #[test]
    fn adjust_stock_rejects_oversell_and_leaves_stock() {
        let mut product = created_product();
        let pid = product.id_typed();
        let err = execute(&mut product, &adjust(pid, "l", "red", -2)).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(2, 1));
        assert_eq!(product.find_variant(&key("l", "red")).unwrap().stock, 1);
        assert_eq!(product.version(), 1);
    }

    #[test]
    fn adjust_stock_on_missing_variant_is_not_found() {
        let product = created_product();
        let err = product.handle(&adjust(product.id_typed(), "xl", "red", -1)).unwrap_err();
        assert_eq!(err, DomainError::not_found(Resource::Variant));
    }

    #[test]
    fn set_variant_stock_overwrites() {
        let mut product = created_product();
        let cmd = ProductCommand::SetVariantStock(SetVariantStock {
            product_id: product.id_typed(),
            key: key("m", "red"),
            stock: 40,
            occurred_at: test_time(),
        });
        execute(&mut product, &cmd).unwrap();
        assert_eq!(product.find_variant(&key("m", "red")).unwrap().stock, 40);
    }

    #[test]
    fn update_product_merges_allow_listed_fields() {
        let mut product = created_product();
        let cmd = ProductCommand::UpdateProduct(UpdateProduct {
            product_id: product.id_typed(),
            patch: ProductPatch {
                name: Some("Linen Shirt Relaxed".to_string()),
                status: Some(ProductStatus::Inactive),
                ..ProductPatch::default()
            },
            occurred_at: test_time(),
        });
        execute(&mut product, &cmd).unwrap();

        assert_eq!(product.slug(), "linen-shirt-relaxed");
        assert!(!product.is_purchasable());
        assert!(product.exists());
        assert_eq!(product.variants().len(), 2);
    }

    #[test]
    fn images_can_be_added_and_removed() {
        let mut product = created_product();
        let pid = product.id_typed();
        execute(
            &mut product,
            &ProductCommand::AddImages(AddImages {
                product_id: pid,
                urls: vec!["https://cdn.test/b.jpg".to_string()],
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        execute(
            &mut product,
            &ProductCommand::RemoveImage(RemoveImage {
                product_id: pid,
                url: "https://cdn.test/a.jpg".to_string(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(product.primary_image(), Some("https://cdn.test/b.jpg"));
    }

    #[test]
    fn deleted_product_is_not_found_for_stock_changes() {
        let mut product = created_product();
        let pid = product.id_typed();
        execute(
            &mut product,
            &ProductCommand::DeleteProduct(DeleteProduct {
                product_id: pid,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = product.handle(&adjust(product.id_typed(), "m", "red", 1)).unwrap_err();
        assert_eq!(err, DomainError::not_found(Resource::Product));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let product = created_product();
        let before = product.clone();
        let _ = product.handle(&adjust(product.id_typed(), "m", "red", -1));
        assert_eq!(product, before);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 300,
                ..ProptestConfig::default()
            })]

            /// Rehydrating from the emitted events reproduces the live instance.
            #[test]
            fn apply_is_deterministic(deltas in prop::collection::vec(-4i64..4, 0..30)) {
                let id = test_product_id();
                let mut live = Product::empty(id);
                let mut log = execute(&mut live, &ProductCommand::CreateProduct(create_cmd(id))).unwrap();

                for delta in deltas {
                    let cmd = adjust(id, "m", "red", delta);
                    if let Ok(events) = execute(&mut live, &cmd) {
                        log.extend(events);
                    }
                }

                let mut replayed = Product::empty(id);
                for ev in &log {
                    replayed.apply(ev);
                }

                prop_assert_eq!(
                    replayed.find_variant(&key("m", "red")).map(|v| v.stock),
                    live.find_variant(&key("m", "red")).map(|v| v.stock)
                );
                prop_assert_eq!(replayed.version(), live.version());
            }
        }
    }
}
