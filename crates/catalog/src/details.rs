//! Admin-editable product fields and the allow-listed patch over them.

use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, Money};

use crate::slug::slugify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Inactive,
}

/// The mutable face of a product.
///
/// `slug` is derived from `name` and never set directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub material: String,
    pub category: String,
    /// MRP.
    pub price: Money,
    /// Selling price, never above `price`.
    pub discount_price: Money,
    pub is_featured: bool,
    pub status: ProductStatus,
}

impl ProductDetails {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if self.slug.is_empty() {
            return Err(DomainError::validation("name must contain letters or digits"));
        }
        if self.material.trim().is_empty() {
            return Err(DomainError::validation("material cannot be empty"));
        }
        if self.category.trim().is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        if self.price == 0 {
            return Err(DomainError::validation("price must be positive"));
        }
        if self.discount_price > self.price {
            return Err(DomainError::validation(
                "discount price cannot exceed price",
            ));
        }
        Ok(())
    }
}

/// Partial update of a product. Only the fields listed here can change.
///
/// Identity, slug, variants, images and lifecycle flags are not reachable
/// through a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub material: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub discount_price: Option<Money>,
    pub is_featured: Option<bool>,
    pub status: Option<ProductStatus>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Field-by-field merge producing a new, validated record.
    pub fn merge(&self, current: &ProductDetails) -> DomainResult<ProductDetails> {
        let mut next = current.clone();

        if let Some(name) = &self.name {
            next.name = name.trim().to_string();
            next.slug = slugify(name);
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        if let Some(material) = &self.material {
            next.material = material.trim().to_string();
        }
        if let Some(category) = &self.category {
            next.category = category.trim().to_string();
        }
        if let Some(price) = self.price {
            next.price = price;
        }
        if let Some(discount_price) = self.discount_price {
            next.discount_price = discount_price;
        }
        if let Some(is_featured) = self.is_featured {
            next.is_featured = is_featured;
        }
        if let Some(status) = self.status {
            next.status = status;
        }

        next.validate()?;
        Ok(next)
    }
}
