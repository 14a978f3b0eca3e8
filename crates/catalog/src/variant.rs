//! Variants and the stock arithmetic of the inventory ledger.

use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, ValueObject};

/// `(size, color)` key of a variant, trimmed and lower-cased.
///
/// Two keys built from `"M", "Red"` and `" m ", "red"` are equal, which is what
/// makes variant lookup case-insensitive everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantKey {
    size: String,
    color: String,
}

impl VariantKey {
    pub fn new(size: &str, color: &str) -> DomainResult<Self> {
        let size = size.trim().to_lowercase();
        let color = color.trim().to_lowercase();
        if size.is_empty() || color.is_empty() {
            return Err(DomainError::validation("size and color are required"));
        }
        Ok(Self { size, color })
    }

    pub fn size(&self) -> &str {
        &self.size
    }

    pub fn color(&self) -> &str {
        &self.color
    }
}

impl ValueObject for VariantKey {}

impl core::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.size, self.color)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub key: VariantKey,
    pub stock: u32,
}

impl Variant {
    pub fn new(key: VariantKey, stock: u32) -> Self {
        Self { key, stock }
    }

    /// Stock after applying `delta`, or why it cannot be applied.
    ///
    /// A deduction larger than the current stock is `InsufficientStock` carrying
    /// the available count; stock never goes below zero.
    pub fn stock_after(&self, delta: i64) -> DomainResult<u32> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let next = i64::from(self.stock) + delta;
        if next < 0 {
            let requested = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
            return Err(DomainError::insufficient_stock(requested, self.stock));
        }

        u32::try_from(next).map_err(|_| DomainError::validation("stock exceeds the supported maximum"))
    }

    pub fn covers(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }
}
