//! Checkout gate: re-checks every cart line against live stock before an order
//! is placed. Pure and read-only.

use serde::{Deserialize, Serialize};

use storefront_catalog::{Product, ProductId};
use storefront_core::{DomainError, DomainResult, Money, line_total};

use crate::cart::Cart;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub size: String,
    pub color: String,
    pub quantity: u32,
    /// Snapshot discount price.
    pub price: Money,
    pub live_stock: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSummary {
    pub items: Vec<CheckoutLine>,
    pub total_amount: Money,
}

/// Build the summary or fail on the first line that live stock cannot cover.
///
/// `live` resolves a product id to its current state. A product that is gone,
/// inactive, or lacks the variant counts as out of stock, as does one whose
/// variant stock is below the line quantity.
pub fn build_checkout_summary<'a, F>(cart: &Cart, live: F) -> DomainResult<CheckoutSummary>
where
    F: Fn(ProductId) -> Option<&'a Product>,
{
    if cart.is_empty() {
        return Err(DomainError::validation("cart is empty"));
    }

    let mut items = Vec::with_capacity(cart.items().len());
    let mut total_amount: Money = 0;

    for item in cart.items() {
        let product = live(item.product_id).filter(|p| p.is_purchasable());
        let name = product.map_or(item.name.as_str(), |p| p.name());

        let live_stock = match product.and_then(|p| p.find_variant(&item.key)) {
            Some(variant) if variant.covers(item.quantity) => variant.stock,
            _ => return Err(DomainError::out_of_stock(name, item.key.size())),
        };

        let price = item.snapshot.discount_price;
        total_amount = total_amount
            .checked_add(line_total(price, item.quantity)?)
            .ok_or_else(|| DomainError::validation("checkout total overflows"))?;

        items.push(CheckoutLine {
            product_id: item.product_id,
            name: name.to_string(),
            image: product.and_then(|p| p.primary_image()).map(str::to_string),
            size: item.key.size().to_string(),
            color: item.key.color().to_string(),
            quantity: item.quantity,
            price,
            live_stock,
        });
    }

    Ok(CheckoutSummary {
        items,
        total_amount,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use storefront_catalog::{AdjustStock, CreateProduct, ProductCommand, Variant, VariantKey};
    use storefront_core::{AggregateId, AggregateRoot, UserId};
    use storefront_events::execute;

    use super::*;
    use crate::cart::{AddItem, CartCommand, CartId, PriceSnapshot};

    fn key() -> VariantKey {
        VariantKey::new("m", "red").unwrap()
    }

    fn product_with_stock(stock: u32) -> Product {
        let id = ProductId::new(AggregateId::new());
        let mut product = Product::empty(id);
        let cmd = ProductCommand::CreateProduct(CreateProduct {
            product_id: id,
            name: "Linen Shirt".to_string(),
            description: String::new(),
            material: "linen".to_string(),
            category: "shirts".to_string(),
            price: 2_000,
            discount_price: Some(1_500),
            is_featured: false,
            variants: vec![Variant::new(key(), stock)],
            images: vec!["https://cdn.test/a.jpg".to_string()],
            occurred_at: Utc::now(),
        });
        execute(&mut product, &cmd).unwrap();
        product
    }

    fn cart_with(product: &Product, quantity: u32) -> Cart {
        let user = UserId::new();
        let mut cart = Cart::empty(CartId::for_user(user));
        let variant = product.find_variant(&key()).unwrap();
        let cmd = CartCommand::AddItem(AddItem {
            cart_id: CartId::for_user(user),
            owner: user,
            product_id: product.id_typed(),
            name: product.name().to_string(),
            key: key(),
            quantity,
            live: PriceSnapshot {
                price: product.price(),
                discount_price: product.discount_price(),
                stock: variant.stock,
            },
            occurred_at: Utc::now(),
        });
        execute(&mut cart, &cmd).unwrap();
        cart
    }

    fn catalog(products: &[&Product]) -> HashMap<ProductId, Product> {
        products
            .iter()
            .map(|p| (p.id_typed(), (*p).clone()))
            .collect()
    }

    #[test]
    fn summary_merges_snapshot_and_live_stock() {
        let product = product_with_stock(5);
        let cart = cart_with(&product, 3);
        let live = catalog(&[&product]);

        let summary = build_checkout_summary(&cart, |id| live.get(&id)).unwrap();

        assert_eq!(summary.total_amount, 4_500);
        assert_eq!(summary.items[0].live_stock, 5);
        assert_eq!(summary.items[0].image.as_deref(), Some("https://cdn.test/a.jpg"));
    }

    #[test]
    fn live_stock_drop_fails_with_out_of_stock() {
        let mut product = product_with_stock(5);
        let cart = cart_with(&product, 3);

        let sold = ProductCommand::AdjustStock(AdjustStock {
            product_id: *product.id(),
            key: key(),
            delta: -3,
            occurred_at: Utc::now(),
        });
        execute(&mut product, &sold).unwrap();
        let live = catalog(&[&product]);
        let before = cart.clone();

        let err = build_checkout_summary(&cart, |id| live.get(&id)).unwrap_err();

        assert_eq!(err, DomainError::out_of_stock("Linen Shirt", "m"));
        assert_eq!(cart, before);
    }

    #[test]
    fn missing_product_is_out_of_stock() {
        let product = product_with_stock(5);
        let cart = cart_with(&product, 1);

        let err = build_checkout_summary(&cart, |_| None).unwrap_err();
        assert_eq!(err, DomainError::out_of_stock("Linen Shirt", "m"));
    }

    #[test]
    fn empty_cart_is_rejected() {
        let cart = Cart::empty(CartId::for_user(UserId::new()));
        match build_checkout_summary(&cart, |_| None).unwrap_err() {
            DomainError::Validation(msg) => assert_eq!(msg, "cart is empty"),
            _ => panic!("Expected Validation error"),
        }
    }
}
