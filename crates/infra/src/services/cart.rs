//! Cart builder and the checkout gate over it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

use storefront_auth::Principal;
use storefront_cart::{
    AddItem, Cart, CartCommand, CartId, CartItem, CheckoutSummary, ClearCart, PriceSnapshot,
    RemoveItem, UpdateQuantity, build_checkout_summary,
};
use storefront_catalog::{Product, ProductId, VariantKey};
use storefront_core::{AggregateId, DomainError, Money, Resource};
use storefront_events::{EventBus, EventEnvelope};

use super::inventory::InventoryLedger;
use crate::command_dispatcher::CommandDispatcher;
use crate::errors::{ServiceError, ServiceResult};
use crate::event_store::EventStore;

pub const CART_AGGREGATE: &str = "cart.cart";

fn empty_cart(aggregate_id: AggregateId) -> Cart {
    Cart::empty(CartId(aggregate_id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    /// Distinct lines.
    pub total_items: usize,
    /// Snapshot discount price times quantity, summed.
    pub total_amount: Money,
}

impl CartView {
    fn of(cart: &Cart) -> ServiceResult<Self> {
        Ok(Self {
            items: cart.items().to_vec(),
            total_items: cart.total_items(),
            total_amount: cart.total_amount()?,
        })
    }
}

/// One cart per user. Concurrent writes to the same cart are not retried:
/// the second writer gets `Conflict` and decides again.
pub struct CartService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    ledger: Arc<InventoryLedger<S, B>>,
}

impl<S, B> CartService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, ledger: Arc<InventoryLedger<S, B>>) -> Self {
        Self { dispatcher, ledger }
    }

    /// Add or merge. The live product supplies the price snapshot and the
    /// stock ceiling for the merged quantity.
    pub fn add_item(
        &self,
        principal: &Principal,
        product_id: ProductId,
        size: &str,
        color: &str,
        quantity: u32,
    ) -> ServiceResult<CartView> {
        if quantity < 1 {
            return Err(DomainError::validation("quantity must be at least 1").into());
        }
        let key = VariantKey::new(size, color)?;
        let product = self.ledger.load_product(product_id)?;
        if !product.is_purchasable() {
            return Err(DomainError::not_found(Resource::Product).into());
        }
        let variant = product
            .find_variant(&key)
            .ok_or(DomainError::not_found(Resource::Variant))?;

        let cart_id = CartId::for_user(principal.user_id);
        let cmd = CartCommand::AddItem(AddItem {
            cart_id,
            owner: principal.user_id,
            product_id,
            name: product.name().to_string(),
            key: key.clone(),
            quantity,
            live: PriceSnapshot {
                price: product.price(),
                discount_price: product.discount_price(),
                stock: variant.stock,
            },
            occurred_at: Utc::now(),
        });
        let view = self.write(cart_id, &cmd)?;

        info!(user_id = %principal.user_id, product_id = %product_id, variant = %key, quantity, "cart item added");
        Ok(view)
    }

    /// Checked against the line's snapshot stock; checkout re-checks live.
    pub fn update_quantity(
        &self,
        principal: &Principal,
        product_id: ProductId,
        size: &str,
        color: &str,
        quantity: u32,
    ) -> ServiceResult<CartView> {
        let key = VariantKey::new(size, color)?;
        let cart_id = CartId::for_user(principal.user_id);
        let cmd = CartCommand::UpdateQuantity(UpdateQuantity {
            cart_id,
            product_id,
            key,
            quantity,
            occurred_at: Utc::now(),
        });
        let view = self.write(cart_id, &cmd)?;

        info!(user_id = %principal.user_id, product_id = %product_id, quantity, "cart quantity updated");
        Ok(view)
    }

    /// Removing a line that is not there is a no-op.
    pub fn remove_item(
        &self,
        principal: &Principal,
        product_id: ProductId,
        size: &str,
        color: &str,
    ) -> ServiceResult<CartView> {
        let key = VariantKey::new(size, color)?;
        let cart_id = CartId::for_user(principal.user_id);
        let cmd = CartCommand::RemoveItem(RemoveItem {
            cart_id,
            product_id,
            key,
            occurred_at: Utc::now(),
        });
        self.write(cart_id, &cmd)
    }

    pub fn clear(&self, principal: &Principal) -> ServiceResult<CartView> {
        let cart_id = CartId::for_user(principal.user_id);
        let cmd = CartCommand::ClearCart(ClearCart {
            cart_id,
            occurred_at: Utc::now(),
        });
        let view = self.write(cart_id, &cmd)?;
        info!(user_id = %principal.user_id, "cart cleared");
        Ok(view)
    }

    /// A user who never added anything sees an empty cart.
    pub fn get_cart(&self, principal: &Principal) -> ServiceResult<CartView> {
        CartView::of(&self.load(principal)?)
    }

    /// Re-check every line against live stock. Never writes.
    pub fn build_checkout_summary(&self, principal: &Principal) -> ServiceResult<CheckoutSummary> {
        let cart = self.load(principal)?;

        let mut live: HashMap<ProductId, Product> = HashMap::new();
        for item in cart.items() {
            if live.contains_key(&item.product_id) {
                continue;
            }
            match self.ledger.load_product(item.product_id) {
                Ok(product) => {
                    live.insert(item.product_id, product);
                }
                // Reported as out of stock by the summary.
                Err(ServiceError::Domain(DomainError::NotFound(_))) => {}
                Err(other) => return Err(other),
            }
        }

        Ok(build_checkout_summary(&cart, |id| live.get(&id))?)
    }

    fn load(&self, principal: &Principal) -> ServiceResult<Cart> {
        let cart_id = CartId::for_user(principal.user_id);
        Ok(self.dispatcher.load(cart_id.0, empty_cart)?)
    }

    fn write(&self, cart_id: CartId, cmd: &CartCommand) -> ServiceResult<CartView> {
        let committed = self
            .dispatcher
            .dispatch(cart_id.0, CART_AGGREGATE, cmd, empty_cart)?;
        CartView::of(&committed.state)
    }
}
