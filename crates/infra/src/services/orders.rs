//! Order placement, status progression, cancellation and history.
//!
//! Placement deducts stock one line at a time through the inventory ledger.
//! Each deduction is a conditional append, so lines never oversell. If a later
//! line (or the order record itself) fails, every earlier deduction is
//! re-incremented in reverse order before the error is returned.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{error, info, warn};

use storefront_auth::{Principal, require_admin, require_owner_or_admin};
use storefront_catalog::{ProductId, VariantKey};
use storefront_core::{AggregateId, DomainError, Money, Resource, UserId};
use storefront_events::{EventBus, EventEnvelope};
use storefront_orders::{
    Actor, AdvanceStatus, CancelOrder, Order, OrderCommand, OrderId, OrderItem, OrderStatus,
    PaymentMethod, PlaceOrder, PriceBreakdown, ShippingAddress,
};

use super::cart::CartService;
use super::inventory::InventoryLedger;
use crate::command_dispatcher::CommandDispatcher;
use crate::config::StorefrontConfig;
use crate::errors::{ServiceError, ServiceResult};
use crate::event_store::EventStore;
use crate::projections::{ORDER_AGGREGATE, OrderView, ReadModels};

fn empty_order(aggregate_id: AggregateId) -> Order {
    Order::empty(OrderId::new(aggregate_id))
}

/// A line as requested by the buyer. Name, image and price come from the live
/// product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub size: String,
    pub color: String,
    pub quantity: u32,
}

/// Everything about an order except its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerms {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub shipping_charge: Money,
    pub discount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Deduction {
    product_id: ProductId,
    key: VariantKey,
    quantity: u32,
}

pub struct OrderService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    ledger: Arc<InventoryLedger<S, B>>,
    carts: Arc<CartService<S, B>>,
    read: Arc<ReadModels<S>>,
    config: StorefrontConfig,
}

impl<S, B> OrderService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        ledger: Arc<InventoryLedger<S, B>>,
        carts: Arc<CartService<S, B>>,
        read: Arc<ReadModels<S>>,
        config: StorefrontConfig,
    ) -> Self {
        Self {
            dispatcher,
            ledger,
            carts,
            read,
            config,
        }
    }

    /// Place an order for explicit lines, bypassing the cart.
    pub fn place_order(
        &self,
        principal: &Principal,
        lines: &[OrderLine],
        terms: OrderTerms,
    ) -> ServiceResult<OrderView> {
        if lines.is_empty() {
            return Err(DomainError::EmptyOrder.into());
        }
        if lines.iter().any(|l| l.quantity < 1) {
            return Err(DomainError::validation("quantity must be at least 1").into());
        }

        let items = lines
            .iter()
            .map(|line| self.resolve(line))
            .collect::<ServiceResult<Vec<_>>>()?;

        self.place_items(principal.user_id, items, terms)
    }

    /// Checkout the caller's cart: the summary re-checks live stock, the order
    /// is placed from its lines, then the cart is cleared.
    pub fn place_order_from_cart(
        &self,
        principal: &Principal,
        terms: OrderTerms,
    ) -> ServiceResult<OrderView> {
        let summary = self.carts.build_checkout_summary(principal)?;
        let items = summary
            .items
            .into_iter()
            .map(|line| OrderItem {
                product_id: line.product_id,
                name: line.name,
                image: line.image,
                price: line.price,
                quantity: line.quantity,
                size: line.size,
                color: line.color,
            })
            .collect();

        let order = self.place_items(principal.user_id, items, terms)?;

        if let Err(err) = self.carts.clear(principal) {
            warn!(order_id = %order.order_id, error = %err, "order placed but cart was not cleared");
        }
        Ok(order)
    }

    /// Customers need a reason; admins may omit it. Stock is restored per
    /// line; lines whose product or variant is gone are skipped.
    pub fn cancel_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
        reason: Option<String>,
    ) -> ServiceResult<OrderView> {
        let cmd = OrderCommand::CancelOrder(CancelOrder {
            order_id,
            actor: actor_for(principal),
            reason,
            occurred_at: Utc::now(),
        });
        let committed = self.dispatcher.dispatch_with_retry(
            self.config.conflict_retries,
            order_id.0,
            ORDER_AGGREGATE,
            &cmd,
            empty_order,
        )?;
        self.read.settle(order_id.0, &committed);
        let order = committed.state;

        for item in order.items() {
            self.restore(order_id, item);
        }

        info!(
            order_id = %order_id,
            cancelled_by = ?order.cancelled_by(),
            "order cancelled"
        );
        view_of(&order)
    }

    /// Admin only: forward along `placed -> confirmed -> shipped -> delivered`.
    pub fn advance_status(
        &self,
        principal: &Principal,
        order_id: OrderId,
        status: OrderStatus,
    ) -> ServiceResult<OrderView> {
        let cmd = OrderCommand::AdvanceStatus(AdvanceStatus {
            order_id,
            actor: actor_for(principal),
            status,
            occurred_at: Utc::now(),
        });
        let committed = self.dispatcher.dispatch_with_retry(
            self.config.conflict_retries,
            order_id.0,
            ORDER_AGGREGATE,
            &cmd,
            empty_order,
        )?;
        self.read.settle(order_id.0, &committed);

        info!(order_id = %order_id, status = %status, "order status advanced");
        view_of(&committed.state)
    }

    /// Owner or admin.
    pub fn get_order(&self, principal: &Principal, order_id: OrderId) -> ServiceResult<OrderView> {
        let order = self.dispatcher.load(order_id.0, empty_order)?;
        let view = view_of(&order)?;
        require_owner_or_admin(principal, view.user_id)?;
        Ok(view)
    }

    /// The caller's orders, newest first.
    pub fn list_my_orders(&self, principal: &Principal) -> Vec<OrderView> {
        self.read.orders().list_for_user(principal.user_id)
    }

    /// Admin only. Newest first.
    pub fn list_all_orders(&self, principal: &Principal) -> ServiceResult<Vec<OrderView>> {
        require_admin(principal)?;
        Ok(self.read.orders().list_all())
    }

    fn resolve(&self, line: &OrderLine) -> ServiceResult<OrderItem> {
        let key = VariantKey::new(&line.size, &line.color)?;
        let product = self.ledger.load_product(line.product_id)?;
        if !product.is_purchasable() {
            return Err(DomainError::not_found(Resource::Product).into());
        }
        let variant = product
            .find_variant(&key)
            .ok_or(DomainError::not_found(Resource::Variant))?;
        if !variant.covers(line.quantity) {
            return Err(DomainError::insufficient_stock(line.quantity, variant.stock).into());
        }

        Ok(OrderItem {
            product_id: line.product_id,
            name: product.name().to_string(),
            image: product.primary_image().map(str::to_string),
            price: product.discount_price(),
            quantity: line.quantity,
            size: key.size().to_string(),
            color: key.color().to_string(),
        })
    }

    fn place_items(
        &self,
        user_id: UserId,
        items: Vec<OrderItem>,
        terms: OrderTerms,
    ) -> ServiceResult<OrderView> {
        let order_id = OrderId::new(AggregateId::new());
        let shipping_address = terms
            .shipping_address
            .with_default_country(&self.config.default_country);
        shipping_address.validate()?;
        // Same arithmetic the order applies; checked before any stock moves.
        PriceBreakdown::compute(
            items.iter().map(|i| (i.price, i.quantity)),
            terms.shipping_charge,
            terms.discount,
        )?;

        let mut deducted: Vec<Deduction> = Vec::with_capacity(items.len());
        for item in &items {
            if let Err(err) = self.deduct(item, &mut deducted) {
                self.compensate(order_id, &deducted);
                return Err(err);
            }
        }

        let cmd = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            user_id,
            items,
            shipping_address,
            payment_method: terms.payment_method,
            payment_id: terms.payment_id,
            shipping_charge: terms.shipping_charge,
            discount: terms.discount,
            occurred_at: Utc::now(),
        });
        // Only a refused or failed append gets here; once appended the order
        // stands even if publication fails.
        let committed = match self
            .dispatcher
            .dispatch(order_id.0, ORDER_AGGREGATE, &cmd, empty_order)
        {
            Ok(c) => c,
            Err(err) => {
                self.compensate(order_id, &deducted);
                return Err(err.into());
            }
        };
        self.read.settle(order_id.0, &committed);

        let order = committed.state;
        info!(
            order_id = %order_id,
            user_id = %user_id,
            lines = order.items().len(),
            total_amount = order.breakdown().total_amount,
            "order placed"
        );
        view_of(&order)
    }

    fn deduct(&self, item: &OrderItem, deducted: &mut Vec<Deduction>) -> ServiceResult<()> {
        let key = item.variant_key()?;
        self.ledger
            .adjust(item.product_id, &key, -i64::from(item.quantity))?;
        deducted.push(Deduction {
            product_id: item.product_id,
            key,
            quantity: item.quantity,
        });
        Ok(())
    }

    /// Undo deductions newest first. Failures are logged; the caller's
    /// original error is what gets returned.
    fn compensate(&self, order_id: OrderId, deducted: &[Deduction]) {
        for d in deducted.iter().rev() {
            if let Err(err) = self.ledger.restock(d.product_id, &d.key, d.quantity) {
                error!(
                    order_id = %order_id,
                    product_id = %d.product_id,
                    variant = %d.key,
                    quantity = d.quantity,
                    error = %err,
                    "failed to restore stock after aborted order"
                );
            }
        }
    }

    fn restore(&self, order_id: OrderId, item: &OrderItem) {
        let result = item
            .variant_key()
            .map_err(ServiceError::from)
            .and_then(|key| self.ledger.restock(item.product_id, &key, item.quantity));

        match result {
            Ok(_) => {}
            Err(ServiceError::Domain(DomainError::NotFound(resource))) => {
                warn!(
                    order_id = %order_id,
                    product_id = %item.product_id,
                    size = %item.size,
                    color = %item.color,
                    missing = %resource,
                    "stock not restored on cancel"
                );
            }
            Err(err) => {
                error!(
                    order_id = %order_id,
                    product_id = %item.product_id,
                    quantity = item.quantity,
                    error = %err,
                    "failed to restore stock on cancel"
                );
            }
        }
    }
}

fn actor_for(principal: &Principal) -> Actor {
    if principal.is_admin() {
        Actor::Admin
    } else {
        Actor::Customer(principal.user_id)
    }
}

fn view_of(order: &Order) -> ServiceResult<OrderView> {
    OrderView::from_order(order).ok_or_else(|| DomainError::not_found(Resource::Order).into())
}
