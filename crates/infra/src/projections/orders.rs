use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use storefront_core::UserId;
use storefront_events::EventEnvelope;
use storefront_orders::{
    CancelledBy, Order, OrderEvent, OrderId, OrderItem, OrderStatus, PaymentMethod, PaymentStatus,
    PriceBreakdown, ShippingAddress,
};

use super::ProjectionError;
use super::cursors::{Position, SequenceCursors};
use crate::read_model::KeyValueStore;

pub const ORDER_AGGREGATE: &str = "orders.order";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    #[serde(flatten)]
    pub breakdown: PriceBreakdown,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub order_status: OrderStatus,
    pub cancel_reason: Option<String>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub placed_at: DateTime<Utc>,
}

impl OrderView {
    /// `None` until the order has been placed.
    pub fn from_order(order: &Order) -> Option<Self> {
        let (Some(user_id), Some(address), Some(placed_at)) =
            (order.user_id(), order.shipping_address(), order.placed_at())
        else {
            return None;
        };
        Some(Self {
            order_id: order.id_typed(),
            user_id,
            items: order.items().to_vec(),
            shipping_address: address.clone(),
            breakdown: *order.breakdown(),
            payment_method: order.payment_method(),
            payment_status: order.payment_status(),
            payment_id: order.payment_id().map(str::to_string),
            order_status: order.status(),
            cancel_reason: order.cancel_reason().map(str::to_string),
            cancelled_by: order.cancelled_by(),
            cancelled_at: order.cancelled_at(),
            placed_at,
        })
    }
}

/// Order history per user and for the admin listing.
#[derive(Debug)]
pub struct OrdersProjection<S>
where
    S: KeyValueStore<OrderId, OrderView>,
{
    store: S,
    cursors: SequenceCursors,
}

impl<S> OrdersProjection<S>
where
    S: KeyValueStore<OrderId, OrderView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: SequenceCursors::new(),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderView> {
        self.store.get(order_id)
    }

    /// Newest first.
    pub fn list_for_user(&self, user_id: UserId) -> Vec<OrderView> {
        newest_first(
            self.store
                .list()
                .into_iter()
                .filter(|o| o.user_id == user_id)
                .collect(),
        )
    }

    /// Newest first.
    pub fn list_all(&self) -> Vec<OrderView> {
        newest_first(self.store.list())
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != ORDER_AGGREGATE {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        if self.cursors.position(aggregate_id, seq)? == Position::Duplicate {
            return Ok(());
        }

        let ev: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let order_id = match &ev {
            OrderEvent::OrderPlaced(e) => e.order_id,
            OrderEvent::StatusAdvanced(e) => e.order_id,
            OrderEvent::OrderCancelled(e) => e.order_id,
        };
        if order_id.0 != aggregate_id {
            return Err(ProjectionError::Mismatch(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            OrderEvent::OrderPlaced(e) => {
                self.store.upsert(
                    e.order_id,
                    OrderView {
                        order_id: e.order_id,
                        user_id: e.user_id,
                        items: e.items,
                        shipping_address: e.shipping_address,
                        breakdown: e.breakdown,
                        payment_method: e.payment_method,
                        payment_status: e.payment_status,
                        payment_id: e.payment_id,
                        order_status: OrderStatus::Placed,
                        cancel_reason: None,
                        cancelled_by: None,
                        cancelled_at: None,
                        placed_at: e.occurred_at,
                    },
                );
            }
            OrderEvent::StatusAdvanced(e) => {
                if let Some(mut view) = self.store.get(&order_id) {
                    view.order_status = e.to;
                    self.store.upsert(order_id, view);
                }
            }
            OrderEvent::OrderCancelled(e) => {
                if let Some(mut view) = self.store.get(&order_id) {
                    view.order_status = OrderStatus::Cancelled;
                    view.cancel_reason = e.reason;
                    view.cancelled_by = Some(e.cancelled_by);
                    view.cancelled_at = Some(e.occurred_at);
                    self.store.upsert(order_id, view);
                }
            }
        }

        self.cursors.advance(aggregate_id, seq);
        Ok(())
    }
}

fn newest_first(mut orders: Vec<OrderView>) -> Vec<OrderView> {
    orders.sort_by(|a, b| {
        b.placed_at
            .cmp(&a.placed_at)
            .then_with(|| b.order_id.0.as_uuid().cmp(a.order_id.0.as_uuid()))
    });
    orders
}
