use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::{ProductId, VariantKey};
use storefront_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, Money, Resource, UserId,
};
use storefront_events::Event;

use crate::address::ShippingAddress;
use crate::pricing::PriceBreakdown;
use crate::status::{
    Actor, CancelledBy, OrderStatus, PaymentMethod, PaymentStatus, cancellable_from,
};

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A line as it was sold. Never recomputed from the live product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub price: Money,
    pub quantity: u32,
    pub size: String,
    pub color: String,
}

impl OrderItem {
    pub fn variant_key(&self) -> DomainResult<VariantKey> {
        VariantKey::new(&self.size, &self.color)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    user_id: Option<UserId>,
    items: Vec<OrderItem>,
    shipping_address: Option<ShippingAddress>,
    breakdown: PriceBreakdown,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    payment_id: Option<String>,
    status: OrderStatus,
    cancel_reason: Option<String>,
    cancelled_by: Option<CancelledBy>,
    cancelled_at: Option<DateTime<Utc>>,
    placed_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            user_id: None,
            items: Vec::new(),
            shipping_address: None,
            breakdown: PriceBreakdown {
                subtotal: 0,
                shipping_charge: 0,
                discount: 0,
                total_amount: 0,
            },
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            status: OrderStatus::Placed,
            cancel_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            placed_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn shipping_address(&self) -> Option<&ShippingAddress> {
        self.shipping_address.as_ref()
    }

    pub fn breakdown(&self) -> &PriceBreakdown {
        &self.breakdown
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn payment_id(&self) -> Option<&str> {
        self.payment_id.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn cancelled_by(&self) -> Option<CancelledBy> {
        self.cancelled_by
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Record a placed order. Stock has already been deducted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub shipping_charge: Money,
    pub discount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceStatus {
    pub order_id: OrderId,
    pub actor: Actor,
    pub status: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub actor: Actor,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    AdvanceStatus(AdvanceStatus),
    CancelOrder(CancelOrder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub breakdown: PriceBreakdown,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusAdvanced {
    pub order_id: OrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub cancelled_by: CancelledBy,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    StatusAdvanced(StatusAdvanced),
    OrderCancelled(OrderCancelled),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::StatusAdvanced(_) => "orders.order.status_advanced",
            OrderEvent::OrderCancelled(_) => "orders.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::StatusAdvanced(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.user_id = Some(e.user_id);
                self.items = e.items.clone();
                self.shipping_address = Some(e.shipping_address.clone());
                self.breakdown = e.breakdown;
                self.payment_method = e.payment_method;
                self.payment_status = e.payment_status;
                self.payment_id = e.payment_id.clone();
                self.status = OrderStatus::Placed;
                self.placed_at = Some(e.occurred_at);
                self.created = true;
            }
            OrderEvent::StatusAdvanced(e) => {
                self.status = e.to;
            }
            OrderEvent::OrderCancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.cancelled_by = Some(e.cancelled_by);
                self.cancel_reason = e.reason.clone();
                self.cancelled_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::AdvanceStatus(cmd) => self.handle_advance(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Order {
    fn ensure_exists(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(Resource::Order));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::EmptyOrder);
        }
        if cmd.items.iter().any(|i| i.quantity < 1) {
            return Err(DomainError::validation("quantity must be at least 1"));
        }
        cmd.shipping_address.validate()?;

        let breakdown = PriceBreakdown::compute(
            cmd.items.iter().map(|i| (i.price, i.quantity)),
            cmd.shipping_charge,
            cmd.discount,
        )?;

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            user_id: cmd.user_id,
            items: cmd.items.clone(),
            shipping_address: cmd.shipping_address.clone(),
            breakdown,
            payment_method: cmd.payment_method,
            payment_status: PaymentStatus::initial_for(cmd.payment_method),
            payment_id: cmd.payment_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_advance(&self, cmd: &AdvanceStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if cmd.actor != Actor::Admin {
            return Err(DomainError::forbidden("only admins can change order status"));
        }
        if cmd.status == OrderStatus::Cancelled {
            return Err(DomainError::validation(
                "use order cancellation to cancel an order",
            ));
        }
        if self.status.is_final() {
            return Err(DomainError::terminal_state(self.status.as_str()));
        }
        if !self.status.can_advance_to(cmd.status) {
            return Err(DomainError::validation(format!(
                "cannot move order from {} to {}",
                self.status, cmd.status
            )));
        }

        Ok(vec![OrderEvent::StatusAdvanced(StatusAdvanced {
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_exists(cmd.order_id)?;

        if let Actor::Customer(user_id) = cmd.actor {
            if !self.is_owned_by(user_id) {
                return Err(DomainError::forbidden("order belongs to another user"));
            }
        }
        if self.status == OrderStatus::Cancelled {
            return Err(DomainError::AlreadyCancelled);
        }

        let cancelled_by = cmd.actor.cancelled_by();
        if !cancellable_from(cancelled_by).contains(&self.status) {
            return Err(DomainError::terminal_state(self.status.as_str()));
        }

        let reason = cmd
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        if cancelled_by == CancelledBy::User && reason.is_none() {
            return Err(DomainError::validation("cancellation reason is required"));
        }

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
            order_id: cmd.order_id,
            cancelled_by,
            reason,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_events::execute;

    fn test_order_id() -> OrderId {
        OrderId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Asha".to_string(),
            phone: "9999999999".to_string(),
            address_line: "12 MG Road".to_string(),
            city: "Pune".to_string(),
            state: "MH".to_string(),
            pincode: "411001".to_string(),
            country: "India".to_string(),
        }
    }

    fn item(price: Money, quantity: u32) -> OrderItem {
        OrderItem {
            product_id: ProductId::new(AggregateId::new()),
            name: "Linen Shirt".to_string(),
            image: None,
            price,
            quantity,
            size: "m".to_string(),
            color: "red".to_string(),
        }
    }

    fn place_cmd(order_id: OrderId, user_id: UserId, items: Vec<OrderItem>) -> PlaceOrder {
        PlaceOrder {
            order_id,
            user_id,
            items,
            shipping_address: address(),
            payment_method: PaymentMethod::CashOnDelivery,
            payment_id: None,
            shipping_charge: 50,
            discount: 100,
            occurred_at: test_time(),
        }
    }

    fn placed_order(user_id: UserId) -> Order {
        let id = test_order_id();
        let mut order = Order::empty(id);
        let cmd = OrderCommand::PlaceOrder(place_cmd(id, user_id, vec![item(1_500, 2)]));
        execute(&mut order, &cmd).unwrap();
        order
    }

    fn advance(order: &mut Order, status: OrderStatus) {
        let cmd = OrderCommand::AdvanceStatus(AdvanceStatus {
            order_id: order.id_typed(),
            actor: Actor::Admin,
            status,
            occurred_at: test_time(),
        });
        execute(order, &cmd).unwrap();
    }

    fn cancel(order: &Order, actor: Actor, reason: Option<&str>) -> OrderCommand {
        OrderCommand::CancelOrder(CancelOrder {
            order_id: order.id_typed(),
            actor,
            reason: reason.map(str::to_string),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn place_order_computes_breakdown_and_payment_status() {
        let user = UserId::new();
        let order = placed_order(user);

        assert_eq!(order.status(), OrderStatus::Placed);
        assert_eq!(order.breakdown().subtotal, 3_000);
        assert_eq!(order.breakdown().total_amount, 2_950);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert!(order.is_owned_by(user));
    }

    #[test]
    fn online_orders_start_paid() {
        let id = test_order_id();
        let mut order = Order::empty(id);
        let cmd = OrderCommand::PlaceOrder(PlaceOrder {
            payment_method: PaymentMethod::Online,
            payment_id: Some("pay_123".to_string()),
            ..place_cmd(id, UserId::new(), vec![item(100, 1)])
        });
        execute(&mut order, &cmd).unwrap();
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(order.payment_id(), Some("pay_123"));
    }

    #[test]
    fn empty_order_is_rejected() {
        let id = test_order_id();
        let err = Order::empty(id)
            .handle(&OrderCommand::PlaceOrder(place_cmd(id, UserId::new(), Vec::new())))
            .unwrap_err();
        assert_eq!(err, DomainError::EmptyOrder);
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let id = test_order_id();
        let err = Order::empty(id)
            .handle(&OrderCommand::PlaceOrder(place_cmd(id, UserId::new(), vec![item(100, 0)])))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn status_moves_forward_only() {
        let mut order = placed_order(UserId::new());
        advance(&mut order, OrderStatus::Shipped);

        let back = OrderCommand::AdvanceStatus(AdvanceStatus {
            order_id: order.id_typed(),
            actor: Actor::Admin,
            status: OrderStatus::Confirmed,
            occurred_at: test_time(),
        });
        match order.handle(&back).unwrap_err() {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn customers_cannot_change_status() {
        let user = UserId::new();
        let order = placed_order(user);
        let cmd = OrderCommand::AdvanceStatus(AdvanceStatus {
            order_id: order.id_typed(),
            actor: Actor::Customer(user),
            status: OrderStatus::Confirmed,
            occurred_at: test_time(),
        });
        match order.handle(&cmd).unwrap_err() {
            DomainError::Forbidden(_) => {}
            _ => panic!("Expected Forbidden error"),
        }
    }

    #[test]
    fn delivered_order_is_locked() {
        let mut order = placed_order(UserId::new());
        advance(&mut order, OrderStatus::Delivered);
        let cmd = OrderCommand::AdvanceStatus(AdvanceStatus {
            order_id: order.id_typed(),
            actor: Actor::Admin,
            status: OrderStatus::Delivered,
            occurred_at: test_time(),
        });
        assert_eq!(
            order.handle(&cmd).unwrap_err(),
            DomainError::terminal_state("delivered")
        );
    }

    #[test]
    fn customer_cancel_records_metadata() {
        let user = UserId::new();
        let mut order = placed_order(user);
        let cmd = cancel(&order, Actor::Customer(user), Some("  changed my mind "));
        execute(&mut order, &cmd).unwrap();

        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.cancelled_by(), Some(CancelledBy::User));
        assert_eq!(order.cancel_reason(), Some("changed my mind"));
        assert!(order.cancelled_at().is_some());
    }

    #[test]
    fn customer_cancel_requires_reason() {
        let user = UserId::new();
        let order = placed_order(user);
        match order.handle(&cancel(&order, Actor::Customer(user), Some("  "))).unwrap_err() {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn admin_cancel_reason_is_optional() {
        let mut order = placed_order(UserId::new());
        advance(&mut order, OrderStatus::Confirmed);
        let cmd = cancel(&order, Actor::Admin, None);
        execute(&mut order, &cmd).unwrap();
        assert_eq!(order.cancelled_by(), Some(CancelledBy::Admin));
        assert_eq!(order.cancel_reason(), None);
    }

    #[test]
    fn cancelling_someone_elses_order_is_forbidden() {
        let order = placed_order(UserId::new());
        let err = order
            .handle(&cancel(&order, Actor::Customer(UserId::new()), Some("x")))
            .unwrap_err();
        match err {
            DomainError::Forbidden(_) => {}
            _ => panic!("Expected Forbidden error"),
        }
    }

    #[test]
    fn shipped_order_cannot_be_cancelled() {
        let user = UserId::new();
        let mut order = placed_order(user);
        advance(&mut order, OrderStatus::Shipped);

        for actor in [Actor::Customer(user), Actor::Admin] {
            assert_eq!(
                order.handle(&cancel(&order, actor, Some("late"))).unwrap_err(),
                DomainError::terminal_state("shipped")
            );
        }
    }

    #[test]
    fn second_cancel_is_already_cancelled() {
        let user = UserId::new();
        let mut order = placed_order(user);
        let cmd = cancel(&order, Actor::Admin, None);
        execute(&mut order, &cmd).unwrap();

        assert_eq!(
            order.handle(&cancel(&order, Actor::Customer(user), Some("again"))).unwrap_err(),
            DomainError::AlreadyCancelled
        );
    }

    #[test]
    fn unknown_order_is_not_found() {
        let order = Order::empty(test_order_id());
        assert_eq!(
            order.handle(&cancel(&order, Actor::Admin, None)).unwrap_err(),
            DomainError::not_found(Resource::Order)
        );
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let user = UserId::new();
        let order = placed_order(user);
        let before = order.clone();
        let _ = order.handle(&cancel(&order, Actor::Customer(user), Some("x")));
        assert_eq!(order, before);
    }
}
