//! Order status machine, payment states and who may cancel from where.

use serde::{Deserialize, Serialize};

use storefront_core::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Position on the forward path `placed -> confirmed -> shipped -> delivered`.
    /// `Cancelled` is off the path.
    fn rank(self) -> Option<u8> {
        match self {
            OrderStatus::Placed => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Shipped => Some(2),
            OrderStatus::Delivered => Some(3),
            OrderStatus::Cancelled => None,
        }
    }

    /// True when `next` is strictly further along the forward path.
    pub fn can_advance_to(self, next: OrderStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }

    /// No further status changes of any kind.
    pub fn is_final(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "COD")]
    CashOnDelivery,
    #[serde(rename = "ONLINE")]
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    /// Cash on delivery is collected later; online payments arrive settled.
    pub fn initial_for(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::CashOnDelivery => PaymentStatus::Pending,
            PaymentMethod::Online => PaymentStatus::Paid,
        }
    }
}

/// Who is acting on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    Customer(UserId),
    Admin,
}

impl Actor {
    pub fn cancelled_by(self) -> CancelledBy {
        match self {
            Actor::Customer(_) => CancelledBy::User,
            Actor::Admin => CancelledBy::Admin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    User,
    Admin,
}

/// Statuses a customer may cancel from.
const CUSTOMER_CANCELLABLE: &[OrderStatus] = &[OrderStatus::Placed, OrderStatus::Confirmed];

/// Statuses an admin may cancel from: every state before shipping.
///
/// Currently identical to the customer table. Kept separate because the two
/// rules are owned by different people and are expected to diverge; whether
/// admins should be able to cancel shipped orders is an open product decision.
const ADMIN_CANCELLABLE: &[OrderStatus] = &[OrderStatus::Placed, OrderStatus::Confirmed];

pub fn cancellable_from(by: CancelledBy) -> &'static [OrderStatus] {
    match by {
        CancelledBy::User => CUSTOMER_CANCELLABLE,
        CancelledBy::Admin => ADMIN_CANCELLABLE,
    }
}
