//! Cart domain (event-sourced) and the read-only checkout gate over it.
//!
//! A cart holds advisory price/stock snapshots. Only the checkout summary
//! compares them against live stock.

pub mod cart;
pub mod checkout;

pub use cart::{
    AddItem, Cart, CartCleared, CartCommand, CartEvent, CartId, CartItem, CartOpened, ClearCart,
    ItemAdded, ItemRemoved, PriceSnapshot, QuantityUpdated, RemoveItem, UpdateQuantity,
};
pub use checkout::{CheckoutLine, CheckoutSummary, build_checkout_summary};
