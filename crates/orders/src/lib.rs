//! Order domain (event-sourced): placement snapshot, price breakdown, status
//! progression, per-actor cancellation rules and the saved-address book.
//!
//! Stock deduction and restoration around these events is orchestrated by the
//! infrastructure layer.

pub mod address;
pub mod address_book;
pub mod order;
pub mod pricing;
pub mod status;

pub use address::ShippingAddress;
pub use address_book::{
    AddAddress, AddressAdded, AddressBook, AddressBookCommand, AddressBookEvent, AddressBookId,
    AddressId, AddressPatch, AddressRemoved, AddressType, AddressUpdated, DefaultAddressSet,
    DeleteAddress, SavedAddress, SetDefaultAddress, UpdateAddress,
};
pub use order::{
    AdvanceStatus, CancelOrder, Order, OrderCancelled, OrderCommand, OrderEvent, OrderId,
    OrderItem, OrderPlaced, PlaceOrder, StatusAdvanced,
};
pub use pricing::PriceBreakdown;
pub use status::{Actor, CancelledBy, OrderStatus, PaymentMethod, PaymentStatus, cancellable_from};
