//! Saved delivery addresses, one book per user.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::info;

use storefront_auth::Principal;
use storefront_core::{AggregateId, DomainError, Resource};
use storefront_events::{EventBus, EventEnvelope};
use storefront_orders::{
    AddAddress, AddressBook, AddressBookCommand, AddressBookId, AddressId, AddressPatch, AddressType,
    DeleteAddress, SavedAddress, SetDefaultAddress, ShippingAddress, UpdateAddress,
};

use crate::command_dispatcher::CommandDispatcher;
use crate::errors::ServiceResult;
use crate::event_store::EventStore;

pub const ADDRESS_BOOK_AGGREGATE: &str = "orders.address_book";

fn empty_book(aggregate_id: AggregateId) -> AddressBook {
    AddressBook::empty(AddressBookId(aggregate_id))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    #[serde(flatten)]
    pub address: ShippingAddress,
    #[serde(default)]
    pub address_type: AddressType,
    #[serde(default)]
    pub is_default: bool,
}

pub struct AddressBookService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    default_country: String,
    conflict_retries: u32,
}

impl<S, B> AddressBookService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        default_country: String,
        conflict_retries: u32,
    ) -> Self {
        Self {
            dispatcher,
            default_country,
            conflict_retries,
        }
    }

    pub fn add_address(&self, principal: &Principal, input: NewAddress) -> ServiceResult<SavedAddress> {
        let book_id = AddressBookId::for_user(principal.user_id);
        let address_id = AddressId::new();
        let cmd = AddressBookCommand::AddAddress(AddAddress {
            book_id,
            owner: principal.user_id,
            address_id,
            address: input.address.with_default_country(&self.default_country),
            address_type: input.address_type,
            is_default: input.is_default,
            occurred_at: Utc::now(),
        });
        let book = self.dispatch(book_id, &cmd)?;

        info!(user_id = %principal.user_id, address_id = %address_id, "address added");
        entry_of(&book, address_id)
    }

    /// In the order they were added. Empty for a user who never saved one.
    pub fn list_addresses(&self, principal: &Principal) -> ServiceResult<Vec<SavedAddress>> {
        Ok(self.load(principal)?.entries().to_vec())
    }

    pub fn get_address(&self, principal: &Principal, address_id: AddressId) -> ServiceResult<SavedAddress> {
        entry_of(&self.load(principal)?, address_id)
    }

    pub fn default_address(&self, principal: &Principal) -> ServiceResult<Option<SavedAddress>> {
        Ok(self.load(principal)?.default_address().cloned())
    }

    pub fn update_address(
        &self,
        principal: &Principal,
        address_id: AddressId,
        patch: AddressPatch,
    ) -> ServiceResult<SavedAddress> {
        let book_id = AddressBookId::for_user(principal.user_id);
        let cmd = AddressBookCommand::UpdateAddress(UpdateAddress {
            book_id,
            address_id,
            patch,
            occurred_at: Utc::now(),
        });
        let book = self.dispatch(book_id, &cmd)?;

        info!(user_id = %principal.user_id, address_id = %address_id, "address updated");
        entry_of(&book, address_id)
    }

    pub fn delete_address(&self, principal: &Principal, address_id: AddressId) -> ServiceResult<()> {
        let book_id = AddressBookId::for_user(principal.user_id);
        let cmd = AddressBookCommand::DeleteAddress(DeleteAddress {
            book_id,
            address_id,
            occurred_at: Utc::now(),
        });
        self.dispatch(book_id, &cmd)?;

        info!(user_id = %principal.user_id, address_id = %address_id, "address deleted");
        Ok(())
    }

    pub fn set_default_address(
        &self,
        principal: &Principal,
        address_id: AddressId,
    ) -> ServiceResult<SavedAddress> {
        let book_id = AddressBookId::for_user(principal.user_id);
        let cmd = AddressBookCommand::SetDefaultAddress(SetDefaultAddress {
            book_id,
            address_id,
            occurred_at: Utc::now(),
        });
        let book = self.dispatch(book_id, &cmd)?;

        info!(user_id = %principal.user_id, address_id = %address_id, "default address set");
        entry_of(&book, address_id)
    }

    /// The saved entry as an order's shipping address.
    pub fn shipping_address(&self, principal: &Principal, address_id: AddressId) -> ServiceResult<ShippingAddress> {
        Ok(self.get_address(principal, address_id)?.address)
    }

    fn load(&self, principal: &Principal) -> ServiceResult<AddressBook> {
        let book_id = AddressBookId::for_user(principal.user_id);
        Ok(self.dispatcher.load(book_id.0, empty_book)?)
    }

    fn dispatch(&self, book_id: AddressBookId, cmd: &AddressBookCommand) -> ServiceResult<AddressBook> {
        let committed = self.dispatcher.dispatch_with_retry(
            self.conflict_retries,
            book_id.0,
            ADDRESS_BOOK_AGGREGATE,
            cmd,
            empty_book,
        )?;
        Ok(committed.state)
    }
}

fn entry_of(book: &AddressBook, address_id: AddressId) -> ServiceResult<SavedAddress> {
    book.get(address_id)
        .cloned()
        .ok_or_else(|| DomainError::not_found(Resource::Address).into())
}
