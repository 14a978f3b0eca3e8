//! A user's saved delivery addresses.
//!
//! One book per user, so every edit to a user's addresses is a write to one
//! stream and "at most one default" is checked against a single version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Resource, UserId};
use storefront_events::Event;

use crate::address::ShippingAddress;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressBookId(pub AggregateId);

impl AddressBookId {
    pub fn for_user(user_id: UserId) -> Self {
        Self(AggregateId::owned_by(user_id, "address_book"))
    }
}

impl core::fmt::Display for AddressBookId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Identifies one entry within a book.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressId(pub Uuid);

impl AddressId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for AddressId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for AddressId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    #[default]
    Home,
    Office,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedAddress {
    pub address_id: AddressId,
    #[serde(flatten)]
    pub address: ShippingAddress,
    pub address_type: AddressType,
    pub is_default: bool,
}

/// Allow-listed edit of one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub pincode: Option<String>,
    pub country: Option<String>,
    pub address_type: Option<AddressType>,
    pub is_default: Option<bool>,
}

impl AddressPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn merge(&self, current: &SavedAddress) -> Result<SavedAddress, DomainError> {
        let mut next = current.clone();
        let fields = [
            (&self.name, &mut next.address.name),
            (&self.phone, &mut next.address.phone),
            (&self.address_line, &mut next.address.address_line),
            (&self.city, &mut next.address.city),
            (&self.state, &mut next.address.state),
            (&self.pincode, &mut next.address.pincode),
            (&self.country, &mut next.address.country),
        ];
        for (patch, field) in fields {
            if let Some(value) = patch {
                *field = value.trim().to_string();
            }
        }
        if let Some(address_type) = self.address_type {
            next.address_type = address_type;
        }
        if let Some(is_default) = self.is_default {
            next.is_default = is_default;
        }
        next.address.validate()?;
        Ok(next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBook {
    id: AddressBookId,
    owner: Option<UserId>,
    entries: Vec<SavedAddress>,
    version: u64,
}

impl AddressBook {
    pub fn empty(id: AddressBookId) -> Self {
        Self {
            id,
            owner: None,
            entries: Vec::new(),
            version: 0,
        }
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    /// In the order they were added.
    pub fn entries(&self) -> &[SavedAddress] {
        &self.entries
    }

    pub fn get(&self, address_id: AddressId) -> Option<&SavedAddress> {
        self.entries.iter().find(|e| e.address_id == address_id)
    }

    pub fn default_address(&self) -> Option<&SavedAddress> {
        self.entries.iter().find(|e| e.is_default)
    }

    fn entry(&self, address_id: AddressId) -> Result<&SavedAddress, DomainError> {
        self.get(address_id).ok_or(DomainError::not_found(Resource::Address))
    }

    fn check_book(&self, book_id: AddressBookId) -> Result<(), DomainError> {
        if self.id != book_id {
            return Err(DomainError::invariant("address_book_id mismatch"));
        }
        Ok(())
    }

    fn make_sole_default(&mut self, address_id: AddressId) {
        for entry in &mut self.entries {
            entry.is_default = entry.address_id == address_id;
        }
    }
}

impl AggregateRoot for AddressBook {
    type Id = AddressBookId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddAddress {
    pub book_id: AddressBookId,
    pub owner: UserId,
    pub address_id: AddressId,
    pub address: ShippingAddress,
    pub address_type: AddressType,
    pub is_default: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAddress {
    pub book_id: AddressBookId,
    pub address_id: AddressId,
    pub patch: AddressPatch,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAddress {
    pub book_id: AddressBookId,
    pub address_id: AddressId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDefaultAddress {
    pub book_id: AddressBookId,
    pub address_id: AddressId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressBookCommand {
    AddAddress(AddAddress),
    UpdateAddress(UpdateAddress),
    DeleteAddress(DeleteAddress),
    SetDefaultAddress(SetDefaultAddress),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressAdded {
    pub book_id: AddressBookId,
    pub owner: UserId,
    pub entry: SavedAddress,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressUpdated {
    pub book_id: AddressBookId,
    pub entry: SavedAddress,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRemoved {
    pub book_id: AddressBookId,
    pub address_id: AddressId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAddressSet {
    pub book_id: AddressBookId,
    pub address_id: AddressId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressBookEvent {
    AddressAdded(AddressAdded),
    AddressUpdated(AddressUpdated),
    AddressRemoved(AddressRemoved),
    DefaultAddressSet(DefaultAddressSet),
}

impl Event for AddressBookEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AddressBookEvent::AddressAdded(_) => "orders.address_book.address_added",
            AddressBookEvent::AddressUpdated(_) => "orders.address_book.address_updated",
            AddressBookEvent::AddressRemoved(_) => "orders.address_book.address_removed",
            AddressBookEvent::DefaultAddressSet(_) => "orders.address_book.default_set",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AddressBookEvent::AddressAdded(e) => e.occurred_at,
            AddressBookEvent::AddressUpdated(e) => e.occurred_at,
            AddressBookEvent::AddressRemoved(e) => e.occurred_at,
            AddressBookEvent::DefaultAddressSet(e) => e.occurred_at,
        }
    }
}

impl Aggregate for AddressBook {
    type Command = AddressBookCommand;
    type Event = AddressBookEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AddressBookEvent::AddressAdded(e) => {
                self.id = e.book_id;
                self.owner = Some(e.owner);
                self.entries.push(e.entry.clone());
                if e.entry.is_default {
                    self.make_sole_default(e.entry.address_id);
                }
            }
            AddressBookEvent::AddressUpdated(e) => {
                if let Some(entry) = self
                    .entries
                    .iter_mut()
                    .find(|x| x.address_id == e.entry.address_id)
                {
                    *entry = e.entry.clone();
                }
                if e.entry.is_default {
                    self.make_sole_default(e.entry.address_id);
                }
            }
            AddressBookEvent::AddressRemoved(e) => {
                self.entries.retain(|x| x.address_id != e.address_id);
            }
            AddressBookEvent::DefaultAddressSet(e) => {
                self.make_sole_default(e.address_id);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AddressBookCommand::AddAddress(cmd) => {
                self.check_book(cmd.book_id)?;
                if self.owner.is_some_and(|owner| owner != cmd.owner) {
                    return Err(DomainError::forbidden("address book belongs to another user"));
                }
                if self.get(cmd.address_id).is_some() {
                    return Err(DomainError::conflict("address id already in use"));
                }
                cmd.address.validate()?;
                Ok(vec![AddressBookEvent::AddressAdded(AddressAdded {
                    book_id: cmd.book_id,
                    owner: cmd.owner,
                    entry: SavedAddress {
                        address_id: cmd.address_id,
                        address: cmd.address.clone(),
                        address_type: cmd.address_type,
                        is_default: cmd.is_default,
                    },
                    occurred_at: cmd.occurred_at,
                })])
            }
            AddressBookCommand::UpdateAddress(cmd) => {
                self.check_book(cmd.book_id)?;
                let current = self.entry(cmd.address_id)?;
                if cmd.patch.is_empty() {
                    return Err(DomainError::validation("no updatable fields supplied"));
                }
                Ok(vec![AddressBookEvent::AddressUpdated(AddressUpdated {
                    book_id: cmd.book_id,
                    entry: cmd.patch.merge(current)?,
                    occurred_at: cmd.occurred_at,
                })])
            }
            AddressBookCommand::DeleteAddress(cmd) => {
                self.check_book(cmd.book_id)?;
                self.entry(cmd.address_id)?;
                Ok(vec![AddressBookEvent::AddressRemoved(AddressRemoved {
                    book_id: cmd.book_id,
                    address_id: cmd.address_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            AddressBookCommand::SetDefaultAddress(cmd) => {
                self.check_book(cmd.book_id)?;
                if self.entry(cmd.address_id)?.is_default {
                    return Ok(Vec::new());
                }
                Ok(vec![AddressBookEvent::DefaultAddressSet(DefaultAddressSet {
                    book_id: cmd.book_id,
                    address_id: cmd.address_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_events::execute;

    fn address(city: &str) -> ShippingAddress {
        ShippingAddress {
            name: "Asha".to_string(),
            phone: "9999999999".to_string(),
            address_line: "12 MG Road".to_string(),
            city: city.to_string(),
            state: "MH".to_string(),
            pincode: "411001".to_string(),
            country: "India".to_string(),
        }
    }

    fn add(book: &mut AddressBook, owner: UserId, city: &str, is_default: bool) -> AddressId {
        let address_id = AddressId::new();
        let book_id = *book.id();
        execute(
            book,
            &AddressBookCommand::AddAddress(AddAddress {
                book_id,
                owner,
                address_id,
                address: address(city),
                address_type: AddressType::Home,
                is_default,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        address_id
    }

    fn defaults(book: &AddressBook) -> Vec<AddressId> {
        book.entries()
            .iter()
            .filter(|e| e.is_default)
            .map(|e| e.address_id)
            .collect()
    }

    #[test]
    fn book_stream_is_not_the_user_stream() {
        let user = UserId::new();
        assert_ne!(AddressBookId::for_user(user).0, AggregateId::from(user));
        assert_eq!(AddressBookId::for_user(user), AddressBookId::for_user(user));
    }

    #[test]
    fn a_new_default_unsets_the_previous_one() {
        let user = UserId::new();
        let book_id = AddressBookId::for_user(user);
        let mut book = AddressBook::empty(book_id);
        let home = add(&mut book, user, "Pune", true);
        let office = add(&mut book, user, "Mumbai", true);
        add(&mut book, user, "Goa", false);

        assert_eq!(defaults(&book), vec![office]);
        assert_eq!(book.owner(), Some(user));

        execute(
            &mut book,
            &AddressBookCommand::SetDefaultAddress(SetDefaultAddress {
                book_id,
                address_id: home,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(defaults(&book), vec![home]);
        assert_eq!(book.default_address().unwrap().address.city, "Pune");
    }

    #[test]
    fn update_can_promote_and_revalidates() {
        let user = UserId::new();
        let book_id = AddressBookId::for_user(user);
        let mut book = AddressBook::empty(book_id);
        let first = add(&mut book, user, "Pune", true);
        let second = add(&mut book, user, "Mumbai", false);

        execute(
            &mut book,
            &AddressBookCommand::UpdateAddress(UpdateAddress {
                book_id,
                address_id: second,
                patch: AddressPatch {
                    address_type: Some(AddressType::Office),
                    is_default: Some(true),
                    ..AddressPatch::default()
                },
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(defaults(&book), vec![second]);
        assert_eq!(book.get(second).unwrap().address_type, AddressType::Office);

        let err = book
            .handle(&AddressBookCommand::UpdateAddress(UpdateAddress {
                book_id,
                address_id: first,
                patch: AddressPatch {
                    pincode: Some("  ".to_string()),
                    ..AddressPatch::default()
                },
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn missing_entries_are_not_found() {
        let user = UserId::new();
        let book_id = AddressBookId::for_user(user);
        let mut book = AddressBook::empty(book_id);
        let only = add(&mut book, user, "Pune", false);
        execute(
            &mut book,
            &AddressBookCommand::DeleteAddress(DeleteAddress {
                book_id,
                address_id: only,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert!(book.entries().is_empty());

        for cmd in [
            AddressBookCommand::DeleteAddress(DeleteAddress {
                book_id,
                address_id: only,
                occurred_at: Utc::now(),
            }),
            AddressBookCommand::SetDefaultAddress(SetDefaultAddress {
                book_id,
                address_id: AddressId::new(),
                occurred_at: Utc::now(),
            }),
        ] {
            assert_eq!(book.handle(&cmd).unwrap_err(), DomainError::NotFound(Resource::Address));
        }
    }

    #[test]
    fn setting_the_current_default_again_is_a_no_op() {
        let user = UserId::new();
        let book_id = AddressBookId::for_user(user);
        let mut book = AddressBook::empty(book_id);
        let home = add(&mut book, user, "Pune", true);
        let events = book
            .handle(&AddressBookCommand::SetDefaultAddress(SetDefaultAddress {
                book_id,
                address_id: home,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert!(events.is_empty());
    }
}
