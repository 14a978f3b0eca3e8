//! User aggregate (event-sourced): the local record behind an external identity.
//!
//! A user's id is derived from the identity provider's subject, so the first
//! login for a subject always targets the same stream. Two concurrent first
//! logins race on a conditional append and only one registration lands.
//!
//! The user also owns their wishlist of products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use storefront_catalog::ProductId;
use storefront_core::{Aggregate, AggregateRoot, DomainError, Resource, UserId};
use storefront_events::Event;

use crate::identity::VerifiedIdentity;

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub subject: String,
    pub email: Option<String>,
    pub name: String,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    pub provider: Option<String>,
    pub registered_at: Option<DateTime<Utc>>,
    /// Most recently added last.
    pub wishlist: Vec<ProductId>,
    pub version: u64,
    pub created: bool,
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            subject: String::new(),
            email: None,
            name: String::new(),
            avatar: None,
            phone: None,
            provider: None,
            registered_at: None,
            wishlist: Vec::new(),
            version: 0,
            created: false,
        }
    }

    /// Stable user id for a provider subject.
    pub fn id_for_subject(subject: &str) -> UserId {
        UserId::from_uuid(Uuid::new_v5(&Uuid::NAMESPACE_OID, subject.as_bytes()))
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands & events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterUser {
    pub user_id: UserId,
    pub identity: VerifiedIdentity,
    pub occurred_at: DateTime<Utc>,
}

/// Add the product if absent, remove it if present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleWishlist {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Removing a product that is not listed is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveFromWishlist {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserCommand {
    Register(RegisterUser),
    ToggleWishlist(ToggleWishlist),
    RemoveFromWishlist(RemoveFromWishlist),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: UserId,
    pub subject: String,
    pub email: Option<String>,
    pub name: String,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    pub provider: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItemAdded {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItemRemoved {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserEvent {
    Registered(UserRegistered),
    WishlistItemAdded(WishlistItemAdded),
    WishlistItemRemoved(WishlistItemRemoved),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Registered(_) => "auth.user.registered",
            UserEvent::WishlistItemAdded(_) => "auth.user.wishlist_item_added",
            UserEvent::WishlistItemRemoved(_) => "auth.user.wishlist_item_removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Registered(e) => e.occurred_at,
            UserEvent::WishlistItemAdded(e) => e.occurred_at,
            UserEvent::WishlistItemRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Registered(e) => {
                self.id = e.user_id;
                self.subject = e.subject.clone();
                self.email = e.email.clone();
                self.name = e.name.clone();
                self.avatar = e.avatar.clone();
                self.phone = e.phone.clone();
                self.provider = e.provider.clone();
                self.registered_at = Some(e.occurred_at);
                self.created = true;
            }
            UserEvent::WishlistItemAdded(e) => {
                self.wishlist.push(e.product_id);
            }
            UserEvent::WishlistItemRemoved(e) => {
                self.wishlist.retain(|id| *id != e.product_id);
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Register(cmd) => self.handle_register(cmd),
            UserCommand::ToggleWishlist(cmd) => {
                self.ensure_registered(cmd.user_id)?;
                if self.wishlist.contains(&cmd.product_id) {
                    Ok(vec![UserEvent::WishlistItemRemoved(WishlistItemRemoved {
                        user_id: cmd.user_id,
                        product_id: cmd.product_id,
                        occurred_at: cmd.occurred_at,
                    })])
                } else {
                    Ok(vec![UserEvent::WishlistItemAdded(WishlistItemAdded {
                        user_id: cmd.user_id,
                        product_id: cmd.product_id,
                        occurred_at: cmd.occurred_at,
                    })])
                }
            }
            UserCommand::RemoveFromWishlist(cmd) => {
                self.ensure_registered(cmd.user_id)?;
                if !self.wishlist.contains(&cmd.product_id) {
                    return Ok(Vec::new());
                }
                Ok(vec![UserEvent::WishlistItemRemoved(WishlistItemRemoved {
                    user_id: cmd.user_id,
                    product_id: cmd.product_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl User {
    fn ensure_registered(&self, user_id: UserId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found(Resource::User));
        }
        if self.id != user_id {
            return Err(DomainError::invariant("user_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already registered"));
        }

        let subject = cmd.identity.subject.trim();
        if subject.is_empty() {
            return Err(DomainError::validation("identity subject is required"));
        }
        if Self::id_for_subject(subject) != cmd.user_id {
            return Err(DomainError::invariant("user_id does not match subject"));
        }

        let email = cmd
            .identity
            .email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());

        // Display name falls back to the local part of the email.
        let name = cmd
            .identity
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| {
                email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        Ok(vec![UserEvent::Registered(UserRegistered {
            user_id: cmd.user_id,
            subject: subject.to_string(),
            email,
            name,
            avatar: cmd.identity.avatar.clone(),
            phone: cmd.identity.phone.clone(),
            provider: cmd.identity.provider.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
