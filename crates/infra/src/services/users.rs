use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use serde::{Deserialize, Serialize};

use storefront_auth::{
    IdentityVerifier, Principal, RegisterUser, RemoveFromWishlist, ToggleWishlist, User, UserCommand,
};
use storefront_catalog::ProductId;
use storefront_core::{AggregateId, DomainError, Resource, UserId};
use storefront_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::errors::ServiceResult;
use crate::event_store::EventStore;
use crate::projections::{ProductView, ReadModels};

pub const USER_AGGREGATE: &str = "auth.user";

fn empty_user(aggregate_id: AggregateId) -> User {
    User::empty(UserId::from_uuid(*aggregate_id.as_uuid()))
}

/// What a wishlist toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WishlistAction {
    Added,
    Removed,
}

/// Maps verified external identities to local users, and keeps their
/// wishlists.
pub struct UserDirectory<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    read: Arc<ReadModels<S>>,
    verifier: Arc<dyn IdentityVerifier>,
    conflict_retries: u32,
}

impl<S, B> UserDirectory<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        read: Arc<ReadModels<S>>,
        verifier: Arc<dyn IdentityVerifier>,
        conflict_retries: u32,
    ) -> Self {
        Self {
            dispatcher,
            read,
            verifier,
            conflict_retries,
        }
    }

    /// Verify the token and return the caller as a customer, registering
    /// them on first sight. Admin principals are provisioned elsewhere.
    pub fn authenticate(&self, bearer_token: &str) -> ServiceResult<Principal> {
        let identity = self.verifier.verify(bearer_token)?;
        let user_id = User::id_for_subject(identity.subject.trim());
        let aggregate_id = AggregateId::from(user_id);

        let existing = self.dispatcher.load(aggregate_id, empty_user)?;
        if existing.created {
            return Ok(Principal::customer(user_id));
        }

        let cmd = UserCommand::Register(RegisterUser {
            user_id,
            identity,
            occurred_at: Utc::now(),
        });
        match self
            .dispatcher
            .dispatch(aggregate_id, USER_AGGREGATE, &cmd, empty_user)
        {
            Ok(committed) => {
                info!(user_id = %user_id, email = ?committed.state.email, "user registered");
            }
            // A concurrent first login for the same subject got there first.
            Err(DispatchError::Concurrency(_)) | Err(DispatchError::Domain(DomainError::Conflict(_))) => {
                debug!(user_id = %user_id, "user registered concurrently");
            }
            Err(err) => return Err(err.into()),
        }

        Ok(Principal::customer(user_id))
    }

    pub fn profile(&self, principal: &Principal) -> ServiceResult<User> {
        let user = self
            .dispatcher
            .load(AggregateId::from(principal.user_id), empty_user)?;
        if !user.created {
            return Err(DomainError::not_found(Resource::User).into());
        }
        Ok(user)
    }

    /// Only products currently in the catalog can be added; removing one that
    /// has since been deleted still works.
    pub fn toggle_wishlist(&self, principal: &Principal, product_id: ProductId) -> ServiceResult<WishlistAction> {
        let listed = self.profile(principal)?.wishlist.contains(&product_id);
        if !listed && self.read.products().get(&product_id).is_none() {
            return Err(DomainError::not_found(Resource::Product).into());
        }

        let cmd = UserCommand::ToggleWishlist(ToggleWishlist {
            user_id: principal.user_id,
            product_id,
            occurred_at: Utc::now(),
        });
        let committed = self.dispatcher.dispatch_with_retry(
            self.conflict_retries,
            AggregateId::from(principal.user_id),
            USER_AGGREGATE,
            &cmd,
            empty_user,
        )?;

        let action = if committed.state.wishlist.contains(&product_id) {
            WishlistAction::Added
        } else {
            WishlistAction::Removed
        };
        info!(user_id = %principal.user_id, product_id = %product_id, ?action, "wishlist toggled");
        Ok(action)
    }

    /// Listed products still in the catalog, in the order they were added.
    pub fn get_wishlist(&self, principal: &Principal) -> ServiceResult<Vec<ProductView>> {
        let user = self.profile(principal)?;
        let products = self.read.products();
        Ok(user.wishlist.iter().filter_map(|id| products.get(id)).collect())
    }

    pub fn remove_from_wishlist(
        &self,
        principal: &Principal,
        product_id: ProductId,
    ) -> ServiceResult<Vec<ProductView>> {
        let cmd = UserCommand::RemoveFromWishlist(RemoveFromWishlist {
            user_id: principal.user_id,
            product_id,
            occurred_at: Utc::now(),
        });
        self.dispatcher.dispatch_with_retry(
            self.conflict_retries,
            AggregateId::from(principal.user_id),
            USER_AGGREGATE,
            &cmd,
            empty_user,
        )?;
        self.get_wishlist(principal)
    }
}
