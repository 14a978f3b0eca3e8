//! `storefront-auth`: who is calling and what they may do.
//!
//! Token verification itself belongs to an external identity provider and is
//! reached through [`IdentityVerifier`]. Nothing here touches HTTP or storage.

pub mod authorize;
pub mod identity;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, require_admin, require_owner_or_admin};
pub use identity::{IdentityError, IdentityVerifier, StaticIdentityVerifier, VerifiedIdentity};
pub use principal::Principal;
pub use roles::Role;
pub use user::{
    RegisterUser, RemoveFromWishlist, ToggleWishlist, User, UserCommand, UserEvent, UserRegistered,
    WishlistItemAdded, WishlistItemRemoved,
};
