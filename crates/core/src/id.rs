//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a user (cart owner, order owner, actor).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of an aggregate stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// New time-ordered (UUIDv7) identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(UserId, "UserId");
impl_uuid_newtype!(AggregateId, "AggregateId");

impl AggregateId {
    /// Stream of a per-user record other than the user itself (cart, address
    /// book). Stable for a `(user, kind)` pair and distinct from the user's
    /// own stream.
    pub fn owned_by(user_id: UserId, kind: &str) -> Self {
        Self(Uuid::new_v5(&user_id.0, kind.as_bytes()))
    }
}

impl From<UserId> for AggregateId {
    /// The user's own stream shares the user's uuid.
    fn from(value: UserId) -> Self {
        Self(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_id_is_invalid_id() {
        let err = "not-a-uuid".parse::<UserId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => assert!(msg.starts_with("UserId")),
            _ => panic!("Expected InvalidId error"),
        }
    }

    #[test]
    fn user_id_maps_to_same_stream_id() {
        let user = UserId::new();
        let stream: AggregateId = user.into();
        assert_eq!(stream.as_uuid(), user.as_uuid());
    }

    #[test]
    fn owned_streams_are_stable_and_distinct() {
        let user = UserId::new();
        let cart = AggregateId::owned_by(user, "cart");
        assert_eq!(cart, AggregateId::owned_by(user, "cart"));
        assert_ne!(cart, AggregateId::from(user));
        assert_ne!(cart, AggregateId::owned_by(user, "address_book"));
        assert_ne!(cart, AggregateId::owned_by(UserId::new(), "cart"));
    }
}
