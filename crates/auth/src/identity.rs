//! Boundary to the external identity provider.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the identity provider vouches for after checking a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// Provider-side user id.
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub phone: Option<String>,
    /// Sign-in method reported by the provider (e.g. "google", "phone").
    pub provider: Option<String>,
}

impl VerifiedIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            name: None,
            avatar: None,
            phone: None,
            provider: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, bearer_token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Fixed token table, for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityVerifier {
    tokens: HashMap<String, VerifiedIdentity>,
}

impl StaticIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, identity: VerifiedIdentity) -> Self {
        self.tokens.insert(token.into(), identity);
        self
    }
}

impl IdentityVerifier for StaticIdentityVerifier {
    fn verify(&self, bearer_token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let token = bearer_token.trim();
        if token.is_empty() {
            return Err(IdentityError::Unauthenticated("missing token".to_string()));
        }
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| IdentityError::Unauthenticated("unknown token".to_string()))
    }
}
