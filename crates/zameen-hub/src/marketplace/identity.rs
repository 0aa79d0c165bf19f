use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::UserId;

/// Authentication backend: credentials, sessions and identity deletion.
pub trait IdentityProvider: Send + Sync {
    fn sign_up(&self, email: &str, password: &str) -> Result<UserId, IdentityError>;
    fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;
    /// Revoking an unknown token is not an error.
    fn sign_out(&self, token: &SessionToken) -> Result<(), IdentityError>;
    fn resolve(&self, token: &SessionToken) -> Result<Option<UserId>, IdentityError>;
    /// Privileged: only callers holding the service-role key may delete identities.
    fn delete_identity(&self, credential: &ServiceRoleKey, user: &UserId)
        -> Result<(), IdentityError>;
}

/// Opaque bearer token handed to clients after sign-in.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub(crate) fn generate() -> Self {
        Self(format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: UserId,
    pub issued_at: DateTime<Utc>,
}

/// Service-role credential for privileged administrative calls.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceRoleKey(String);

impl ServiceRoleKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Random key for development runs that do not configure one.
    pub fn generate() -> Self {
        Self(format!("sr-{}", Uuid::new_v4().simple()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServiceRoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ServiceRoleKey(***)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("identity not found")]
    NotFound,
    #[error("service-role credential rejected")]
    Forbidden,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}
