use super::approval::{AccessDenied, SignInDenial};
use super::domain::ValidationError;
use super::identity::IdentityError;
use super::repository::RepositoryError;
use super::storage::StorageError;

/// Error surfaced by the marketplace services.
#[derive(Debug, thiserror::Error)]
pub enum MarketplaceError {
    #[error("sign in required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    SignInDenied(#[from] SignInDenial),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Repository(RepositoryError),
    #[error("identity provider unavailable: {0}")]
    Identity(IdentityError),
    #[error("file storage unavailable: {0}")]
    Storage(#[from] StorageError),
    #[error("request worker failed: {0}")]
    Worker(String),
}

impl MarketplaceError {
    /// Transient backend failures a client may retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MarketplaceError::Repository(_)
                | MarketplaceError::Identity(_)
                | MarketplaceError::Storage(_)
        )
    }
}

impl From<RepositoryError> for MarketplaceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => MarketplaceError::NotFound("record"),
            RepositoryError::Conflict => {
                MarketplaceError::Conflict("record already exists".to_string())
            }
            RepositoryError::PermissionDenied(reason) => MarketplaceError::Forbidden(reason),
            unavailable @ RepositoryError::Unavailable(_) => {
                MarketplaceError::Repository(unavailable)
            }
        }
    }
}

impl From<IdentityError> for MarketplaceError {
    fn from(value: IdentityError) -> Self {
        match value {
            IdentityError::InvalidCredentials => MarketplaceError::InvalidCredentials,
            IdentityError::EmailTaken => MarketplaceError::Conflict(value.to_string()),
            IdentityError::NotFound => MarketplaceError::NotFound("account"),
            IdentityError::Forbidden => MarketplaceError::Forbidden(value.to_string()),
            unavailable @ IdentityError::Unavailable(_) => MarketplaceError::Identity(unavailable),
        }
    }
}

impl From<AccessDenied> for MarketplaceError {
    fn from(value: AccessDenied) -> Self {
        MarketplaceError::Forbidden(value.to_string())
    }
}
