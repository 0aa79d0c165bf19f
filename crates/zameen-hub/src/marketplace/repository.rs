use serde::{Deserialize, Serialize};

use super::domain::{
    ApprovalStatus, ContactRecord, Favorite, Profile, Property, PropertyId, PropertyImage,
    UserId, UserRole,
};
use super::listing::ListingQuery;

/// Profiles table. Deleting a profile cascades like the hosted schema does.
pub trait ProfileRepository: Send + Sync {
    fn insert_profile(&self, profile: Profile) -> Result<Profile, RepositoryError>;
    fn update_profile(&self, profile: Profile) -> Result<(), RepositoryError>;
    fn fetch_profile(&self, id: &UserId) -> Result<Option<Profile>, RepositoryError>;
    /// Newest first.
    fn list_profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>, RepositoryError>;
    /// Removes the profile together with the user's properties (and their
    /// images, favorites and contacts), favorites and contacts. Returns
    /// whether a profile existed.
    fn delete_profile(&self, id: &UserId) -> Result<bool, RepositoryError>;
}

/// Properties and their images.
pub trait PropertyRepository: Send + Sync {
    fn insert_property(&self, property: Property) -> Result<Property, RepositoryError>;
    fn update_property(&self, property: Property) -> Result<(), RepositoryError>;
    fn fetch_property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError>;
    /// Existing properties among `ids`, in the order given.
    fn fetch_properties(&self, ids: &[PropertyId]) -> Result<Vec<Property>, RepositoryError>;
    fn query_properties(&self, query: &ListingQuery) -> Result<Vec<Property>, RepositoryError>;
    /// Cascades to images, favorites and contacts referencing the property.
    fn delete_property(&self, id: &PropertyId) -> Result<bool, RepositoryError>;
    fn insert_images(&self, images: Vec<PropertyImage>) -> Result<(), RepositoryError>;
    /// Ordered by `display_order`.
    fn images_for(&self, property: &PropertyId) -> Result<Vec<PropertyImage>, RepositoryError>;
}

/// Favorites join table; (user, property) pairs are unique.
pub trait FavoriteRepository: Send + Sync {
    /// Oldest favorite first.
    fn favorite_property_ids(&self, user: &UserId) -> Result<Vec<PropertyId>, RepositoryError>;
    /// All-or-nothing: a duplicate pair fails the whole batch with `Conflict`.
    fn insert_favorites(&self, favorites: Vec<Favorite>) -> Result<(), RepositoryError>;
    fn delete_favorite(&self, user: &UserId, property: &PropertyId)
        -> Result<bool, RepositoryError>;
}

/// Append-only contact log.
pub trait ContactRepository: Send + Sync {
    fn insert_contact(&self, contact: ContactRecord) -> Result<ContactRecord, RepositoryError>;
    fn contacts_for(&self, property: &PropertyId) -> Result<Vec<ContactRecord>, RepositoryError>;
}

/// Everything the marketplace services need from the relational store.
pub trait MarketplaceStore:
    ProfileRepository + PropertyRepository + FavoriteRepository + ContactRepository
{
}

impl<T> MarketplaceStore for T where
    T: ProfileRepository + PropertyRepository + FavoriteRepository + ContactRepository
{
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFilter {
    pub role: Option<UserRole>,
    pub approval_status: Option<ApprovalStatus>,
}

impl ProfileFilter {
    pub fn dealers(approval_status: Option<ApprovalStatus>) -> Self {
        Self {
            role: Some(UserRole::Dealer),
            approval_status,
        }
    }

    pub fn matches(&self, profile: &Profile) -> bool {
        self.role.map_or(true, |role| profile.role == role)
            && self
                .approval_status
                .map_or(true, |status| profile.approval_status == status)
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
