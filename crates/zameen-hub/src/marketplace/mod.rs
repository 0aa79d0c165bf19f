//! ZameenHub marketplace: listings under admin approval, dealer onboarding,
//! favorites and the HTTP surface over them.
//!
//! Services are generic over the store, identity and storage seams defined in
//! [`repository`], [`identity`] and [`storage`]; [`memory`] provides the
//! in-process adapters used by the binary and the tests.

pub mod accounts;
pub mod approval;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod favorites;
pub mod identity;
pub mod listing;
pub mod memory;
pub mod moderation;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod storage;

#[cfg(test)]
mod tests;

pub use accounts::{AccountService, SignUpOutcome, SignUpRequest, SignedIn};
pub use approval::{
    sign_in_gate, AccessDenied, ApprovalEvent, ApprovalPublisher, ApprovalSubject,
    NotificationError, SignInDenial,
};
pub use catalog::CatalogService;
pub use domain::{
    ApprovalStatus, ContactRecord, Favorite, FurnishingStatus, OwnerContact, Profile,
    ProfileChanges, Property, PropertyChanges, PropertyDraft, PropertyId, PropertyImage,
    PropertyStatus, PropertyType, UserId, UserRole, ValidationError,
};
pub use error::MarketplaceError;
pub use favorites::{
    FavoritesMerge, FileStorage, KeyValueStorage, LocalFavoriteSet, LocalFavorites,
    LocalStorageError, MemoryStorage, MergeReport, FAVORITES_KEY,
};
pub use identity::{IdentityError, IdentityProvider, ServiceRoleKey, Session, SessionToken};
pub use listing::{ListingFilter, ListingQuery, ListingScope, ListingView, SortOrder, StatusFilter};
pub use memory::{InMemoryIdentityProvider, InMemoryObjectStorage, InMemoryStore, StoredObject};
pub use moderation::{ModerationService, ModerationStats};
pub use notifications::{ApprovalNotifier, ApprovalSubscription};
pub use repository::{
    ContactRepository, FavoriteRepository, MarketplaceStore, ProfileFilter, ProfileRepository,
    PropertyRepository, RepositoryError,
};
pub use router::{marketplace_router, MarketplaceState, DEFAULT_MAX_UPLOAD_BYTES};
pub use storage::{ImageUpload, ObjectStorage, StorageError, PROPERTY_IMAGES_BUCKET};
