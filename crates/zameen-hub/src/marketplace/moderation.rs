use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::accounts::AccountService;
use super::approval::{require_admin, ApprovalEvent, ApprovalPublisher, ApprovalSubject};
use super::domain::{ApprovalStatus, Profile, Property, PropertyId, UserId, UserRole, ValidationError};
use super::error::MarketplaceError;
use super::identity::IdentityProvider;
use super::listing::{hydrate, ListingQuery, ListingView, StatusFilter};
use super::repository::{MarketplaceStore, ProfileFilter};

/// Dashboard counters shown to admins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModerationStats {
    pub total_properties: usize,
    pub pending_properties: usize,
    pub approved_properties: usize,
    pub total_dealers: usize,
    pub pending_dealers: usize,
    pub total_users: usize,
}

/// Admin-only operations. Every method re-checks the actor's role.
pub struct ModerationService<S, I, P> {
    store: Arc<S>,
    accounts: Arc<AccountService<S, I>>,
    publisher: Arc<P>,
}

impl<S, I, P> ModerationService<S, I, P>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    P: ApprovalPublisher + 'static,
{
    pub fn new(store: Arc<S>, accounts: Arc<AccountService<S, I>>, publisher: Arc<P>) -> Self {
        Self {
            store,
            accounts,
            publisher,
        }
    }

    /// Overwrites a listing's approval status, whatever it was before.
    pub fn set_property_approval(
        &self,
        admin: &Profile,
        id: &PropertyId,
        status: ApprovalStatus,
    ) -> Result<Property, MarketplaceError> {
        require_admin(admin)?;
        let mut property = self.property(id)?;

        let previous = property.approval_status;
        property.approval_status = status;
        property.updated_at = Utc::now();
        self.store.update_property(property.clone())?;

        info!(property = %id, admin = %admin.id, %previous, %status, "listing approval updated");
        self.announce(ApprovalSubject::Property(*id), previous, status, admin);
        Ok(property)
    }

    /// Decides a dealer application; non-dealer profiles are refused.
    pub fn set_dealer_approval(
        &self,
        admin: &Profile,
        id: &UserId,
        status: ApprovalStatus,
    ) -> Result<Profile, MarketplaceError> {
        require_admin(admin)?;
        let mut profile = self.profile(id)?;
        if !profile.is_dealer() {
            return Err(ValidationError::NotADealer(*id).into());
        }

        let previous = profile.approval_status;
        profile.approval_status = status;
        profile.updated_at = Utc::now();
        self.store.update_profile(profile.clone())?;

        info!(dealer = %id, admin = %admin.id, %previous, %status, "dealer approval updated");
        self.announce(ApprovalSubject::Dealer(*id), previous, status, admin);
        Ok(profile)
    }

    pub fn set_featured(
        &self,
        admin: &Profile,
        id: &PropertyId,
        featured: bool,
    ) -> Result<Property, MarketplaceError> {
        require_admin(admin)?;
        let mut property = self.property(id)?;
        property.featured = featured;
        property.updated_at = Utc::now();
        self.store.update_property(property.clone())?;
        Ok(property)
    }

    /// Changes a role without touching the approval status; a user promoted
    /// to dealer keeps whatever status the profile already had.
    pub fn set_role(
        &self,
        admin: &Profile,
        id: &UserId,
        role: UserRole,
    ) -> Result<Profile, MarketplaceError> {
        require_admin(admin)?;
        let mut profile = self.profile(id)?;
        let previous = profile.role;
        profile.role = role;
        profile.updated_at = Utc::now();
        self.store.update_profile(profile.clone())?;

        info!(user = %id, admin = %admin.id, %previous, %role, "role changed");
        Ok(profile)
    }

    pub fn delete_user(&self, admin: &Profile, id: &UserId) -> Result<(), MarketplaceError> {
        require_admin(admin)?;
        self.accounts.delete_user_account(id)
    }

    pub fn property_queue(
        &self,
        admin: &Profile,
        status: StatusFilter,
    ) -> Result<Vec<ListingView>, MarketplaceError> {
        require_admin(admin)?;
        let properties = self
            .store
            .query_properties(&ListingQuery::moderation(status))?;
        Ok(hydrate(self.store.as_ref(), properties)?)
    }

    pub fn pending_dealers(&self, admin: &Profile) -> Result<Vec<Profile>, MarketplaceError> {
        require_admin(admin)?;
        Ok(self
            .store
            .list_profiles(&ProfileFilter::dealers(Some(ApprovalStatus::Pending)))?)
    }

    pub fn users(&self, admin: &Profile) -> Result<Vec<Profile>, MarketplaceError> {
        require_admin(admin)?;
        Ok(self.store.list_profiles(&ProfileFilter::default())?)
    }

    pub fn stats(&self, admin: &Profile) -> Result<ModerationStats, MarketplaceError> {
        require_admin(admin)?;
        let properties = self
            .store
            .query_properties(&ListingQuery::moderation(StatusFilter::All))?;
        let profiles = self.store.list_profiles(&ProfileFilter::default())?;

        let count_properties = |status: ApprovalStatus| {
            properties
                .iter()
                .filter(|property| property.approval_status == status)
                .count()
        };
        let dealers = || profiles.iter().filter(|profile| profile.is_dealer());

        Ok(ModerationStats {
            total_properties: properties.len(),
            pending_properties: count_properties(ApprovalStatus::Pending),
            approved_properties: count_properties(ApprovalStatus::Approved),
            total_dealers: dealers().count(),
            pending_dealers: dealers()
                .filter(|profile| profile.approval_status == ApprovalStatus::Pending)
                .count(),
            total_users: profiles.len(),
        })
    }

    fn property(&self, id: &PropertyId) -> Result<Property, MarketplaceError> {
        self.store
            .fetch_property(id)?
            .ok_or(MarketplaceError::NotFound("property"))
    }

    fn profile(&self, id: &UserId) -> Result<Profile, MarketplaceError> {
        self.store
            .fetch_profile(id)?
            .ok_or(MarketplaceError::NotFound("profile"))
    }

    /// The decision is already stored; a failed notification is only logged.
    fn announce(
        &self,
        subject: ApprovalSubject,
        previous: ApprovalStatus,
        status: ApprovalStatus,
        admin: &Profile,
    ) {
        let event = ApprovalEvent {
            subject,
            previous,
            status,
            decided_by: admin.id,
            decided_at: Utc::now(),
        };
        if let Err(error) = self.publisher.publish(event) {
            warn!(?subject, %error, "approval notification not delivered");
        }
    }
}
