use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::approval::sign_in_gate;
use super::domain::{ApprovalStatus, Profile, ProfileChanges, UserId, UserRole, ValidationError};
use super::error::MarketplaceError;
use super::favorites::{FavoritesMerge, KeyValueStorage, LocalFavorites, MergeReport};
use super::identity::{IdentityError, IdentityProvider, ServiceRoleKey, Session, SessionToken};
use super::repository::MarketplaceStore;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Registration form. `agency_name` is only kept for dealers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub agency_name: Option<String>,
}

impl SignUpRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        let email = self.email.trim();
        let well_formed = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
        if !well_formed {
            return Err(ValidationError::InvalidEmail(email.to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
        }
        Ok(())
    }

    fn details(&self) -> ProfileChanges {
        ProfileChanges {
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            agency_name: match self.role {
                UserRole::Dealer => self.agency_name.clone(),
                UserRole::User | UserRole::Admin => None,
            },
            bio: None,
        }
    }
}

/// Result of a self-registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SignUpOutcome {
    /// Signed in straight away, with local favorites merged.
    Registered {
        session: Session,
        profile: Profile,
        merge: MergeReport,
    },
    /// Dealer accounts wait for an admin before they can sign in.
    AwaitingApproval { profile: Profile },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedIn {
    pub session: Session,
    pub profile: Profile,
    pub merge: MergeReport,
}

/// Registration, sessions, self-service profile edits and account removal.
pub struct AccountService<S, I> {
    store: Arc<S>,
    identity: Arc<I>,
    merge: FavoritesMerge<S>,
    service_key: ServiceRoleKey,
}

impl<S, I> AccountService<S, I>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
{
    pub fn new(store: Arc<S>, identity: Arc<I>, service_key: ServiceRoleKey) -> Self {
        let merge = FavoritesMerge::new(Arc::clone(&store), Arc::clone(&store));
        Self {
            store,
            identity,
            merge,
            service_key,
        }
    }

    /// Users and dealers may register themselves; admins are provisioned.
    pub fn sign_up<L: KeyValueStorage>(
        &self,
        request: SignUpRequest,
        local: &mut LocalFavorites<L>,
    ) -> Result<SignUpOutcome, MarketplaceError> {
        request.validate()?;
        if request.role == UserRole::Admin {
            return Err(ValidationError::RoleNotSelfAssignable(UserRole::Admin).into());
        }

        let profile = self.register(&request)?;
        info!(user = %profile.id, role = %profile.role, "account registered");

        if profile.is_dealer() {
            return Ok(SignUpOutcome::AwaitingApproval { profile });
        }

        let session = self.identity.sign_in(&request.email, &request.password)?;
        let merge = self.merge.merge(local, &profile.id);
        Ok(SignUpOutcome::Registered {
            session,
            profile,
            merge,
        })
    }

    /// Verifies credentials, applies the dealer approval gate, then merges
    /// local favorites before returning.
    pub fn sign_in<L: KeyValueStorage>(
        &self,
        email: &str,
        password: &str,
        local: &mut LocalFavorites<L>,
    ) -> Result<SignedIn, MarketplaceError> {
        let session = self.identity.sign_in(email, password)?;

        let profile = match self.store.fetch_profile(&session.user_id)? {
            Some(profile) => profile,
            None => {
                self.revoke(&session.token)?;
                return Err(MarketplaceError::NotFound("profile"));
            }
        };

        if let Err(denial) = sign_in_gate(&profile) {
            // A denial must not leave a live session behind.
            self.revoke(&session.token)?;
            info!(user = %profile.id, status = %profile.approval_status, "dealer sign-in blocked");
            return Err(denial.into());
        }

        let merge = self.merge.merge(local, &profile.id);
        info!(user = %profile.id, "signed in");
        Ok(SignedIn {
            session,
            profile,
            merge,
        })
    }

    pub fn sign_out(&self, token: &SessionToken) -> Result<(), MarketplaceError> {
        Ok(self.identity.sign_out(token)?)
    }

    /// Resolves the caller behind a bearer token. The approval gate is
    /// re-applied so a dealer rejected mid-session loses access.
    pub fn actor(&self, token: Option<&SessionToken>) -> Result<Profile, MarketplaceError> {
        let token = token.ok_or(MarketplaceError::Unauthenticated)?;
        let user = self
            .identity
            .resolve(token)?
            .ok_or(MarketplaceError::Unauthenticated)?;
        let profile = self
            .store
            .fetch_profile(&user)?
            .ok_or(MarketplaceError::Unauthenticated)?;
        sign_in_gate(&profile)?;
        Ok(profile)
    }

    /// Like [`actor`](Self::actor), but anonymous callers and stale tokens
    /// simply browse without a profile.
    pub fn optional_actor(
        &self,
        token: Option<&SessionToken>,
    ) -> Result<Option<Profile>, MarketplaceError> {
        match self.actor(token) {
            Ok(profile) => Ok(Some(profile)),
            Err(MarketplaceError::Unauthenticated) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Public approval state of a dealer application.
    pub fn dealer_status(&self, id: &UserId) -> Result<ApprovalStatus, MarketplaceError> {
        self.store
            .fetch_profile(id)?
            .filter(Profile::is_dealer)
            .map(|profile| profile.approval_status)
            .ok_or(MarketplaceError::NotFound("dealer"))
    }

    pub fn update_own_profile(
        &self,
        actor: &Profile,
        changes: ProfileChanges,
    ) -> Result<Profile, MarketplaceError> {
        let mut profile = self
            .store
            .fetch_profile(&actor.id)?
            .ok_or(MarketplaceError::NotFound("profile"))?;
        changes.apply(&mut profile, Utc::now());
        self.store.update_profile(profile.clone())?;
        Ok(profile)
    }

    /// Privileged removal of an identity and everything hanging off its
    /// profile: listings (with their images, favorites and contacts), the
    /// user's favorites and contact log.
    pub fn delete_account(
        &self,
        credential: &ServiceRoleKey,
        user: &UserId,
    ) -> Result<(), MarketplaceError> {
        let identity_existed = match self.identity.delete_identity(credential, user) {
            Ok(()) => true,
            Err(IdentityError::NotFound) => false,
            Err(error) => return Err(error.into()),
        };

        let profile_existed = self.store.delete_profile(user)?;
        if !identity_existed && !profile_existed {
            return Err(MarketplaceError::NotFound("account"));
        }
        info!(user = %user, "account deleted");
        Ok(())
    }

    pub fn delete_own_account(&self, actor: &Profile) -> Result<(), MarketplaceError> {
        self.delete_user_account(&actor.id)
    }

    /// Service-role seeding of an account with any role. The profile is
    /// usable immediately, dealers included.
    pub fn provision_account(
        &self,
        credential: &ServiceRoleKey,
        request: SignUpRequest,
    ) -> Result<Profile, MarketplaceError> {
        if *credential != self.service_key {
            return Err(IdentityError::Forbidden.into());
        }
        request.validate()?;

        let mut profile = self.register(&request)?;
        if profile.approval_status != ApprovalStatus::Approved {
            profile.approval_status = ApprovalStatus::Approved;
            self.store.update_profile(profile.clone())?;
        }
        info!(user = %profile.id, role = %profile.role, "account provisioned");
        Ok(profile)
    }

    pub(crate) fn delete_user_account(&self, user: &UserId) -> Result<(), MarketplaceError> {
        self.delete_account(&self.service_key, user)
    }

    fn register(&self, request: &SignUpRequest) -> Result<Profile, MarketplaceError> {
        let user = self.identity.sign_up(&request.email, &request.password)?;
        let profile = Profile::new(user, request.role, request.details(), Utc::now());

        match self.store.insert_profile(profile) {
            Ok(profile) => Ok(profile),
            Err(error) => {
                // Leave no identity without a profile behind.
                if let Err(cleanup) = self.identity.delete_identity(&self.service_key, &user) {
                    warn!(%user, error = %cleanup, "orphaned identity after failed registration");
                }
                Err(error.into())
            }
        }
    }

    fn revoke(&self, token: &SessionToken) -> Result<(), MarketplaceError> {
        self.identity.sign_out(token).map_err(|error| {
            warn!(%error, "session could not be revoked");
            MarketplaceError::from(error)
        })
    }
}
