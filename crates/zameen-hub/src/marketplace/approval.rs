//! Approval rules shared by listings and dealer profiles.
//!
//! `approval_status` is an admin-settable field rather than a one-way machine:
//! records start `pending`, and an admin may later move them to any of the
//! three states, overwriting whatever was there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ApprovalStatus, Profile, Property, PropertyId, UserId, UserRole};

/// Why a dealer with valid credentials may not start a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignInDenial {
    #[error("Your dealer account is pending approval. Please wait for admin approval before signing in.")]
    DealerPending,
    #[error("Your dealer account has been rejected. Please contact support for more information.")]
    DealerRejected,
}

impl SignInDenial {
    /// Pending dealers may try again once an admin has decided.
    pub const fn is_retryable(self) -> bool {
        matches!(self, SignInDenial::DealerPending)
    }
}

/// Only dealers are gated; users and admins always pass.
pub fn sign_in_gate(profile: &Profile) -> Result<(), SignInDenial> {
    match (profile.role, profile.approval_status) {
        (UserRole::Dealer, ApprovalStatus::Pending) => Err(SignInDenial::DealerPending),
        (UserRole::Dealer, ApprovalStatus::Rejected) => Err(SignInDenial::DealerRejected),
        _ => Ok(()),
    }
}

pub fn require_admin(actor: &Profile) -> Result<(), AccessDenied> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(AccessDenied::AdminOnly)
    }
}

/// Admins and approved dealers may publish listings.
pub fn require_publisher(actor: &Profile) -> Result<(), AccessDenied> {
    match (actor.role, actor.approval_status) {
        (UserRole::Admin, _) | (UserRole::Dealer, ApprovalStatus::Approved) => Ok(()),
        _ => Err(AccessDenied::PublisherOnly),
    }
}

pub fn require_manager(actor: &Profile, property: &Property) -> Result<(), AccessDenied> {
    if can_manage(actor, property) {
        Ok(())
    } else {
        Err(AccessDenied::OwnerOnly)
    }
}

pub fn can_manage(actor: &Profile, property: &Property) -> bool {
    actor.is_admin() || property.owner_id == actor.id
}

/// Approved listings are public; anything else is limited to its owner and admins.
pub fn visible_to(property: &Property, viewer: Option<&Profile>) -> bool {
    property.approval_status == ApprovalStatus::Approved
        || viewer.is_some_and(|viewer| can_manage(viewer, property))
}

/// Server-side authorization failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("only admins may perform this action")]
    AdminOnly,
    #[error("only approved dealers and admins may list properties")]
    PublisherOnly,
    #[error("only the listing owner or an admin may change this listing")]
    OwnerOnly,
}

/// Record whose approval status an admin decided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ApprovalSubject {
    Property(PropertyId),
    Dealer(UserId),
}

/// Emitted whenever an admin writes an approval status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    pub subject: ApprovalSubject,
    pub previous: ApprovalStatus,
    pub status: ApprovalStatus,
    pub decided_by: UserId,
    pub decided_at: DateTime<Utc>,
}

/// Outbound hook for approval decisions (live notifications, mail adapters).
pub trait ApprovalPublisher: Send + Sync {
    fn publish(&self, event: ApprovalEvent) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marketplace::domain::{ProfileChanges, PropertyDraft, PropertyType};

    fn profile(role: UserRole, approval_status: ApprovalStatus) -> Profile {
        let mut profile = Profile::new(UserId::new(), role, ProfileChanges::default(), Utc::now());
        profile.approval_status = approval_status;
        profile
    }

    fn listing(owner: UserId, approval_status: ApprovalStatus) -> Property {
        let mut property = PropertyDraft {
            title: "Plot near Motorway".to_string(),
            description: None,
            property_type: PropertyType::Plot,
            price: Some(2_000_000),
            city: "Islamabad".to_string(),
            area: None,
            address: None,
            bedrooms: None,
            bathrooms: None,
            furnishing: None,
        }
        .into_property(owner, Utc::now())
        .expect("valid draft");
        property.approval_status = approval_status;
        property
    }

    #[test]
    fn gate_blocks_pending_and_rejected_dealers_only() {
        use ApprovalStatus::*;

        assert_eq!(
            sign_in_gate(&profile(UserRole::Dealer, Pending)),
            Err(SignInDenial::DealerPending)
        );
        assert_eq!(
            sign_in_gate(&profile(UserRole::Dealer, Rejected)),
            Err(SignInDenial::DealerRejected)
        );
        assert_eq!(sign_in_gate(&profile(UserRole::Dealer, Approved)), Ok(()));

        for status in [Pending, Approved, Rejected] {
            assert_eq!(sign_in_gate(&profile(UserRole::User, status)), Ok(()));
            assert_eq!(sign_in_gate(&profile(UserRole::Admin, status)), Ok(()));
        }
    }

    #[test]
    fn denial_messages_are_descriptive() {
        assert!(SignInDenial::DealerPending
            .to_string()
            .contains("pending approval"));
        assert!(SignInDenial::DealerPending.is_retryable());
        assert!(SignInDenial::DealerRejected.to_string().contains("rejected"));
        assert!(!SignInDenial::DealerRejected.is_retryable());
    }

    #[test]
    fn only_admins_and_approved_dealers_publish() {
        assert!(require_publisher(&profile(UserRole::Admin, ApprovalStatus::Approved)).is_ok());
        assert!(require_publisher(&profile(UserRole::Dealer, ApprovalStatus::Approved)).is_ok());
        assert_eq!(
            require_publisher(&profile(UserRole::Dealer, ApprovalStatus::Pending)),
            Err(AccessDenied::PublisherOnly)
        );
        assert_eq!(
            require_publisher(&profile(UserRole::User, ApprovalStatus::Approved)),
            Err(AccessDenied::PublisherOnly)
        );
    }

    #[test]
    fn unapproved_listings_are_visible_to_owner_and_admin_only() {
        let owner = profile(UserRole::Dealer, ApprovalStatus::Approved);
        let admin = profile(UserRole::Admin, ApprovalStatus::Approved);
        let stranger = profile(UserRole::User, ApprovalStatus::Approved);
        let pending = listing(owner.id, ApprovalStatus::Pending);

        assert!(visible_to(&pending, Some(&owner)));
        assert!(visible_to(&pending, Some(&admin)));
        assert!(!visible_to(&pending, Some(&stranger)));
        assert!(!visible_to(&pending, None));
        assert!(visible_to(&listing(owner.id, ApprovalStatus::Approved), None));
    }

    #[test]
    fn subjects_serialize_with_kind_tag() {
        let id = PropertyId::new();
        let value = serde_json::to_value(ApprovalSubject::Property(id)).expect("serializes");
        assert_eq!(value["kind"], "property");
        assert_eq!(value["id"], serde_json::json!(id));
    }
}
