use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(raw.trim()).map(Self)
            }
        }
    };
}

identifier!(
    /// Identity of an account; shared by the auth record and its profile.
    UserId
);
identifier!(PropertyId);
identifier!(ImageId);
identifier!(FavoriteId);
identifier!(ContactId);

/// Closed value sets stored as text columns. Each gets its wire label,
/// `Display` and a `FromStr` accepting exactly that label.
macro_rules! labelled_enum {
    ($name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let raw = raw.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|candidate| candidate.label() == raw)
                    .ok_or_else(|| UnknownVariant {
                        kind: stringify!($name),
                        value: raw.to_string(),
                    })
            }
        }
    };
}

/// Raised when text does not name a member of one of the closed enumerations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Moderation state shared by listings and dealer profiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

labelled_enum!(ApprovalStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    House,
    Apartment,
    Plot,
    Commercial,
}

labelled_enum!(PropertyType {
    House => "house",
    Apartment => "apartment",
    Plot => "plot",
    Commercial => "commercial",
});

/// Market availability of a listing, independent of moderation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyStatus {
    #[default]
    Available,
    Sold,
    Rented,
}

labelled_enum!(PropertyStatus {
    Available => "available",
    Sold => "sold",
    Rented => "rented",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FurnishingStatus {
    Furnished,
    SemiFurnished,
    Unfurnished,
}

labelled_enum!(FurnishingStatus {
    Furnished => "furnished",
    SemiFurnished => "semi-furnished",
    Unfurnished => "unfurnished",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    User,
    Dealer,
    Admin,
}

labelled_enum!(UserRole {
    User => "user",
    Dealer => "dealer",
    Admin => "admin",
});

/// One profile per identity. `approval_status` only gates dealers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub approval_status: ApprovalStatus,
    pub agency_name: Option<String>,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Dealers start out pending; every other role is usable immediately.
    pub fn new(id: UserId, role: UserRole, details: ProfileChanges, now: DateTime<Utc>) -> Self {
        let approval_status = match role {
            UserRole::Dealer => ApprovalStatus::Pending,
            UserRole::User | UserRole::Admin => ApprovalStatus::Approved,
        };

        let mut profile = Self {
            id,
            full_name: None,
            phone: None,
            role,
            approval_status,
            agency_name: None,
            bio: None,
            profile_image: None,
            created_at: now,
            updated_at: now,
        };
        details.apply(&mut profile, now);
        profile
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_dealer(&self) -> bool {
        self.role == UserRole::Dealer
    }

    pub fn public_contact(&self) -> OwnerContact {
        OwnerContact {
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            agency_name: self.agency_name.clone(),
        }
    }
}

/// Self-service profile fields. Absent fields are left alone; a blank string
/// clears the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileChanges {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub agency_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl ProfileChanges {
    pub fn apply(self, profile: &mut Profile, now: DateTime<Utc>) {
        if self.full_name.is_some() {
            profile.full_name = non_blank(self.full_name);
        }
        if self.phone.is_some() {
            profile.phone = non_blank(self.phone);
        }
        if self.agency_name.is_some() {
            profile.agency_name = non_blank(self.agency_name);
        }
        if self.bio.is_some() {
            profile.bio = non_blank(self.bio);
        }
        profile.updated_at = now;
    }
}

/// Owner fields exposed alongside a public listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContact {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub agency_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    #[serde(rename = "user_id")]
    pub owner_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub property_type: PropertyType,
    pub price: Option<u64>,
    pub city: String,
    pub area: Option<String>,
    pub address: Option<String>,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<u32>,
    pub furnishing: Option<FurnishingStatus>,
    pub status: PropertyStatus,
    pub approval_status: ApprovalStatus,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Listing fields supplied by a dealer when creating a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub property_type: PropertyType,
    #[serde(default)]
    pub price: Option<u64>,
    pub city: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<u32>,
    #[serde(default)]
    pub furnishing: Option<FurnishingStatus>,
}

impl PropertyDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.city.trim().is_empty() {
            return Err(ValidationError::MissingField("city"));
        }
        Ok(())
    }

    /// New listings always enter moderation as pending, whoever creates them.
    pub fn into_property(
        self,
        owner_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Property, ValidationError> {
        self.validate()?;

        Ok(Property {
            id: PropertyId::new(),
            owner_id,
            title: self.title.trim().to_string(),
            description: non_blank(self.description),
            property_type: self.property_type,
            price: self.price,
            city: self.city.trim().to_string(),
            area: non_blank(self.area),
            address: non_blank(self.address),
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            furnishing: self.furnishing,
            status: PropertyStatus::Available,
            approval_status: ApprovalStatus::Pending,
            featured: false,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update applied by an owner or admin. Moderation fields are not
/// part of it; those go through the moderation service.
///
/// Absent fields are left alone. Optional text fields clear on a blank
/// string; price, rooms and furnishing clear on an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub property_type: Option<PropertyType>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub price: Option<Option<u64>>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<Option<u32>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<Option<u32>>,
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Option::is_none")]
    pub furnishing: Option<Option<FurnishingStatus>>,
    #[serde(default)]
    pub status: Option<PropertyStatus>,
}

impl PropertyChanges {
    pub fn apply(self, property: &mut Property, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if let Some(title) = self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(ValidationError::MissingField("title"));
            }
            property.title = title.to_string();
        }
        if let Some(city) = self.city {
            let city = city.trim();
            if city.is_empty() {
                return Err(ValidationError::MissingField("city"));
            }
            property.city = city.to_string();
        }
        if self.description.is_some() {
            property.description = non_blank(self.description);
        }
        if self.area.is_some() {
            property.area = non_blank(self.area);
        }
        if self.address.is_some() {
            property.address = non_blank(self.address);
        }
        if let Some(property_type) = self.property_type {
            property.property_type = property_type;
        }
        if let Some(price) = self.price {
            property.price = price;
        }
        if let Some(bedrooms) = self.bedrooms {
            property.bedrooms = bedrooms;
        }
        if let Some(bathrooms) = self.bathrooms {
            property.bathrooms = bathrooms;
        }
        if let Some(furnishing) = self.furnishing {
            property.furnishing = furnishing;
        }
        if let Some(status) = self.status {
            property.status = status;
        }
        property.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyImage {
    pub id: ImageId,
    pub property_id: PropertyId,
    pub image_url: String,
    pub display_order: u32,
    pub created_at: DateTime<Utc>,
}

/// Saved listing; (user_id, property_id) is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: FavoriteId,
    pub user_id: UserId,
    pub property_id: PropertyId,
    pub created_at: DateTime<Utc>,
}

impl Favorite {
    pub fn new(user_id: UserId, property_id: PropertyId, now: DateTime<Utc>) -> Self {
        Self {
            id: FavoriteId::new(),
            user_id,
            property_id,
            created_at: now,
        }
    }
}

/// Append-only "phone number revealed" event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: ContactId,
    pub property_id: PropertyId,
    pub user_id: UserId,
    pub contacted_at: DateTime<Utc>,
}

/// Input rejected before anything reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("the {0} role cannot be self-assigned")]
    RoleNotSelfAssignable(UserRole),
    #[error("'{file_name}' is not a supported image file")]
    UnsupportedImage { file_name: String },
    #[error("profile {0} does not belong to a dealer")]
    NotADealer(UserId),
}

/// Keeps an explicit `null` apart from an absent field: absent is `None`,
/// `null` is `Some(None)`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PropertyDraft {
        PropertyDraft {
            title: "  Corner house in DHA  ".to_string(),
            description: Some("   ".to_string()),
            property_type: PropertyType::House,
            price: Some(12_500_000),
            city: "Karachi".to_string(),
            area: Some("DHA Phase 6".to_string()),
            address: None,
            bedrooms: Some(4),
            bathrooms: Some(3),
            furnishing: Some(FurnishingStatus::SemiFurnished),
        }
    }

    #[test]
    fn enumerations_use_store_spelling() {
        assert_eq!(
            serde_json::to_value(FurnishingStatus::SemiFurnished).expect("serializes"),
            "semi-furnished"
        );
        assert_eq!(
            "semi-furnished".parse::<FurnishingStatus>(),
            Ok(FurnishingStatus::SemiFurnished)
        );
        assert_eq!(
            serde_json::to_value(ApprovalStatus::Rejected).expect("serializes"),
            "rejected"
        );
        assert_eq!("commercial".parse::<PropertyType>(), Ok(PropertyType::Commercial));
        assert!("villa".parse::<PropertyType>().is_err());
        assert_eq!(UserRole::ALL.len(), 3);
        assert_eq!(PropertyStatus::default(), PropertyStatus::Available);
    }

    #[test]
    fn draft_enters_moderation_as_pending() {
        let owner = UserId::new();
        let now = Utc::now();
        let property = draft().into_property(owner, now).expect("valid draft");

        assert_eq!(property.owner_id, owner);
        assert_eq!(property.approval_status, ApprovalStatus::Pending);
        assert_eq!(property.status, PropertyStatus::Available);
        assert!(!property.featured);
        assert_eq!(property.title, "Corner house in DHA");
        assert_eq!(property.description, None);
    }

    #[test]
    fn draft_requires_title_and_city() {
        let mut missing_title = draft();
        missing_title.title = " ".to_string();
        assert_eq!(
            missing_title.validate(),
            Err(ValidationError::MissingField("title"))
        );

        let mut missing_city = draft();
        missing_city.city = String::new();
        assert_eq!(
            missing_city.validate(),
            Err(ValidationError::MissingField("city"))
        );
    }

    #[test]
    fn property_changes_cannot_blank_required_fields() {
        let mut property = draft()
            .into_property(UserId::new(), Utc::now())
            .expect("valid draft");
        let changes = PropertyChanges {
            city: Some("  ".to_string()),
            ..PropertyChanges::default()
        };

        assert_eq!(
            changes.apply(&mut property, Utc::now()),
            Err(ValidationError::MissingField("city"))
        );
        assert_eq!(property.city, "Karachi");
    }

    #[test]
    fn property_changes_clear_numbers_only_on_explicit_null() {
        let mut property = draft()
            .into_property(UserId::new(), Utc::now())
            .expect("valid draft");

        let untouched: PropertyChanges =
            serde_json::from_value(serde_json::json!({ "title": "Renamed" })).expect("parses");
        untouched.apply(&mut property, Utc::now()).expect("applies");
        assert_eq!(property.price, Some(12_500_000));
        assert_eq!(property.bedrooms, Some(4));

        let cleared: PropertyChanges = serde_json::from_value(serde_json::json!({
            "price": null,
            "furnishing": null,
            "bathrooms": 2,
        }))
        .expect("parses");
        assert_eq!(cleared.price, Some(None));
        cleared.apply(&mut property, Utc::now()).expect("applies");

        assert_eq!(property.price, None);
        assert_eq!(property.furnishing, None);
        assert_eq!(property.bathrooms, Some(2));
        assert_eq!(property.bedrooms, Some(4));
    }

    #[test]
    fn profile_changes_leave_absent_fields_alone() {
        let now = Utc::now();
        let mut profile = Profile::new(
            UserId::new(),
            UserRole::Dealer,
            ProfileChanges {
                full_name: Some("Bilal Ahmed".to_string()),
                phone: Some("+92 321 0000000".to_string()),
                agency_name: Some("Karachi Estates".to_string()),
                bio: None,
            },
            now,
        );

        let changes: ProfileChanges =
            serde_json::from_value(serde_json::json!({ "bio": "DHA specialist", "phone": "" }))
                .expect("parses");
        changes.apply(&mut profile, now);

        assert_eq!(profile.full_name.as_deref(), Some("Bilal Ahmed"));
        assert_eq!(profile.agency_name.as_deref(), Some("Karachi Estates"));
        assert_eq!(profile.bio.as_deref(), Some("DHA specialist"));
        assert_eq!(profile.phone, None);
    }

    #[test]
    fn dealer_profiles_start_pending() {
        let now = Utc::now();
        let dealer = Profile::new(UserId::new(), UserRole::Dealer, ProfileChanges::default(), now);
        let user = Profile::new(UserId::new(), UserRole::User, ProfileChanges::default(), now);

        assert_eq!(dealer.approval_status, ApprovalStatus::Pending);
        assert_eq!(user.approval_status, ApprovalStatus::Approved);
    }

    #[test]
    fn property_serializes_owner_as_user_id() {
        let property = draft()
            .into_property(UserId::new(), Utc::now())
            .expect("valid draft");
        let value = serde_json::to_value(&property).expect("serializes");
        assert_eq!(value["user_id"], serde_json::json!(property.owner_id));
        assert_eq!(value["approval_status"], "pending");
    }
}
