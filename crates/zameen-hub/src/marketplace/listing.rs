//! Listing query/filter layer.
//!
//! A [`ListingQuery`] pairs an approval scope with the optional, AND-combined
//! filters a visitor picks. The scope is always applied first: public queries
//! only ever see approved listings, whatever the filters say.

use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::domain::{
    ApprovalStatus, FurnishingStatus, OwnerContact, Property, PropertyImage, PropertyType, UserId,
};
use super::repository::{ProfileRepository, PropertyRepository, RepositoryError};

/// Sort applied to a listing query. Newest first unless asked otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "created_at")]
    Newest,
    #[serde(rename = "price_asc")]
    PriceAscending,
    #[serde(rename = "price_desc")]
    PriceDescending,
}

impl SortOrder {
    pub const fn label(self) -> &'static str {
        match self {
            SortOrder::Newest => "created_at",
            SortOrder::PriceAscending => "price_asc",
            SortOrder::PriceDescending => "price_desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "created_at" => Ok(SortOrder::Newest),
            "price_asc" => Ok(SortOrder::PriceAscending),
            "price_desc" => Ok(SortOrder::PriceDescending),
            other => Err(format!("'{other}' is not a valid sort order")),
        }
    }
}

/// Visitor-selected filters, as sent in the query string
/// (`propertyType`, `city`, `minPrice`, `maxPrice`, `bedrooms`, `furnishing`,
/// `sortBy`, plus `limit`/`offset`). Blank parameters mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingFilter {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub property_type: Option<PropertyType>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub min_price: Option<u64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub max_price: Option<u64>,
    #[serde(default, rename = "bedrooms", deserialize_with = "blank_as_none")]
    pub min_bedrooms: Option<u32>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub furnishing: Option<FurnishingStatus>,
    #[serde(default, deserialize_with = "blank_as_default")]
    pub sort_by: SortOrder,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub limit: Option<usize>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub offset: Option<usize>,
}

impl ListingFilter {
    pub fn matches(&self, property: &Property) -> bool {
        if let Some(property_type) = self.property_type {
            if property.property_type != property_type {
                return false;
            }
        }
        if let Some(city) = self.city.as_deref().map(str::trim) {
            if !city.is_empty() && property.city != city {
                return false;
            }
        }
        // Unpriced listings never satisfy a price bound.
        if let Some(min_price) = self.min_price {
            if !property.price.is_some_and(|price| price >= min_price) {
                return false;
            }
        }
        if let Some(max_price) = self.max_price {
            if !property.price.is_some_and(|price| price <= max_price) {
                return false;
            }
        }
        if let Some(min_bedrooms) = self.min_bedrooms {
            if !property.bedrooms.is_some_and(|bedrooms| bedrooms >= min_bedrooms) {
                return false;
            }
        }
        if let Some(furnishing) = self.furnishing {
            if property.furnishing != Some(furnishing) {
                return false;
            }
        }
        true
    }
}

/// Moderation view selector used by dashboards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    Pending,
    Approved,
    Rejected,
    #[default]
    All,
}

impl StatusFilter {
    pub fn matches(self, status: ApprovalStatus) -> bool {
        match self {
            StatusFilter::Pending => status == ApprovalStatus::Pending,
            StatusFilter::Approved => status == ApprovalStatus::Approved,
            StatusFilter::Rejected => status == ApprovalStatus::Rejected,
            StatusFilter::All => true,
        }
    }

    fn as_status(self) -> Option<ApprovalStatus> {
        match self {
            StatusFilter::Pending => Some(ApprovalStatus::Pending),
            StatusFilter::Approved => Some(ApprovalStatus::Approved),
            StatusFilter::Rejected => Some(ApprovalStatus::Rejected),
            StatusFilter::All => None,
        }
    }
}

/// Which slice of the properties table a query may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingScope {
    /// Anonymous and signed-in browsing: approved listings only.
    Public,
    /// A dealer's own dashboard.
    Owner { owner: UserId, status: StatusFilter },
    /// Admin moderation queue.
    Moderation { status: StatusFilter },
}

impl ListingScope {
    pub fn admits(&self, property: &Property) -> bool {
        match self {
            ListingScope::Public => property.approval_status == ApprovalStatus::Approved,
            ListingScope::Owner { owner, status } => {
                property.owner_id == *owner && status.matches(property.approval_status)
            }
            ListingScope::Moderation { status } => status.matches(property.approval_status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub scope: ListingScope,
    pub filter: ListingFilter,
}

impl ListingQuery {
    pub fn public(filter: ListingFilter) -> Self {
        Self {
            scope: ListingScope::Public,
            filter,
        }
    }

    pub fn owner(owner: UserId, status: StatusFilter) -> Self {
        Self {
            scope: ListingScope::Owner { owner, status },
            filter: ListingFilter::default(),
        }
    }

    pub fn moderation(status: StatusFilter) -> Self {
        Self {
            scope: ListingScope::Moderation { status },
            filter: ListingFilter::default(),
        }
    }

    pub fn matches(&self, property: &Property) -> bool {
        self.scope.admits(property) && self.filter.matches(property)
    }

    /// Filters, sorts and paginates an unordered candidate set.
    pub fn apply<I>(&self, candidates: I) -> Vec<Property>
    where
        I: IntoIterator<Item = Property>,
    {
        let mut matching: Vec<Property> = candidates
            .into_iter()
            .filter(|property| self.matches(property))
            .collect();
        matching.sort_by(|left, right| self.compare(left, right));

        let offset = self.filter.offset.unwrap_or(0);
        let limit = self.filter.limit.unwrap_or(usize::MAX);
        matching.into_iter().skip(offset).take(limit).collect()
    }

    /// Postgres ordering: unpriced rows sort last ascending and first
    /// descending; ties fall back to newest first.
    fn compare(&self, left: &Property, right: &Property) -> Ordering {
        let newest = right
            .created_at
            .cmp(&left.created_at)
            .then_with(|| left.id.cmp(&right.id));

        match self.filter.sort_by {
            SortOrder::Newest => newest,
            SortOrder::PriceAscending => match (left.price, right.price) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then(newest),
            SortOrder::PriceDescending => match (left.price, right.price) {
                (Some(a), Some(b)) => b.cmp(&a),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            }
            .then(newest),
        }
    }

    /// Renders the query as PostgREST parameters for a hosted-store adapter.
    pub fn to_postgrest_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        let mut push = |column: &str, value: String| params.push((column.to_string(), value));

        match self.scope {
            ListingScope::Public => push("approval_status", "eq.approved".to_string()),
            ListingScope::Owner { owner, status } => {
                push("user_id", format!("eq.{owner}"));
                if let Some(status) = status.as_status() {
                    push("approval_status", format!("eq.{status}"));
                }
            }
            ListingScope::Moderation { status } => {
                if let Some(status) = status.as_status() {
                    push("approval_status", format!("eq.{status}"));
                }
            }
        }

        let filter = &self.filter;
        if let Some(property_type) = filter.property_type {
            push("property_type", format!("eq.{property_type}"));
        }
        if let Some(city) = filter.city.as_deref().map(str::trim) {
            if !city.is_empty() {
                push("city", format!("eq.{city}"));
            }
        }
        match (filter.min_price, filter.max_price) {
            (Some(min), Some(max)) => push("and", format!("(price.gte.{min},price.lte.{max})")),
            (Some(min), None) => push("price", format!("gte.{min}")),
            (None, Some(max)) => push("price", format!("lte.{max}")),
            (None, None) => {}
        }
        if let Some(bedrooms) = filter.min_bedrooms {
            push("bedrooms", format!("gte.{bedrooms}"));
        }
        if let Some(furnishing) = filter.furnishing {
            push("furnishing", format!("eq.{furnishing}"));
        }

        let order = match filter.sort_by {
            SortOrder::Newest => "created_at.desc",
            SortOrder::PriceAscending => "price.asc,created_at.desc",
            SortOrder::PriceDescending => "price.desc,created_at.desc",
        };
        push("order", order.to_string());

        if let Some(limit) = filter.limit {
            push("limit", limit.to_string());
        }
        if let Some(offset) = filter.offset {
            push("offset", offset.to_string());
        }
        params
    }
}

/// A property joined with its ordered images and the owner's public fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingView {
    #[serde(flatten)]
    pub property: Property,
    pub images: Vec<PropertyImage>,
    pub owner: Option<OwnerContact>,
}

pub(crate) fn hydrate<S>(
    store: &S,
    properties: Vec<Property>,
) -> Result<Vec<ListingView>, RepositoryError>
where
    S: PropertyRepository + ProfileRepository + ?Sized,
{
    properties
        .into_iter()
        .map(|property| hydrate_one(store, property))
        .collect()
}

pub(crate) fn hydrate_one<S>(store: &S, property: Property) -> Result<ListingView, RepositoryError>
where
    S: PropertyRepository + ProfileRepository + ?Sized,
{
    let images = store.images_for(&property.id)?;
    let owner = store
        .fetch_profile(&property.owner_id)?
        .map(|profile| profile.public_contact());
    Ok(ListingView {
        property,
        images,
        owner,
    })
}

fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn blank_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: Display,
{
    blank_as_none(deserializer).map(Option::unwrap_or_default)
}
