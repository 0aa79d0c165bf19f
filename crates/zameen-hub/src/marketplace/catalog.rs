use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::approval::{require_manager, require_publisher, visible_to};
use super::domain::{
    ContactId, ContactRecord, Favorite, ImageId, OwnerContact, Profile, Property, PropertyChanges,
    PropertyDraft, PropertyId, PropertyImage, UserId,
};
use super::error::MarketplaceError;
use super::listing::{hydrate, hydrate_one, ListingFilter, ListingQuery, ListingView, StatusFilter};
use super::repository::{MarketplaceStore, RepositoryError};
use super::storage::{ImageUpload, ObjectStorage, PROPERTY_IMAGES_BUCKET};

/// Listings, images, favorites and contact reveals.
pub struct CatalogService<S, O> {
    store: Arc<S>,
    storage: Arc<O>,
}

impl<S, O> CatalogService<S, O>
where
    S: MarketplaceStore + 'static,
    O: ObjectStorage + 'static,
{
    pub fn new(store: Arc<S>, storage: Arc<O>) -> Self {
        Self { store, storage }
    }

    /// Public browse: approved listings matching every supplied filter.
    pub fn search(&self, filter: ListingFilter) -> Result<Vec<ListingView>, MarketplaceError> {
        let properties = self.store.query_properties(&ListingQuery::public(filter))?;
        Ok(hydrate(self.store.as_ref(), properties)?)
    }

    /// Unapproved listings read as missing to everyone but their owner and admins.
    pub fn get_listing(
        &self,
        viewer: Option<&Profile>,
        id: &PropertyId,
    ) -> Result<ListingView, MarketplaceError> {
        let property = self.visible_property(viewer, id)?;
        Ok(hydrate_one(self.store.as_ref(), property)?)
    }

    /// Approved listings among `ids`, in the order given. Unknown ids are skipped.
    pub fn lookup_public(&self, ids: &[PropertyId]) -> Result<Vec<ListingView>, MarketplaceError> {
        let properties = self
            .store
            .fetch_properties(ids)?
            .into_iter()
            .filter(|property| visible_to(property, None))
            .collect();
        Ok(hydrate(self.store.as_ref(), properties)?)
    }

    /// Dealer dashboard: the actor's own listings in any approval state.
    pub fn owner_listings(
        &self,
        actor: &Profile,
        status: StatusFilter,
    ) -> Result<Vec<ListingView>, MarketplaceError> {
        let properties = self
            .store
            .query_properties(&ListingQuery::owner(actor.id, status))?;
        Ok(hydrate(self.store.as_ref(), properties)?)
    }

    /// Creates a pending listing and uploads its photos.
    ///
    /// Every image must look like one before anything is written. A photo
    /// whose upload fails afterwards is logged and skipped; the listing is
    /// kept either way.
    pub fn create_listing(
        &self,
        actor: &Profile,
        draft: PropertyDraft,
        images: Vec<ImageUpload>,
    ) -> Result<ListingView, MarketplaceError> {
        require_publisher(actor)?;
        draft.validate()?;
        let content_types = images
            .iter()
            .map(ImageUpload::content_type)
            .collect::<Result<Vec<_>, _>>()?;

        let now = Utc::now();
        let property = self
            .store
            .insert_property(draft.into_property(actor.id, now)?)?;

        let mut rows = Vec::with_capacity(images.len());
        for (index, (upload, content_type)) in images.into_iter().zip(content_types).enumerate() {
            let path = upload.object_path(&actor.id, &property.id, now, index);
            if let Err(error) =
                self.storage
                    .upload(PROPERTY_IMAGES_BUCKET, &path, &content_type, upload.bytes)
            {
                warn!(property = %property.id, %path, %error, "image upload failed; skipping");
                continue;
            }
            rows.push(PropertyImage {
                id: ImageId::new(),
                property_id: property.id,
                image_url: self.storage.public_url(PROPERTY_IMAGES_BUCKET, &path),
                display_order: index as u32,
                created_at: now,
            });
        }

        let uploaded = rows.len();
        if !rows.is_empty() {
            if let Err(error) = self.store.insert_images(rows) {
                warn!(property = %property.id, %error, "image rows not recorded");
            }
        }

        info!(property = %property.id, owner = %actor.id, images = uploaded, "listing submitted for approval");
        Ok(hydrate_one(self.store.as_ref(), property)?)
    }

    /// Owner or admin edit. Moderation fields are untouched.
    pub fn update_listing(
        &self,
        actor: &Profile,
        id: &PropertyId,
        changes: PropertyChanges,
    ) -> Result<ListingView, MarketplaceError> {
        let mut property = self.existing_property(id)?;
        require_manager(actor, &property)?;

        changes.apply(&mut property, Utc::now())?;
        self.store.update_property(property.clone())?;
        Ok(hydrate_one(self.store.as_ref(), property)?)
    }

    /// Owner or admin delete; cascades to images, favorites and contacts.
    /// Deleting a listing that no longer exists is a no-op returning `false`.
    pub fn delete_listing(&self, actor: &Profile, id: &PropertyId) -> Result<bool, MarketplaceError> {
        let Some(property) = self.store.fetch_property(id)? else {
            return Ok(false);
        };
        require_manager(actor, &property)?;

        let deleted = self.store.delete_property(id)?;
        info!(property = %id, actor = %actor.id, "listing deleted");
        Ok(deleted)
    }

    /// Returns `false` when the listing was already saved.
    pub fn save_favorite(&self, user: &Profile, id: &PropertyId) -> Result<bool, MarketplaceError> {
        self.visible_property(Some(user), id)?;
        let favorite = Favorite::new(user.id, *id, Utc::now());
        match self.store.insert_favorites(vec![favorite]) {
            Ok(()) => Ok(true),
            Err(RepositoryError::Conflict) => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    /// Returns `false` when the listing was not saved.
    pub fn remove_favorite(
        &self,
        user: &UserId,
        id: &PropertyId,
    ) -> Result<bool, MarketplaceError> {
        Ok(self.store.delete_favorite(user, id)?)
    }

    /// Flips the saved state; returns whether the listing is now saved.
    pub fn toggle_favorite(&self, user: &Profile, id: &PropertyId) -> Result<bool, MarketplaceError> {
        if self.is_favorite(&user.id, id)? {
            self.remove_favorite(&user.id, id)?;
            Ok(false)
        } else {
            self.save_favorite(user, id)?;
            Ok(true)
        }
    }

    pub fn is_favorite(&self, user: &UserId, id: &PropertyId) -> Result<bool, MarketplaceError> {
        Ok(self.store.favorite_property_ids(user)?.contains(id))
    }

    /// Most recently saved first; listings that have since left the public
    /// catalog are only kept for their owner and admins.
    pub fn saved_listings(&self, user: &Profile) -> Result<Vec<ListingView>, MarketplaceError> {
        let mut ids = self.store.favorite_property_ids(&user.id)?;
        ids.reverse();
        let properties = self
            .store
            .fetch_properties(&ids)?
            .into_iter()
            .filter(|property| visible_to(property, Some(user)))
            .collect();
        Ok(hydrate(self.store.as_ref(), properties)?)
    }

    /// Logs the reveal and hands back the owner's public contact fields.
    pub fn reveal_contact(
        &self,
        user: &Profile,
        id: &PropertyId,
    ) -> Result<OwnerContact, MarketplaceError> {
        let property = self.visible_property(Some(user), id)?;
        let owner = self
            .store
            .fetch_profile(&property.owner_id)?
            .ok_or(MarketplaceError::NotFound("owner"))?;

        self.store.insert_contact(ContactRecord {
            id: ContactId::new(),
            property_id: property.id,
            user_id: user.id,
            contacted_at: Utc::now(),
        })?;
        info!(property = %property.id, user = %user.id, "owner contact revealed");
        Ok(owner.public_contact())
    }

    fn existing_property(&self, id: &PropertyId) -> Result<Property, MarketplaceError> {
        self.store
            .fetch_property(id)?
            .ok_or(MarketplaceError::NotFound("property"))
    }

    fn visible_property(
        &self,
        viewer: Option<&Profile>,
        id: &PropertyId,
    ) -> Result<Property, MarketplaceError> {
        let property = self.existing_property(id)?;
        if visible_to(&property, viewer) {
            Ok(property)
        } else {
            Err(MarketplaceError::NotFound("property"))
        }
    }
}
