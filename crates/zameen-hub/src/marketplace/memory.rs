//! In-process adapters for the store, identity and storage seams.
//!
//! They mirror the hosted backend's relational guarantees: foreign keys on
//! insert, unique favorites, and cascading deletes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::Utc;
use uuid::Uuid;

use super::domain::{
    ContactRecord, Favorite, Profile, Property, PropertyId, PropertyImage, UserId,
};
use super::identity::{IdentityError, IdentityProvider, ServiceRoleKey, Session, SessionToken};
use super::listing::ListingQuery;
use super::repository::{
    ContactRepository, FavoriteRepository, ProfileFilter, ProfileRepository, PropertyRepository,
    RepositoryError,
};
use super::storage::{ObjectStorage, StorageError};

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<UserId, Profile>,
    properties: HashMap<PropertyId, Property>,
    images: Vec<PropertyImage>,
    favorites: Vec<Favorite>,
    contacts: Vec<ContactRecord>,
}

impl Tables {
    fn remove_property(&mut self, id: &PropertyId) -> bool {
        let existed = self.properties.remove(id).is_some();
        self.images.retain(|image| image.property_id != *id);
        self.favorites.retain(|favorite| favorite.property_id != *id);
        self.contacts.retain(|contact| contact.property_id != *id);
        existed
    }
}

/// Relational store held in memory behind a single lock.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().expect("store mutex poisoned")
    }
}

impl ProfileRepository for InMemoryStore {
    fn insert_profile(&self, profile: Profile) -> Result<Profile, RepositoryError> {
        let mut tables = self.tables();
        if tables.profiles.contains_key(&profile.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.profiles.insert(profile.id, profile.clone());
        Ok(profile)
    }

    fn update_profile(&self, profile: Profile) -> Result<(), RepositoryError> {
        let mut tables = self.tables();
        match tables.profiles.get_mut(&profile.id) {
            Some(existing) => {
                *existing = profile;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_profile(&self, id: &UserId) -> Result<Option<Profile>, RepositoryError> {
        Ok(self.tables().profiles.get(id).cloned())
    }

    fn list_profiles(&self, filter: &ProfileFilter) -> Result<Vec<Profile>, RepositoryError> {
        let mut profiles: Vec<Profile> = self
            .tables()
            .profiles
            .values()
            .filter(|profile| filter.matches(profile))
            .cloned()
            .collect();
        profiles.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(profiles)
    }

    fn delete_profile(&self, id: &UserId) -> Result<bool, RepositoryError> {
        let mut tables = self.tables();
        let existed = tables.profiles.remove(id).is_some();

        let owned: Vec<PropertyId> = tables
            .properties
            .values()
            .filter(|property| property.owner_id == *id)
            .map(|property| property.id)
            .collect();
        for property in &owned {
            tables.remove_property(property);
        }
        tables.favorites.retain(|favorite| favorite.user_id != *id);
        tables.contacts.retain(|contact| contact.user_id != *id);
        Ok(existed)
    }
}

impl PropertyRepository for InMemoryStore {
    fn insert_property(&self, property: Property) -> Result<Property, RepositoryError> {
        let mut tables = self.tables();
        if !tables.profiles.contains_key(&property.owner_id) {
            return Err(RepositoryError::NotFound);
        }
        if tables.properties.contains_key(&property.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.properties.insert(property.id, property.clone());
        Ok(property)
    }

    fn update_property(&self, property: Property) -> Result<(), RepositoryError> {
        let mut tables = self.tables();
        match tables.properties.get_mut(&property.id) {
            Some(existing) => {
                *existing = property;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_property(&self, id: &PropertyId) -> Result<Option<Property>, RepositoryError> {
        Ok(self.tables().properties.get(id).cloned())
    }

    fn fetch_properties(&self, ids: &[PropertyId]) -> Result<Vec<Property>, RepositoryError> {
        let tables = self.tables();
        Ok(ids
            .iter()
            .filter_map(|id| tables.properties.get(id).cloned())
            .collect())
    }

    fn query_properties(&self, query: &ListingQuery) -> Result<Vec<Property>, RepositoryError> {
        let tables = self.tables();
        Ok(query.apply(tables.properties.values().cloned()))
    }

    fn delete_property(&self, id: &PropertyId) -> Result<bool, RepositoryError> {
        Ok(self.tables().remove_property(id))
    }

    fn insert_images(&self, images: Vec<PropertyImage>) -> Result<(), RepositoryError> {
        let mut tables = self.tables();
        if images
            .iter()
            .any(|image| !tables.properties.contains_key(&image.property_id))
        {
            return Err(RepositoryError::NotFound);
        }
        tables.images.extend(images);
        Ok(())
    }

    fn images_for(&self, property: &PropertyId) -> Result<Vec<PropertyImage>, RepositoryError> {
        let mut images: Vec<PropertyImage> = self
            .tables()
            .images
            .iter()
            .filter(|image| image.property_id == *property)
            .cloned()
            .collect();
        images.sort_by_key(|image| image.display_order);
        Ok(images)
    }
}

impl FavoriteRepository for InMemoryStore {
    fn favorite_property_ids(&self, user: &UserId) -> Result<Vec<PropertyId>, RepositoryError> {
        let tables = self.tables();
        let mut favorites: Vec<&Favorite> = tables
            .favorites
            .iter()
            .filter(|favorite| favorite.user_id == *user)
            .collect();
        favorites.sort_by_key(|favorite| favorite.created_at);
        Ok(favorites.iter().map(|favorite| favorite.property_id).collect())
    }

    fn insert_favorites(&self, favorites: Vec<Favorite>) -> Result<(), RepositoryError> {
        let mut tables = self.tables();

        let mut seen: HashSet<(UserId, PropertyId)> = tables
            .favorites
            .iter()
            .map(|favorite| (favorite.user_id, favorite.property_id))
            .collect();
        for favorite in &favorites {
            if !tables.properties.contains_key(&favorite.property_id) {
                return Err(RepositoryError::NotFound);
            }
            if !seen.insert((favorite.user_id, favorite.property_id)) {
                return Err(RepositoryError::Conflict);
            }
        }

        tables.favorites.extend(favorites);
        Ok(())
    }

    fn delete_favorite(
        &self,
        user: &UserId,
        property: &PropertyId,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables();
        let before = tables.favorites.len();
        tables
            .favorites
            .retain(|favorite| !(favorite.user_id == *user && favorite.property_id == *property));
        Ok(tables.favorites.len() != before)
    }
}

impl ContactRepository for InMemoryStore {
    fn insert_contact(&self, contact: ContactRecord) -> Result<ContactRecord, RepositoryError> {
        let mut tables = self.tables();
        if !tables.properties.contains_key(&contact.property_id) {
            return Err(RepositoryError::NotFound);
        }
        tables.contacts.push(contact.clone());
        Ok(contact)
    }

    fn contacts_for(&self, property: &PropertyId) -> Result<Vec<ContactRecord>, RepositoryError> {
        Ok(self
            .tables()
            .contacts
            .iter()
            .filter(|contact| contact.property_id == *property)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone)]
struct Account {
    user_id: UserId,
    password_hash: String,
}

#[derive(Debug, Default)]
struct IdentityState {
    accounts: HashMap<String, Account>,
    sessions: HashMap<SessionToken, UserId>,
}

/// Email/password identities with argon2 password hashes and opaque sessions.
#[derive(Debug, Clone)]
pub struct InMemoryIdentityProvider {
    state: Arc<Mutex<IdentityState>>,
    service_key: ServiceRoleKey,
    params: Params,
}

impl InMemoryIdentityProvider {
    pub fn new(service_key: ServiceRoleKey) -> Self {
        Self::with_params(service_key, Params::default())
    }

    /// Custom argon2 cost parameters; tests use the minimum to stay fast.
    pub fn with_params(service_key: ServiceRoleKey, params: Params) -> Self {
        Self {
            state: Arc::new(Mutex::new(IdentityState::default())),
            service_key,
            params,
        }
    }

    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }

    fn state(&self) -> MutexGuard<'_, IdentityState> {
        self.state.lock().expect("identity mutex poisoned")
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn hash_password(&self, password: &str) -> Result<String, IdentityError> {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
            .map_err(|error| IdentityError::Unavailable(error.to_string()))?;
        self.hasher()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|error| IdentityError::Unavailable(error.to_string()))
    }

    fn verify_password(&self, password: &str, hash: &str) -> Result<bool, IdentityError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|error| IdentityError::Unavailable(error.to_string()))?;
        Ok(self
            .hasher()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl IdentityProvider for InMemoryIdentityProvider {
    fn sign_up(&self, email: &str, password: &str) -> Result<UserId, IdentityError> {
        let email = normalize_email(email);
        if self.state().accounts.contains_key(&email) {
            return Err(IdentityError::EmailTaken);
        }

        // Hash outside the lock; re-check on insert.
        let password_hash = self.hash_password(password)?;
        let mut state = self.state();
        if state.accounts.contains_key(&email) {
            return Err(IdentityError::EmailTaken);
        }
        let user_id = UserId::new();
        state.accounts.insert(
            email,
            Account {
                user_id,
                password_hash,
            },
        );
        Ok(user_id)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let account = self
            .state()
            .accounts
            .get(&normalize_email(email))
            .cloned()
            .ok_or(IdentityError::InvalidCredentials)?;

        if !self.verify_password(password, &account.password_hash)? {
            return Err(IdentityError::InvalidCredentials);
        }

        let session = Session {
            token: SessionToken::generate(),
            user_id: account.user_id,
            issued_at: Utc::now(),
        };
        self.state()
            .sessions
            .insert(session.token.clone(), account.user_id);
        Ok(session)
    }

    fn sign_out(&self, token: &SessionToken) -> Result<(), IdentityError> {
        self.state().sessions.remove(token);
        Ok(())
    }

    fn resolve(&self, token: &SessionToken) -> Result<Option<UserId>, IdentityError> {
        Ok(self.state().sessions.get(token).copied())
    }

    fn delete_identity(
        &self,
        credential: &ServiceRoleKey,
        user: &UserId,
    ) -> Result<(), IdentityError> {
        if *credential != self.service_key {
            return Err(IdentityError::Forbidden);
        }

        let mut state = self.state();
        let before = state.accounts.len();
        state.accounts.retain(|_, account| account.user_id != *user);
        if state.accounts.len() == before {
            return Err(IdentityError::NotFound);
        }
        state.sessions.retain(|_, owner| owner != user);
        Ok(())
    }
}

/// Object bytes and the content type they were uploaded with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Bucketed object storage; uploads never overwrite.
#[derive(Debug, Clone)]
pub struct InMemoryObjectStorage {
    base_url: String,
    objects: Arc<Mutex<HashMap<(String, String), StoredObject>>>,
}

impl InMemoryObjectStorage {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .expect("storage mutex poisoned")
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().expect("storage mutex poisoned").len()
    }
}

impl ObjectStorage for InMemoryObjectStorage {
    fn upload(
        &self,
        bucket: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        let mut objects = self.objects.lock().expect("storage mutex poisoned");
        let key = (bucket.to_string(), path.to_string());
        if objects.contains_key(&key) {
            return Err(StorageError::AlreadyExists(format!("{bucket}/{path}")));
        }
        objects.insert(
            key,
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{bucket}/{path}", self.base_url)
    }
}
