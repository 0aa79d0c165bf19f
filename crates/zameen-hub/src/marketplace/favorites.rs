//! Anonymous favorites and their merge into the account at sign-in.
//!
//! Visitors without a session keep saved listings in a key/value store under
//! [`FAVORITES_KEY`] as a JSON array of ids. Once they authenticate,
//! [`FavoritesMerge`] copies whatever the account does not already hold into
//! the favorites table and clears the local copy. A failed merge is logged and
//! leaves the local copy untouched so the next sign-in can try again; it never
//! fails the sign-in itself.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{Favorite, PropertyId, UserId};
use super::repository::{FavoriteRepository, PropertyRepository, RepositoryError};

pub const FAVORITES_KEY: &str = "zameenhub_favorites";

/// String key/value storage with browser `localStorage` semantics.
pub trait KeyValueStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStorageError>;
    fn set_item(&mut self, key: &str, value: String) -> Result<(), LocalStorageError>;
    fn remove_item(&mut self, key: &str) -> Result<(), LocalStorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LocalStorageError {
    #[error("local storage i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("local favorites could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    /// Storage pre-populated with a favorites array, as a client would send it.
    pub fn with_favorites(ids: impl IntoIterator<Item = PropertyId>) -> Self {
        let ids: Vec<PropertyId> = ids.into_iter().collect();
        let mut items = HashMap::new();
        if !ids.is_empty() {
            // Serializing uuids cannot fail.
            if let Ok(encoded) = serde_json::to_string(&ids) {
                items.insert(FAVORITES_KEY.to_string(), encoded);
            }
        }
        Self { items }
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStorageError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), LocalStorageError> {
        self.items.insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), LocalStorageError> {
        self.items.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per item inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, LocalStorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, LocalStorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), LocalStorageError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), LocalStorageError> {
        match fs::remove_file(self.path_for(key)) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => Err(error.into()),
            _ => Ok(()),
        }
    }
}

/// Ordered, duplicate-free list of saved property ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PropertyId>", into = "Vec<PropertyId>")]
pub struct LocalFavoriteSet {
    ids: Vec<PropertyId>,
}

impl LocalFavoriteSet {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: &PropertyId) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &[PropertyId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyId> {
        self.ids.iter()
    }

    /// Appends unless already present.
    pub fn insert(&mut self, id: PropertyId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn remove(&mut self, id: &PropertyId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|candidate| candidate != id);
        self.ids.len() != before
    }
}

impl From<Vec<PropertyId>> for LocalFavoriteSet {
    fn from(ids: Vec<PropertyId>) -> Self {
        ids.into_iter().collect()
    }
}

impl From<LocalFavoriteSet> for Vec<PropertyId> {
    fn from(set: LocalFavoriteSet) -> Self {
        set.ids
    }
}

impl FromIterator<PropertyId> for LocalFavoriteSet {
    fn from_iter<I: IntoIterator<Item = PropertyId>>(iter: I) -> Self {
        let mut set = LocalFavoriteSet::default();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// The anonymous visitor's favorites, persisted under [`FAVORITES_KEY`].
#[derive(Debug, Clone, Default)]
pub struct LocalFavorites<S> {
    storage: S,
}

impl<S: KeyValueStorage> LocalFavorites<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Missing, unreadable or corrupt content reads as an empty set.
    pub fn load(&self) -> LocalFavoriteSet {
        let raw = match self.storage.get_item(FAVORITES_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LocalFavoriteSet::default(),
            Err(error) => {
                warn!(%error, "local favorites unreadable; treating as empty");
                return LocalFavoriteSet::default();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|error| {
            warn!(%error, "local favorites corrupt; treating as empty");
            LocalFavoriteSet::default()
        })
    }

    pub fn contains(&self, id: &PropertyId) -> bool {
        self.load().contains(id)
    }

    pub fn add(&mut self, id: PropertyId) -> Result<bool, LocalStorageError> {
        let mut set = self.load();
        let added = set.insert(id);
        if added {
            self.save(&set)?;
        }
        Ok(added)
    }

    pub fn remove(&mut self, id: &PropertyId) -> Result<bool, LocalStorageError> {
        let mut set = self.load();
        let removed = set.remove(id);
        if removed {
            self.save(&set)?;
        }
        Ok(removed)
    }

    /// Flips membership and returns whether the id is now saved.
    pub fn toggle(&mut self, id: PropertyId) -> Result<bool, LocalStorageError> {
        if self.remove(&id)? {
            Ok(false)
        } else {
            self.add(id)
        }
    }

    pub fn clear(&mut self) -> Result<(), LocalStorageError> {
        self.storage.remove_item(FAVORITES_KEY)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    fn save(&mut self, set: &LocalFavoriteSet) -> Result<(), LocalStorageError> {
        let encoded = serde_json::to_string(set)?;
        self.storage.set_item(FAVORITES_KEY, encoded)
    }
}

/// Outcome of merging local favorites into an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeReport {
    /// Nothing saved locally; the store was not touched.
    Skipped,
    /// `inserted` new rows written and the local copy cleared.
    Merged { inserted: usize },
    /// The local copy was left in place for a later attempt.
    Failed,
}

impl MergeReport {
    /// Whether the client may drop its copy of the local favorites.
    pub fn local_cleared(self) -> bool {
        !matches!(self, MergeReport::Failed)
    }
}

/// Moves local favorites into the favorites table once a user signs in.
///
/// Local ids whose listing no longer exists are dropped from the batch so the
/// rest still merge and the local copy can be cleared.
pub struct FavoritesMerge<F: ?Sized, P: ?Sized = F> {
    favorites: Arc<F>,
    properties: Arc<P>,
}

impl<F: ?Sized, P: ?Sized> Clone for FavoritesMerge<F, P> {
    fn clone(&self) -> Self {
        Self {
            favorites: Arc::clone(&self.favorites),
            properties: Arc::clone(&self.properties),
        }
    }
}

impl<F, P> FavoritesMerge<F, P>
where
    F: FavoriteRepository + ?Sized,
    P: PropertyRepository + ?Sized,
{
    pub fn new(favorites: Arc<F>, properties: Arc<P>) -> Self {
        Self {
            favorites,
            properties,
        }
    }

    /// Never fails: errors are logged and reported as [`MergeReport::Failed`].
    pub fn merge<S: KeyValueStorage>(
        &self,
        local: &mut LocalFavorites<S>,
        user: &UserId,
    ) -> MergeReport {
        let pending = local.load();
        if pending.is_empty() {
            debug!(%user, "no local favorites to merge");
            return MergeReport::Skipped;
        }

        let inserted = match self.persist(&pending, user) {
            Ok(inserted) => inserted,
            Err(error) => {
                warn!(%user, %error, pending = pending.len(), "favorites merge failed");
                return MergeReport::Failed;
            }
        };

        if let Err(error) = local.clear() {
            warn!(%user, %error, "merged favorites but could not clear local copy");
            return MergeReport::Failed;
        }

        info!(%user, inserted, "merged local favorites");
        MergeReport::Merged { inserted }
    }

    fn persist(&self, pending: &LocalFavoriteSet, user: &UserId) -> Result<usize, RepositoryError> {
        match self.insert_missing(pending, user) {
            // Another merge for the same user won the race; recompute once.
            Err(RepositoryError::Conflict) => {
                debug!(%user, "favorites changed during merge; retrying");
                self.insert_missing(pending, user)
            }
            outcome => outcome,
        }
    }

    fn insert_missing(
        &self,
        pending: &LocalFavoriteSet,
        user: &UserId,
    ) -> Result<usize, RepositoryError> {
        let existing: HashSet<PropertyId> =
            self.favorites.favorite_property_ids(user)?.into_iter().collect();

        let candidates: Vec<PropertyId> = pending
            .iter()
            .filter(|id| !existing.contains(id))
            .copied()
            .collect();
        if candidates.is_empty() {
            return Ok(0);
        }

        let live: HashSet<PropertyId> = self
            .properties
            .fetch_properties(&candidates)?
            .into_iter()
            .map(|property| property.id)
            .collect();
        let (kept, gone): (Vec<PropertyId>, Vec<PropertyId>) =
            candidates.into_iter().partition(|id| live.contains(id));
        if !gone.is_empty() {
            warn!(%user, dropped = ?gone, "local favorites reference deleted listings");
        }
        if kept.is_empty() {
            return Ok(0);
        }

        let now = Utc::now();
        let missing: Vec<Favorite> = kept
            .into_iter()
            .map(|id| Favorite::new(*user, id, now))
            .collect();
        let inserted = missing.len();
        self.favorites.insert_favorites(missing)?;
        Ok(inserted)
    }
}
