use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use argon2::Params;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use serde_json::Value;

use crate::marketplace::approval::{ApprovalEvent, ApprovalPublisher, NotificationError};
use crate::marketplace::domain::{
    ApprovalStatus, Favorite, Profile, PropertyDraft, PropertyId, PropertyType, UserId, UserRole,
};
use crate::marketplace::favorites::{LocalFavorites, MemoryStorage};
use crate::marketplace::identity::{
    IdentityError, IdentityProvider, ServiceRoleKey, Session, SessionToken,
};
use crate::marketplace::memory::{InMemoryIdentityProvider, InMemoryObjectStorage, InMemoryStore};
use crate::marketplace::repository::{FavoriteRepository, RepositoryError};
use crate::marketplace::storage::{ImageUpload, ObjectStorage, StorageError};
use crate::marketplace::{MarketplaceState, SignUpOutcome, SignUpRequest};

pub(super) const STORAGE_URL: &str = "http://storage.test/public";
pub(super) const PASSWORD: &str = "s3cret-pass";

pub(super) type TestMarketplace =
    MarketplaceState<InMemoryStore, InMemoryIdentityProvider, InMemoryObjectStorage>;

pub(super) fn service_key() -> ServiceRoleKey {
    ServiceRoleKey::new("sr-marketplace-tests")
}

pub(super) fn fast_identity() -> InMemoryIdentityProvider {
    let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None)
        .expect("valid argon2 params");
    InMemoryIdentityProvider::with_params(service_key(), params)
}

/// Marketplace wired to in-memory adapters, with handles on each backend.
pub(super) struct Harness {
    pub(super) state: TestMarketplace,
    pub(super) store: Arc<InMemoryStore>,
    pub(super) identity: Arc<InMemoryIdentityProvider>,
    pub(super) storage: Arc<InMemoryObjectStorage>,
}

pub(super) fn harness() -> Harness {
    harness_with_wait(Duration::from_secs(5))
}

pub(super) fn harness_with_wait(approval_wait_limit: Duration) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let identity = Arc::new(fast_identity());
    let storage = Arc::new(InMemoryObjectStorage::new(STORAGE_URL));
    let state = MarketplaceState::new(
        Arc::clone(&store),
        Arc::clone(&identity),
        Arc::clone(&storage),
        service_key(),
        approval_wait_limit,
    );
    Harness {
        state,
        store,
        identity,
        storage,
    }
}

pub(super) fn sign_up_request(email: &str, role: UserRole) -> SignUpRequest {
    SignUpRequest {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        full_name: Some("Test Account".to_string()),
        phone: Some("+92 321 0000000".to_string()),
        role,
        agency_name: (role == UserRole::Dealer).then(|| "Test Realty".to_string()),
    }
}

impl Harness {
    pub(super) fn admin(&self) -> Profile {
        self.state
            .accounts
            .provision_account(&service_key(), sign_up_request("admin@zameenhub.test", UserRole::Admin))
            .expect("admin provisioned")
    }

    /// Provisioned dealers are approved straight away.
    pub(super) fn approved_dealer(&self, email: &str) -> Profile {
        self.state
            .accounts
            .provision_account(&service_key(), sign_up_request(email, UserRole::Dealer))
            .expect("dealer provisioned")
    }

    pub(super) fn pending_dealer(&self, email: &str) -> Profile {
        let mut local = LocalFavorites::new(MemoryStorage::default());
        match self
            .state
            .accounts
            .sign_up(sign_up_request(email, UserRole::Dealer), &mut local)
            .expect("dealer signs up")
        {
            SignUpOutcome::AwaitingApproval { profile } => profile,
            other => panic!("dealer should await approval, got {other:?}"),
        }
    }

    pub(super) fn user(&self, email: &str) -> (Profile, Session) {
        let mut local = LocalFavorites::new(MemoryStorage::default());
        match self
            .state
            .accounts
            .sign_up(sign_up_request(email, UserRole::User), &mut local)
            .expect("user signs up")
        {
            SignUpOutcome::Registered {
                profile, session, ..
            } => (profile, session),
            other => panic!("user should be registered, got {other:?}"),
        }
    }

    pub(super) fn session_for(&self, email: &str) -> SessionToken {
        let mut local = LocalFavorites::new(MemoryStorage::default());
        self.state
            .accounts
            .sign_in(email, PASSWORD, &mut local)
            .expect("signs in")
            .session
            .token
    }

    pub(super) fn listing(&self, owner: &Profile, draft: PropertyDraft) -> PropertyId {
        self.state
            .catalog
            .create_listing(owner, draft, Vec::new())
            .expect("listing created")
            .property
            .id
    }

    pub(super) fn approved_listing(
        &self,
        admin: &Profile,
        owner: &Profile,
        draft: PropertyDraft,
    ) -> PropertyId {
        let id = self.listing(owner, draft);
        self.decide(admin, &id, ApprovalStatus::Approved);
        id
    }

    pub(super) fn decide(&self, admin: &Profile, id: &PropertyId, status: ApprovalStatus) {
        self.state
            .moderation
            .set_property_approval(admin, id, status)
            .expect("approval recorded");
    }
}

pub(super) fn draft(
    title: &str,
    property_type: PropertyType,
    city: &str,
    price: Option<u64>,
    bedrooms: Option<u32>,
) -> PropertyDraft {
    PropertyDraft {
        title: title.to_string(),
        description: Some("Listed for the marketplace tests".to_string()),
        property_type,
        price,
        city: city.to_string(),
        area: None,
        address: None,
        bedrooms,
        bathrooms: None,
        furnishing: None,
    }
}

pub(super) fn karachi_house(title: &str, price: u64) -> PropertyDraft {
    draft(title, PropertyType::House, "Karachi", Some(price), Some(3))
}

pub(super) fn photo(name: &str) -> ImageUpload {
    ImageUpload::new(name, vec![0x89, b'P', b'N', b'G'])
}

pub(super) fn saved_ids(store: &InMemoryStore, user: &UserId) -> Vec<PropertyId> {
    store
        .favorite_property_ids(user)
        .expect("favorites readable")
}

/// Counts every call made against the favorites table.
pub(super) struct CountingFavorites {
    inner: InMemoryStore,
    pub(super) reads: AtomicUsize,
    pub(super) writes: AtomicUsize,
}

impl CountingFavorites {
    pub(super) fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
    }
}

impl FavoriteRepository for CountingFavorites {
    fn favorite_property_ids(&self, user: &UserId) -> Result<Vec<PropertyId>, RepositoryError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.favorite_property_ids(user)
    }

    fn insert_favorites(&self, favorites: Vec<Favorite>) -> Result<(), RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.insert_favorites(favorites)
    }

    fn delete_favorite(
        &self,
        user: &UserId,
        property: &PropertyId,
    ) -> Result<bool, RepositoryError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_favorite(user, property)
    }
}

/// Answers the first `conflicts` batch inserts with a unique violation, as a
/// concurrent merge for the same user would.
pub(super) struct ConflictingFavorites {
    inner: InMemoryStore,
    conflicts: Mutex<usize>,
    pub(super) inserts: AtomicUsize,
}

impl ConflictingFavorites {
    pub(super) fn new(inner: InMemoryStore, conflicts: usize) -> Self {
        Self {
            inner,
            conflicts: Mutex::new(conflicts),
            inserts: AtomicUsize::new(0),
        }
    }
}

impl FavoriteRepository for ConflictingFavorites {
    fn favorite_property_ids(&self, user: &UserId) -> Result<Vec<PropertyId>, RepositoryError> {
        self.inner.favorite_property_ids(user)
    }

    fn insert_favorites(&self, favorites: Vec<Favorite>) -> Result<(), RepositoryError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let mut remaining = self.conflicts.lock().expect("conflict mutex poisoned");
        if *remaining > 0 {
            *remaining -= 1;
            return Err(RepositoryError::Conflict);
        }
        self.inner.insert_favorites(favorites)
    }

    fn delete_favorite(
        &self,
        user: &UserId,
        property: &PropertyId,
    ) -> Result<bool, RepositoryError> {
        self.inner.delete_favorite(user, property)
    }
}

pub(super) struct UnavailableFavorites;

impl FavoriteRepository for UnavailableFavorites {
    fn favorite_property_ids(&self, _user: &UserId) -> Result<Vec<PropertyId>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_favorites(&self, _favorites: Vec<Favorite>) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete_favorite(
        &self,
        _user: &UserId,
        _property: &PropertyId,
    ) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct UnavailableStorage;

impl ObjectStorage for UnavailableStorage {
    fn upload(
        &self,
        _bucket: &str,
        _path: &str,
        _content_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("bucket offline".to_string()))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{STORAGE_URL}/{bucket}/{path}")
    }
}

#[derive(Default)]
pub(super) struct RecordingPublisher {
    events: Mutex<Vec<ApprovalEvent>>,
}

impl RecordingPublisher {
    pub(super) fn events(&self) -> Vec<ApprovalEvent> {
        self.events.lock().expect("publisher mutex poisoned").clone()
    }
}

impl ApprovalPublisher for RecordingPublisher {
    fn publish(&self, event: ApprovalEvent) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("publisher mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(super) struct OfflinePublisher;

impl ApprovalPublisher for OfflinePublisher {
    fn publish(&self, _event: ApprovalEvent) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("mail relay offline".to_string()))
    }
}

/// Holds every sign-in until the test releases it, announcing when one is
/// waiting.
pub(super) struct GatedIdentity {
    inner: InMemoryIdentityProvider,
    entered: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
    release: Mutex<std::sync::mpsc::Receiver<()>>,
}

impl GatedIdentity {
    pub(super) fn new(
        inner: InMemoryIdentityProvider,
        entered: tokio::sync::oneshot::Sender<()>,
        release: std::sync::mpsc::Receiver<()>,
    ) -> Self {
        Self {
            inner,
            entered: Mutex::new(Some(entered)),
            release: Mutex::new(release),
        }
    }
}

impl IdentityProvider for GatedIdentity {
    fn sign_up(&self, email: &str, password: &str) -> Result<UserId, IdentityError> {
        self.inner.sign_up(email, password)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        if let Some(entered) = self.entered.lock().expect("gate poisoned").take() {
            let _ = entered.send(());
        }
        self.release
            .lock()
            .expect("gate poisoned")
            .recv()
            .map_err(|_| IdentityError::Unavailable("gate dropped".to_string()))?;
        self.inner.sign_in(email, password)
    }

    fn sign_out(&self, token: &SessionToken) -> Result<(), IdentityError> {
        self.inner.sign_out(token)
    }

    fn resolve(&self, token: &SessionToken) -> Result<Option<UserId>, IdentityError> {
        self.inner.resolve(token)
    }

    fn delete_identity(
        &self,
        credential: &ServiceRoleKey,
        user: &UserId,
    ) -> Result<(), IdentityError> {
        self.inner.delete_identity(credential, user)
    }
}

/// Signs people in but cannot revoke their sessions.
pub(super) struct StickySessions {
    pub(super) inner: InMemoryIdentityProvider,
}

impl IdentityProvider for StickySessions {
    fn sign_up(&self, email: &str, password: &str) -> Result<UserId, IdentityError> {
        self.inner.sign_up(email, password)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        self.inner.sign_in(email, password)
    }

    fn sign_out(&self, _token: &SessionToken) -> Result<(), IdentityError> {
        Err(IdentityError::Unavailable("auth backend timed out".to_string()))
    }

    fn resolve(&self, token: &SessionToken) -> Result<Option<UserId>, IdentityError> {
        self.inner.resolve(token)
    }

    fn delete_identity(
        &self,
        credential: &ServiceRoleKey,
        user: &UserId,
    ) -> Result<(), IdentityError> {
        self.inner.delete_identity(credential, user)
    }
}

pub(super) fn request(
    method: Method,
    uri: &str,
    token: Option<&SessionToken>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token.as_str()));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).expect("json body"))
        }
        None => Body::empty(),
    };
    builder.body(body).expect("valid request")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
