use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::error;

use super::accounts::{AccountService, SignUpOutcome, SignUpRequest};
use super::approval::ApprovalSubject;
use super::catalog::CatalogService;
use super::domain::{
    ApprovalStatus, Profile, ProfileChanges, PropertyChanges, PropertyDraft, PropertyId, UserId,
    UserRole,
};
use super::error::MarketplaceError;
use super::favorites::{LocalFavorites, MemoryStorage};
use super::identity::{IdentityProvider, ServiceRoleKey, SessionToken};
use super::listing::{ListingFilter, StatusFilter};
use super::moderation::ModerationService;
use super::notifications::ApprovalNotifier;
use super::repository::MarketplaceStore;
use super::storage::{ImageUpload, ObjectStorage};

/// Request body cap for listing creation, base64 images included.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Services shared by every marketplace handler.
pub struct MarketplaceState<S, I, O> {
    pub catalog: Arc<CatalogService<S, O>>,
    pub accounts: Arc<AccountService<S, I>>,
    pub moderation: Arc<ModerationService<S, I, ApprovalNotifier>>,
    pub notifier: ApprovalNotifier,
    pub approval_wait_limit: Duration,
    pub max_upload_bytes: usize,
}

impl<S, I, O> Clone for MarketplaceState<S, I, O> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            accounts: Arc::clone(&self.accounts),
            moderation: Arc::clone(&self.moderation),
            notifier: self.notifier.clone(),
            approval_wait_limit: self.approval_wait_limit,
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

impl<S, I, O> MarketplaceState<S, I, O>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    /// Wires the services around one store, identity provider and bucket store.
    pub fn new(
        store: Arc<S>,
        identity: Arc<I>,
        storage: Arc<O>,
        service_key: ServiceRoleKey,
        approval_wait_limit: Duration,
    ) -> Self {
        let notifier = ApprovalNotifier::default();
        let accounts = Arc::new(AccountService::new(
            Arc::clone(&store),
            identity,
            service_key,
        ));
        let moderation = Arc::new(ModerationService::new(
            Arc::clone(&store),
            Arc::clone(&accounts),
            Arc::new(notifier.clone()),
        ));
        let catalog = Arc::new(CatalogService::new(store, storage));

        Self {
            catalog,
            accounts,
            moderation,
            notifier,
            approval_wait_limit,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_upload_limit(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    fn actor(&self, headers: &HeaderMap) -> Result<Profile, MarketplaceError> {
        self.accounts.actor(bearer_token(headers).as_ref())
    }

    fn viewer(&self, headers: &HeaderMap) -> Result<Option<Profile>, MarketplaceError> {
        self.accounts.optional_actor(bearer_token(headers).as_ref())
    }
}

/// Router builder exposing the marketplace API under `/api/v1`.
pub fn marketplace_router<S, I, O>(state: MarketplaceState<S, I, O>) -> Router
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/api/v1/auth/signup", post(sign_up_handler::<S, I, O>))
        .route("/api/v1/auth/signin", post(sign_in_handler::<S, I, O>))
        .route("/api/v1/auth/signout", post(sign_out_handler::<S, I, O>))
        .route(
            "/api/v1/account",
            get(account_handler::<S, I, O>)
                .patch(update_account_handler::<S, I, O>)
                .delete(delete_account_handler::<S, I, O>),
        )
        .route(
            "/api/v1/dealers/:dealer_id/approval/wait",
            get(approval_wait_handler::<S, I, O>),
        )
        .route(
            "/api/v1/properties",
            get(search_handler::<S, I, O>)
                .post(create_listing_handler::<S, I, O>)
                .layer(upload_limit),
        )
        .route("/api/v1/properties/lookup", post(lookup_handler::<S, I, O>))
        .route(
            "/api/v1/properties/:property_id",
            get(listing_handler::<S, I, O>)
                .patch(update_listing_handler::<S, I, O>)
                .delete(delete_listing_handler::<S, I, O>),
        )
        .route(
            "/api/v1/properties/:property_id/contact",
            post(contact_handler::<S, I, O>),
        )
        .route(
            "/api/v1/properties/:property_id/favorite",
            post(save_favorite_handler::<S, I, O>).delete(remove_favorite_handler::<S, I, O>),
        )
        .route(
            "/api/v1/dashboard/properties",
            get(dashboard_handler::<S, I, O>),
        )
        .route("/api/v1/favorites", get(saved_listings_handler::<S, I, O>))
        .route("/api/v1/admin/stats", get(stats_handler::<S, I, O>))
        .route(
            "/api/v1/admin/properties",
            get(property_queue_handler::<S, I, O>),
        )
        .route(
            "/api/v1/admin/properties/:property_id/approval",
            put(property_approval_handler::<S, I, O>),
        )
        .route(
            "/api/v1/admin/properties/:property_id/featured",
            put(featured_handler::<S, I, O>),
        )
        .route("/api/v1/admin/users", get(users_handler::<S, I, O>))
        .route(
            "/api/v1/admin/dealers/pending",
            get(pending_dealers_handler::<S, I, O>),
        )
        .route(
            "/api/v1/admin/users/:user_id/approval",
            put(dealer_approval_handler::<S, I, O>),
        )
        .route(
            "/api/v1/admin/users/:user_id/role",
            put(role_handler::<S, I, O>),
        )
        .route(
            "/api/v1/admin/users/:user_id",
            axum::routing::delete(delete_user_handler::<S, I, O>),
        )
        .with_state(state)
}

impl IntoResponse for MarketplaceError {
    fn into_response(self) -> Response {
        let status = match &self {
            MarketplaceError::Unauthenticated | MarketplaceError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            MarketplaceError::Forbidden(_) | MarketplaceError::SignInDenied(_) => {
                StatusCode::FORBIDDEN
            }
            MarketplaceError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketplaceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MarketplaceError::Conflict(_) => StatusCode::CONFLICT,
            MarketplaceError::Repository(_)
            | MarketplaceError::Identity(_)
            | MarketplaceError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            MarketplaceError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if self.is_transient() {
            error!(error = %self, "marketplace backend unavailable");
        }

        let payload = match &self {
            MarketplaceError::SignInDenied(denial) => json!({
                "error": self.to_string(),
                "retryable": denial.is_retryable(),
            }),
            _ => json!({
                "error": self.to_string(),
            }),
        };
        (status, Json(payload)).into_response()
    }
}

/// Runs a synchronous service call on tokio's blocking pool. Password
/// hashing and image uploads go through here.
async fn offload<T, F>(call: F) -> Result<T, MarketplaceError>
where
    F: FnOnce() -> Result<T, MarketplaceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call).await.map_err(|join| {
        error!(error = %join, "blocking marketplace call did not complete");
        MarketplaceError::Worker(join.to_string())
    })?
}

fn bearer_token(headers: &HeaderMap) -> Option<SessionToken> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| SessionToken::new(token))
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignUpPayload {
    #[serde(flatten)]
    request: SignUpRequest,
    #[serde(default)]
    local_favorites: Vec<PropertyId>,
}

#[derive(Debug, Serialize)]
struct SignUpResponse {
    #[serde(flatten)]
    outcome: SignUpOutcome,
    local_favorites_cleared: bool,
}

pub(crate) async fn sign_up_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    Json(payload): Json<SignUpPayload>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let accounts = Arc::clone(&state.accounts);
    let outcome = offload(move || {
        let mut local = LocalFavorites::new(MemoryStorage::with_favorites(payload.local_favorites));
        accounts.sign_up(payload.request, &mut local)
    })
    .await?;

    let (status, local_favorites_cleared) = match &outcome {
        SignUpOutcome::Registered { merge, .. } => (StatusCode::CREATED, merge.local_cleared()),
        SignUpOutcome::AwaitingApproval { .. } => (StatusCode::ACCEPTED, false),
    };
    let body = SignUpResponse {
        outcome,
        local_favorites_cleared,
    };
    Ok((status, Json(body)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignInPayload {
    email: String,
    password: String,
    #[serde(default)]
    local_favorites: Vec<PropertyId>,
}

pub(crate) async fn sign_in_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    Json(payload): Json<SignInPayload>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let accounts = Arc::clone(&state.accounts);
    let signed_in = offload(move || {
        let mut local = LocalFavorites::new(MemoryStorage::with_favorites(payload.local_favorites));
        accounts.sign_in(&payload.email, &payload.password, &mut local)
    })
    .await?;

    let payload = json!({
        "session": signed_in.session,
        "profile": signed_in.profile,
        "merge": signed_in.merge,
        "local_favorites_cleared": signed_in.merge.local_cleared(),
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn sign_out_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
) -> Result<StatusCode, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let token = bearer_token(&headers).ok_or(MarketplaceError::Unauthenticated)?;
    state.accounts.sign_out(&token)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn account_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
) -> Result<Json<Profile>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    Ok(Json(state.actor(&headers)?))
}

pub(crate) async fn update_account_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Json(changes): Json<ProfileChanges>,
) -> Result<Json<Profile>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let actor = state.actor(&headers)?;
    Ok(Json(state.accounts.update_own_profile(&actor, changes)?))
}

pub(crate) async fn delete_account_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
) -> Result<StatusCode, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let actor = state.actor(&headers)?;
    state.accounts.delete_own_account(&actor)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WaitQuery {
    timeout_secs: Option<u64>,
}

/// Long-poll for a dealer's approval decision. Answers at once when the
/// application is already decided; otherwise holds the request until an
/// admin decides or the wait limit passes.
pub(crate) async fn approval_wait_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    Path(dealer_id): Path<UserId>,
    Query(query): Query<WaitQuery>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    // Subscribe before reading so a decision in between is not missed.
    let mut subscription = state
        .notifier
        .subscribe(Some(ApprovalSubject::Dealer(dealer_id)));
    let current = state.accounts.dealer_status(&dealer_id)?;

    let status = if current == ApprovalStatus::Pending {
        let limit = query
            .timeout_secs
            .map(Duration::from_secs)
            .map_or(state.approval_wait_limit, |requested| {
                requested.min(state.approval_wait_limit)
            });
        match tokio::time::timeout(limit, subscription.recv()).await {
            Ok(Some(event)) => event.status,
            Ok(None) | Err(_) => current,
        }
    } else {
        current
    };

    let payload = json!({
        "dealer_id": dealer_id,
        "approval_status": status,
        "decided": status != ApprovalStatus::Pending,
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn search_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    Query(filter): Query<ListingFilter>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let listings = state.catalog.search(filter)?;
    Ok((StatusCode::OK, Json(listings)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImagePayload {
    file_name: String,
    #[serde(deserialize_with = "base64_bytes")]
    data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateListingPayload {
    #[serde(flatten)]
    draft: PropertyDraft,
    #[serde(default)]
    images: Vec<ImagePayload>,
}

pub(crate) async fn create_listing_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Json(payload): Json<CreateListingPayload>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let actor = state.actor(&headers)?;
    let images = payload
        .images
        .into_iter()
        .map(|image| ImageUpload::new(image.file_name, image.data))
        .collect();
    let catalog = Arc::clone(&state.catalog);
    let listing =
        offload(move || catalog.create_listing(&actor, payload.draft, images)).await?;
    Ok((StatusCode::CREATED, Json(listing)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct LookupPayload {
    ids: Vec<PropertyId>,
}

pub(crate) async fn lookup_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    Json(payload): Json<LookupPayload>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let listings = state.catalog.lookup_public(&payload.ids)?;
    Ok((StatusCode::OK, Json(listings)).into_response())
}

pub(crate) async fn listing_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Path(property_id): Path<PropertyId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let viewer = state.viewer(&headers)?;
    let listing = state.catalog.get_listing(viewer.as_ref(), &property_id)?;
    Ok((StatusCode::OK, Json(listing)).into_response())
}

pub(crate) async fn update_listing_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Path(property_id): Path<PropertyId>,
    Json(changes): Json<PropertyChanges>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let actor = state.actor(&headers)?;
    let listing = state
        .catalog
        .update_listing(&actor, &property_id, changes)?;
    Ok((StatusCode::OK, Json(listing)).into_response())
}

pub(crate) async fn delete_listing_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Path(property_id): Path<PropertyId>,
) -> Result<StatusCode, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let actor = state.actor(&headers)?;
    state.catalog.delete_listing(&actor, &property_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn contact_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Path(property_id): Path<PropertyId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let actor = state.actor(&headers)?;
    let contact = state.catalog.reveal_contact(&actor, &property_id)?;
    Ok((StatusCode::OK, Json(contact)).into_response())
}

pub(crate) async fn save_favorite_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Path(property_id): Path<PropertyId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let actor = state.actor(&headers)?;
    let created = state.catalog.save_favorite(&actor, &property_id)?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let payload = json!({
        "property_id": property_id,
        "favorited": true,
    });
    Ok((status, Json(payload)).into_response())
}

pub(crate) async fn remove_favorite_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Path(property_id): Path<PropertyId>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let actor = state.actor(&headers)?;
    state.catalog.remove_favorite(&actor.id, &property_id)?;
    let payload = json!({
        "property_id": property_id,
        "favorited": false,
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatusQuery {
    #[serde(default)]
    status: StatusFilter,
}

pub(crate) async fn dashboard_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let actor = state.actor(&headers)?;
    let listings = state.catalog.owner_listings(&actor, query.status)?;
    Ok((StatusCode::OK, Json(listings)).into_response())
}

pub(crate) async fn saved_listings_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let actor = state.actor(&headers)?;
    let listings = state.catalog.saved_listings(&actor)?;
    Ok((StatusCode::OK, Json(listings)).into_response())
}

pub(crate) async fn stats_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let admin = state.actor(&headers)?;
    let stats = state.moderation.stats(&admin)?;
    Ok((StatusCode::OK, Json(stats)).into_response())
}

pub(crate) async fn property_queue_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let admin = state.actor(&headers)?;
    let listings = state.moderation.property_queue(&admin, query.status)?;
    Ok((StatusCode::OK, Json(listings)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApprovalPayload {
    status: ApprovalStatus,
}

pub(crate) async fn property_approval_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Path(property_id): Path<PropertyId>,
    Json(payload): Json<ApprovalPayload>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let admin = state.actor(&headers)?;
    let property = state
        .moderation
        .set_property_approval(&admin, &property_id, payload.status)?;
    Ok((StatusCode::OK, Json(property)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeaturedPayload {
    featured: bool,
}

pub(crate) async fn featured_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Path(property_id): Path<PropertyId>,
    Json(payload): Json<FeaturedPayload>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let admin = state.actor(&headers)?;
    let property = state
        .moderation
        .set_featured(&admin, &property_id, payload.featured)?;
    Ok((StatusCode::OK, Json(property)).into_response())
}

pub(crate) async fn users_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let admin = state.actor(&headers)?;
    let users = state.moderation.users(&admin)?;
    Ok((StatusCode::OK, Json(users)).into_response())
}

pub(crate) async fn pending_dealers_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let admin = state.actor(&headers)?;
    let dealers = state.moderation.pending_dealers(&admin)?;
    Ok((StatusCode::OK, Json(dealers)).into_response())
}

pub(crate) async fn dealer_approval_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Path(user_id): Path<UserId>,
    Json(payload): Json<ApprovalPayload>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let admin = state.actor(&headers)?;
    let profile = state
        .moderation
        .set_dealer_approval(&admin, &user_id, payload.status)?;
    Ok((StatusCode::OK, Json(profile)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct RolePayload {
    role: UserRole,
}

pub(crate) async fn role_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Path(user_id): Path<UserId>,
    Json(payload): Json<RolePayload>,
) -> Result<Response, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let admin = state.actor(&headers)?;
    let profile = state.moderation.set_role(&admin, &user_id, payload.role)?;
    Ok((StatusCode::OK, Json(profile)).into_response())
}

pub(crate) async fn delete_user_handler<S, I, O>(
    State(state): State<MarketplaceState<S, I, O>>,
    headers: HeaderMap,
    Path(user_id): Path<UserId>,
) -> Result<StatusCode, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    I: IdentityProvider + 'static,
    O: ObjectStorage + 'static,
{
    let admin = state.actor(&headers)?;
    state.moderation.delete_user(&admin, &user_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts plain base64 or a `data:<mime>;base64,` URL.
fn base64_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let encoded = match raw.strip_prefix("data:") {
        Some(data_url) => data_url
            .split_once(',')
            .map_or(data_url, |(_, payload)| payload),
        None => raw.as_str(),
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(serde::de::Error::custom)
}
