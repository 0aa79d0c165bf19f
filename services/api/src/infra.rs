use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use zameen_hub::config::{MarketplaceConfig, SeedAdmin};
use zameen_hub::marketplace::{
    InMemoryIdentityProvider, InMemoryObjectStorage, InMemoryStore, MarketplaceError,
    MarketplaceState, Profile, SignUpRequest, UserRole,
};

pub(crate) type Marketplace =
    MarketplaceState<InMemoryStore, InMemoryIdentityProvider, InMemoryObjectStorage>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) storage: Arc<InMemoryObjectStorage>,
}

/// In-memory backends wired into the marketplace services.
pub(crate) fn build_marketplace(
    config: &MarketplaceConfig,
) -> (Marketplace, Arc<InMemoryObjectStorage>) {
    let store = Arc::new(InMemoryStore::new());
    let identity = Arc::new(InMemoryIdentityProvider::new(
        config.service_role_key.clone(),
    ));
    let storage = Arc::new(InMemoryObjectStorage::new(
        config.storage_public_url.clone(),
    ));

    let marketplace = MarketplaceState::new(
        store,
        identity,
        Arc::clone(&storage),
        config.service_role_key.clone(),
        config.approval_wait_limit,
    )
    .with_upload_limit(config.max_upload_bytes);
    (marketplace, storage)
}

/// Provisions the configured bootstrap admin. An existing account with the
/// same email is left alone.
pub(crate) fn seed_admin(
    marketplace: &Marketplace,
    config: &MarketplaceConfig,
) -> Result<Option<Profile>, MarketplaceError> {
    let Some(SeedAdmin { email, password }) = config.seed_admin.clone() else {
        return Ok(None);
    };

    let request = SignUpRequest {
        email: email.clone(),
        password,
        full_name: Some("Administrator".to_string()),
        phone: None,
        role: UserRole::Admin,
        agency_name: None,
    };
    match marketplace
        .accounts
        .provision_account(&config.service_role_key, request)
    {
        Ok(profile) => {
            info!(%email, user = %profile.id, "seed admin provisioned");
            Ok(Some(profile))
        }
        Err(MarketplaceError::Conflict(_)) => {
            info!(%email, "seed admin already present");
            Ok(None)
        }
        Err(error) => Err(error),
    }
}
