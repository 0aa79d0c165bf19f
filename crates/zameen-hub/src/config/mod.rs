use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::marketplace::{ServiceRoleKey, DEFAULT_MAX_UPLOAD_BYTES};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub marketplace: MarketplaceConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let marketplace = MarketplaceConfig::from_env(environment, &host, port)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            marketplace,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Credentials and limits for the marketplace backends.
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    /// Elevated credential required for account deletion and provisioning.
    pub service_role_key: ServiceRoleKey,
    /// Base URL under which uploaded listing images are served.
    pub storage_public_url: String,
    /// Upper bound for the dealer approval long-poll.
    pub approval_wait_limit: Duration,
    /// Largest accepted listing-creation body, base64 images included.
    pub max_upload_bytes: usize,
    pub seed_admin: Option<SeedAdmin>,
}

/// Bootstrap administrator created at start-up when configured.
#[derive(Clone)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl MarketplaceConfig {
    fn from_env(environment: AppEnvironment, host: &str, port: u16) -> Result<Self, ConfigError> {
        let service_role_key = match env::var("SERVICE_ROLE_KEY") {
            Ok(key) if !key.trim().is_empty() => ServiceRoleKey::new(key.trim()),
            _ if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingServiceRoleKey)
            }
            _ => ServiceRoleKey::generate(),
        };

        let storage_public_url = env::var("STORAGE_PUBLIC_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://{host}:{port}/storage/v1/object/public"));

        let approval_wait_limit = env::var("APP_APPROVAL_WAIT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidApprovalWait)?;

        let max_upload_bytes = match env::var("APP_MAX_UPLOAD_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|bytes| *bytes > 0)
                .ok_or(ConfigError::InvalidUploadLimit)?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let seed_admin = match (env::var("SEED_ADMIN_EMAIL"), env::var("SEED_ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.trim().is_empty() => Some(SeedAdmin {
                email: email.trim().to_string(),
                password,
            }),
            (Ok(_), Err(_)) => return Err(ConfigError::IncompleteSeedAdmin),
            _ => None,
        };

        Ok(Self {
            service_role_key,
            storage_public_url,
            approval_wait_limit,
            max_upload_bytes,
            seed_admin,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost {
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("SERVICE_ROLE_KEY must be set in production")]
    MissingServiceRoleKey,
    #[error("APP_APPROVAL_WAIT_SECS must be a whole number of seconds")]
    InvalidApprovalWait,
    #[error("APP_MAX_UPLOAD_BYTES must be a positive number of bytes")]
    InvalidUploadLimit,
    #[error("SEED_ADMIN_EMAIL requires SEED_ADMIN_PASSWORD")]
    IncompleteSeedAdmin,
}
