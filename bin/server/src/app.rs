//! Application state and routing.
//!
//! Request pipeline, outermost first: tracing, CORS (answers `OPTIONS`),
//! routing. The auth routes are served by dedicated handlers; every other
//! path goes through the session gate to the forwarder.

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    middleware::from_fn,
    routing::{any, get},
};
use axum_extra::extract::cookie::Key;
use oauth_sidecar_platform_access::{ConfigurationError, Provider, ProviderRegistry, RegistryError};
use rootcause::prelude::Report;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{self, AUTHORIZE_PATH, CALLBACK_PATH, LOGOUT_PATH};
use crate::config::ServerConfig;
use crate::cors::cors;
use crate::error::StartupError;
use crate::proxy::{self, Forwarder};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Provider registry.
    pub registry: Arc<ProviderRegistry>,
    /// Client for the protected backend.
    pub forwarder: Forwarder,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Cookie signing key.
    key: Key,
}

impl AppState {
    /// Creates the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend URL or the session secret is invalid.
    pub fn new(
        config: ServerConfig,
        registry: ProviderRegistry,
    ) -> Result<Self, Report<ConfigurationError>> {
        let key = match config.cookie_key()? {
            Some(key) => key,
            None => {
                warn!("SESSION_SECRET is not set; sessions will not survive a restart");
                Key::generate()
            }
        };
        let forwarder = Forwarder::new(config.backend_url()?, config.request_timeout())?;

        Ok(Self {
            registry: Arc::new(registry),
            forwarder,
            config: Arc::new(config),
            key,
        })
    }

    /// Builds the state from configuration and resolves the provider.
    ///
    /// Missing credentials or a failed discovery stop startup here instead
    /// of surfacing on the first login.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the provider
    /// cannot be initialized.
    pub async fn initialize(config: ServerConfig) -> Result<Self, Report<StartupError>> {
        let registry = ProviderRegistry::new(config.credentials(), config.provider_settings());
        let state = Self::new(config, registry)
            .map_err(|report| report.context(StartupError::Configuration))?;

        let provider = state.provider().await.map_err(|report| {
            report.context(StartupError::Provider {
                name: state.config.provider_name().to_string(),
            })
        })?;
        info!(provider = %provider.name(), "provider ready");

        Ok(state)
    }

    /// Returns the provider users sign in with.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be initialized.
    pub async fn provider(&self) -> Result<Arc<dyn Provider>, Report<RegistryError>> {
        self.registry
            .get(self.config.provider_name().as_str())
            .await
    }

    /// Returns how long a new session stays valid.
    #[must_use]
    pub fn session_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.config.session.duration_minutes)
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

/// Builds the sidecar router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Auth routes
        .route(AUTHORIZE_PATH, get(auth::authorize))
        .route(CALLBACK_PATH, get(auth::callback))
        .route(LOGOUT_PATH, get(auth::logout))
        // Everything else is gated and forwarded, bodies unbounded
        .route("/", any(proxy::forward).layer(DefaultBodyLimit::disable()))
        .route("/{*path}", any(proxy::forward).layer(DefaultBodyLimit::disable()))
        .layer(from_fn(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
