//! OAuth2 providers, credentials and sessions for the oauth-sidecar.
//!
//! This crate provides:
//! - The `Provider` contract and the Google implementation
//! - Client credentials per provider (`Credentials`)
//! - A lazily initialized, name-keyed `ProviderRegistry`
//! - The session and auth-state payloads carried in cookies
//!
//! # Authentication flow
//!
//! `Provider::authorize` builds the URL the user is sent to, together with a
//! CSRF token and PKCE verifier that must survive until the callback.
//! `Provider::callback` exchanges the returned code for an access token and
//! turns the userinfo document into an [`Identity`](oauth_sidecar_core::Identity).
//!
//! # Example
//!
//! ```
//! use oauth_sidecar_core::{Identity, ProviderName};
//! use oauth_sidecar_platform_access::{
//!     ClientCredentials, Credentials, ProviderRegistry, ProviderSettings, Session,
//! };
//! use chrono::Duration;
//!
//! let credentials = Credentials::new().with(
//!     ProviderName::from_static("google"),
//!     ClientCredentials::new("client-id", "client-secret"),
//! );
//!
//! // Nothing is fetched until the first lookup
//! let registry = ProviderRegistry::new(credentials, ProviderSettings::default());
//! assert!(!registry.is_initialized());
//!
//! let session = Session::establish(&Identity::new("alice@example.com"), Duration::hours(8));
//! assert_eq!(session.email(), "alice@example.com");
//! assert!(!session.is_expired());
//! ```

pub mod auth;
pub mod credentials;
pub mod error;
pub mod google;
pub mod oidc;
pub mod provider;
pub mod registry;
pub mod session;

// Re-export main types at crate root
pub use auth::{AuthState, AuthorizationRequest, CallbackQuery, CallbackUrl};
pub use credentials::{ClientCredentials, Credentials};
pub use error::{
    ConfigurationError, DiscoveryError, RegistryError, SessionError, TokenExchangeError,
};
pub use google::GoogleProvider;
pub use oidc::{DEFAULT_TIMEOUT, ProviderEndpoints, ProviderSettings, ProviderSettingsBuilder};
pub use provider::{Provider, ProviderKind, http_client};
pub use registry::ProviderRegistry;
pub use session::Session;
