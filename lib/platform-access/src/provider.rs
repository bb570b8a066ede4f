//! The provider contract and the static table of concrete providers.

use crate::auth::{AuthState, AuthorizationRequest, CallbackQuery, CallbackUrl};
use crate::credentials::ClientCredentials;
use crate::error::{ConfigurationError, DiscoveryError, TokenExchangeError};
use crate::google::GoogleProvider;
use async_trait::async_trait;
use oauth_sidecar_core::{Identity, ProviderName};
use rootcause::prelude::Report;
use std::sync::Arc;
use std::time::Duration;

/// An OAuth2 authorization-code provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the provider's registry name.
    fn name(&self) -> &ProviderName;

    /// Builds the authorization request the user is redirected to.
    fn authorize(&self, callback_url: &CallbackUrl) -> AuthorizationRequest;

    /// Completes the flow from the provider's redirect.
    ///
    /// Returns `Ok(None)` when the query carries no authorization code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code exchange or the userinfo call fails.
    async fn callback(
        &self,
        query: &CallbackQuery,
        state: &AuthState,
        callback_url: &CallbackUrl,
    ) -> Result<Option<Identity>, Report<TokenExchangeError>>;
}

/// Every provider this build knows how to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Google accounts, discovered through OpenID configuration.
    Google,
}

impl ProviderKind {
    /// The static provider table.
    pub const ALL: &'static [ProviderKind] = &[ProviderKind::Google];

    /// Returns the registry name of this provider.
    #[must_use]
    pub fn name(self) -> ProviderName {
        match self {
            Self::Google => ProviderName::from_static(GoogleProvider::NAME),
        }
    }

    /// Returns the well-known discovery URL used when none is configured.
    #[must_use]
    pub fn default_discovery_url(self) -> &'static str {
        match self {
            Self::Google => GoogleProvider::DISCOVERY_URL,
        }
    }

    /// Looks a provider up by name.
    #[must_use]
    pub fn find(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().as_str() == name)
    }

    /// Discovers and constructs the provider.
    pub(crate) async fn build(
        self,
        credentials: &ClientCredentials,
        discovery_url: &str,
        http_client: reqwest::Client,
    ) -> Result<Arc<dyn Provider>, Report<DiscoveryError>> {
        match self {
            Self::Google => {
                let provider =
                    GoogleProvider::discover(credentials, discovery_url, http_client).await?;
                Ok(Arc::new(provider))
            }
        }
    }
}

/// Builds the HTTP client used for every provider call.
///
/// Redirects are disabled so that token requests are never replayed to a
/// different host.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, ConfigurationError> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigurationError::HttpClient {
            details: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_known_provider() {
        assert_eq!(ProviderKind::find("google"), Some(ProviderKind::Google));
        assert_eq!(ProviderKind::find("facebook"), None);
    }

    #[test]
    fn table_names_are_unique() {
        let mut names: Vec<_> = ProviderKind::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ProviderKind::ALL.len());
    }

    #[test]
    fn google_defaults_to_public_discovery_document() {
        assert_eq!(
            ProviderKind::Google.default_discovery_url(),
            "https://accounts.google.com/.well-known/openid-configuration"
        );
    }
}
