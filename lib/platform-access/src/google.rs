//! Google sign-in using the OAuth2 authorization-code flow.
//!
//! Endpoints come from Google's OpenID discovery document. The flow requests
//! the `email` scope only; the userinfo response becomes the [`Identity`].

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, PkceCodeVerifier,
    RedirectUrl, Scope, TokenResponse,
};
use oauth_sidecar_core::{Identity, ProviderName};
use rootcause::prelude::Report;
use tracing::{debug, instrument, warn};

use crate::auth::{AuthState, AuthorizationRequest, CallbackQuery, CallbackUrl};
use crate::credentials::ClientCredentials;
use crate::error::{DiscoveryError, TokenExchangeError};
use crate::oidc::ProviderEndpoints;
use crate::provider::Provider;

/// Scope requested from Google.
const SCOPE: &str = "email";

/// Google sign-in provider.
pub struct GoogleProvider {
    name: ProviderName,
    client_id: ClientId,
    client_secret: ClientSecret,
    endpoints: ProviderEndpoints,
    http_client: reqwest::Client,
}

impl GoogleProvider {
    /// Registry name of the provider.
    pub const NAME: &'static str = "google";

    /// Google's public OpenID discovery document.
    pub const DISCOVERY_URL: &'static str =
        "https://accounts.google.com/.well-known/openid-configuration";

    /// Creates a provider from already known endpoints.
    #[must_use]
    pub fn new(
        credentials: &ClientCredentials,
        endpoints: ProviderEndpoints,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            name: ProviderName::from_static(Self::NAME),
            client_id: ClientId::new(credentials.id().to_string()),
            client_secret: ClientSecret::new(credentials.secret().to_string()),
            endpoints,
            http_client,
        }
    }

    /// Creates a provider by fetching its discovery document.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails.
    pub async fn discover(
        credentials: &ClientCredentials,
        discovery_url: &str,
        http_client: reqwest::Client,
    ) -> Result<Self, Report<DiscoveryError>> {
        let endpoints = ProviderEndpoints::discover(&http_client, discovery_url).await?;
        Ok(Self::new(credentials, endpoints, http_client))
    }

    /// Exchanges the authorization code for an access token.
    #[instrument(skip_all, fields(provider = %self.name))]
    async fn exchange_code(
        &self,
        code: &str,
        state: &AuthState,
        callback_url: &CallbackUrl,
    ) -> Result<String, Report<TokenExchangeError>> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.endpoints.authorization().clone())
            .set_token_uri(self.endpoints.token().clone())
            .set_redirect_uri(RedirectUrl::from_url(callback_url.as_url().clone()));

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(state.pkce_verifier().to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| {
                if is_timeout(&e) {
                    TokenExchangeError::Timeout {
                        provider: self.name.clone(),
                        endpoint: "token",
                    }
                } else {
                    TokenExchangeError::Exchange {
                        provider: self.name.clone(),
                        details: e.to_string(),
                    }
                }
            })?;

        Ok(token_response.access_token().secret().clone())
    }

    /// Fetches the userinfo document for an access token.
    #[instrument(skip_all, fields(provider = %self.name))]
    async fn fetch_identity(
        &self,
        access_token: &str,
    ) -> Result<Identity, Report<TokenExchangeError>> {
        let request_error = |e: reqwest::Error| {
            if e.is_timeout() {
                TokenExchangeError::Timeout {
                    provider: self.name.clone(),
                    endpoint: "userinfo",
                }
            } else {
                TokenExchangeError::Userinfo {
                    provider: self.name.clone(),
                    details: e.to_string(),
                }
            }
        };

        let response = self
            .http_client
            .get(self.endpoints.userinfo().clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TokenExchangeError::UserinfoStatus {
                provider: self.name.clone(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.bytes().await.map_err(request_error)?;
        let document: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| TokenExchangeError::MalformedIdentity {
                provider: self.name.clone(),
                details: e.to_string(),
            })?;

        let identity =
            Identity::from_userinfo(document).map_err(|e| TokenExchangeError::MalformedIdentity {
                provider: self.name.clone(),
                details: e.to_string(),
            })?;

        Ok(identity)
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    fn name(&self) -> &ProviderName {
        &self.name
    }

    fn authorize(&self, callback_url: &CallbackUrl) -> AuthorizationRequest {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.endpoints.authorization().clone())
            .set_token_uri(self.endpoints.token().clone())
            .set_redirect_uri(RedirectUrl::from_url(callback_url.as_url().clone()));

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (url, csrf_token) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(SCOPE.to_string()))
            // Request offline access for refresh token
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(pkce_challenge)
            .url();

        AuthorizationRequest {
            url,
            state: AuthState::new(csrf_token.secret().clone(), pkce_verifier.secret().clone()),
        }
    }

    async fn callback(
        &self,
        query: &CallbackQuery,
        state: &AuthState,
        callback_url: &CallbackUrl,
    ) -> Result<Option<Identity>, Report<TokenExchangeError>> {
        let Some(code) = query.code.as_deref().filter(|code| !code.is_empty()) else {
            if let Some(error) = &query.error {
                warn!(provider = %self.name, error = %error, "provider returned an error");
            }
            return Ok(None);
        };

        let access_token = self.exchange_code(code, state, callback_url).await?;
        let identity = self.fetch_identity(&access_token).await?;
        debug!(provider = %self.name, email = %identity.email(), "identity verified");

        Ok(Some(identity))
    }
}

/// Returns true if any error in the chain is a reqwest timeout.
fn is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let timed_out = e
            .downcast_ref::<reqwest::Error>()
            .or_else(|| e.downcast_ref::<Box<reqwest::Error>>().map(AsRef::as_ref))
            .is_some_and(reqwest::Error::is_timeout);
        if timed_out {
            return true;
        }
        current = e.source();
    }
    false
}
