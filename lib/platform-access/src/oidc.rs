//! OpenID discovery and provider endpoint settings.
//!
//! Providers publish a well-known configuration document listing their
//! authorization, token and userinfo endpoints. This module fetches that
//! document and holds the settings that control how providers are reached.

use crate::error::DiscoveryError;
use oauth2::{AuthUrl, TokenUrl};
use oauth_sidecar_core::ProviderName;
use rootcause::prelude::Report;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Default timeout for every outbound provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Endpoints of an OAuth2 provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    authorization: AuthUrl,
    token: TokenUrl,
    userinfo: Url,
}

/// The subset of the discovery document this crate needs.
#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    authorization_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
}

impl ProviderEndpoints {
    /// Creates endpoints from explicit URLs.
    ///
    /// # Errors
    ///
    /// Returns the name of the first endpoint that is not an absolute URL,
    /// together with the parse error.
    pub fn new(
        authorization: &str,
        token: &str,
        userinfo: &str,
    ) -> Result<Self, (&'static str, url::ParseError)> {
        let authorization = AuthUrl::new(authorization.to_string())
            .map_err(|e| ("authorization_endpoint", e))?;
        let token = TokenUrl::new(token.to_string()).map_err(|e| ("token_endpoint", e))?;
        let userinfo = Url::parse(userinfo).map_err(|e| ("userinfo_endpoint", e))?;

        Ok(Self {
            authorization,
            token,
            userinfo,
        })
    }

    /// Fetches and parses a provider's discovery document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be fetched, the request times
    /// out, the endpoint answers with a non-success status, or the document
    /// lacks one of the required endpoints.
    #[instrument(skip(http_client))]
    pub async fn discover(
        http_client: &reqwest::Client,
        url: &str,
    ) -> Result<Self, Report<DiscoveryError>> {
        let response = http_client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Timeout {
                    url: url.to_string(),
                }
            } else {
                DiscoveryError::Unreachable {
                    url: url.to_string(),
                    details: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Timeout {
                    url: url.to_string(),
                }
            } else {
                DiscoveryError::Unreachable {
                    url: url.to_string(),
                    details: e.to_string(),
                }
            }
        })?;

        let document: DiscoveryDocument =
            serde_json::from_slice(&body).map_err(|e| DiscoveryError::Malformed {
                url: url.to_string(),
                details: e.to_string(),
            })?;

        let endpoints = Self::new(
            &document.authorization_endpoint,
            &document.token_endpoint,
            &document.userinfo_endpoint,
        )
        .map_err(|(field, e)| DiscoveryError::Malformed {
            url: url.to_string(),
            details: format!("{field}: {e}"),
        })?;

        debug!(
            authorization = %endpoints.authorization.as_str(),
            token = %endpoints.token.as_str(),
            userinfo = %endpoints.userinfo,
            "discovered provider endpoints"
        );

        Ok(endpoints)
    }

    /// Returns the authorization endpoint.
    #[must_use]
    pub fn authorization(&self) -> &AuthUrl {
        &self.authorization
    }

    /// Returns the token endpoint.
    #[must_use]
    pub fn token(&self) -> &TokenUrl {
        &self.token
    }

    /// Returns the userinfo endpoint.
    #[must_use]
    pub fn userinfo(&self) -> &Url {
        &self.userinfo
    }
}

/// Settings shared by all providers.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    discovery_urls: HashMap<ProviderName, String>,
    timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            discovery_urls: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ProviderSettings {
    /// Creates a settings builder.
    #[must_use]
    pub fn builder() -> ProviderSettingsBuilder {
        ProviderSettingsBuilder::default()
    }

    /// Returns the discovery URL override for a provider, if any.
    #[must_use]
    pub fn discovery_url(&self, provider: &ProviderName) -> Option<&str> {
        self.discovery_urls.get(provider).map(String::as_str)
    }

    /// Returns the timeout applied to every provider call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Builder for `ProviderSettings`.
#[derive(Debug, Default)]
pub struct ProviderSettingsBuilder {
    settings: ProviderSettings,
}

impl ProviderSettingsBuilder {
    /// Overrides the discovery document URL of a provider.
    #[must_use]
    pub fn discovery_url(mut self, provider: ProviderName, url: String) -> Self {
        self.settings.discovery_urls.insert(provider, url);
        self
    }

    /// Sets the timeout applied to every provider call.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Builds the `ProviderSettings`.
    #[must_use]
    pub fn build(self) -> ProviderSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WELL_KNOWN: &str = "/.well-known/openid-configuration";

    async fn discover_from(template: ResponseTemplate) -> Result<ProviderEndpoints, String> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WELL_KNOWN))
            .respond_with(template)
            .mount(&server)
            .await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(500))
            .build()
            .expect("client");
        ProviderEndpoints::discover(&client, &format!("{}{}", server.uri(), WELL_KNOWN))
            .await
            .map_err(|report| report.to_string())
    }

    #[tokio::test]
    async fn discover_extracts_endpoints() {
        let endpoints = discover_from(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({
                "issuer": "https://accounts.example.com",
                "authorization_endpoint": "https://accounts.example.com/o/oauth2/v2/auth",
                "token_endpoint": "https://oauth2.example.com/token",
                "userinfo_endpoint": "https://openidconnect.example.com/v1/userinfo",
                "jwks_uri": "https://www.example.com/oauth2/v3/certs"
            }),
        ))
        .await
        .expect("discovery should succeed");

        assert_eq!(
            endpoints.authorization().as_str(),
            "https://accounts.example.com/o/oauth2/v2/auth"
        );
        assert_eq!(endpoints.token().as_str(), "https://oauth2.example.com/token");
        assert_eq!(
            endpoints.userinfo().as_str(),
            "https://openidconnect.example.com/v1/userinfo"
        );
    }

    #[tokio::test]
    async fn discover_rejects_missing_endpoint() {
        let err = discover_from(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authorization_endpoint": "https://accounts.example.com/auth",
            "token_endpoint": "https://accounts.example.com/token"
        })))
        .await
        .unwrap_err();

        assert!(err.contains("malformed"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn discover_rejects_relative_endpoint() {
        let err = discover_from(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authorization_endpoint": "/auth",
            "token_endpoint": "https://accounts.example.com/token",
            "userinfo_endpoint": "https://accounts.example.com/userinfo"
        })))
        .await
        .unwrap_err();

        assert!(err.contains("authorization_endpoint"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn discover_reports_status() {
        let err = discover_from(ResponseTemplate::new(503)).await.unwrap_err();
        assert!(err.contains("503"), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn discover_reports_timeout() {
        let err = discover_from(
            ResponseTemplate::new(200).set_delay(Duration::from_secs(2)),
        )
        .await
        .unwrap_err();
        assert!(err.contains("timed out"), "unexpected error: {err}");
    }

    #[test]
    fn settings_builder_overrides() {
        let google = ProviderName::from_static("google");
        let settings = ProviderSettings::builder()
            .discovery_url(google.clone(), "http://127.0.0.1:9/wk".to_string())
            .timeout(Duration::from_secs(2))
            .build();

        assert_eq!(settings.discovery_url(&google), Some("http://127.0.0.1:9/wk"));
        assert_eq!(settings.timeout(), Duration::from_secs(2));
        assert_eq!(ProviderSettings::default().timeout(), DEFAULT_TIMEOUT);
    }
}
