//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the sidecar,
//! loaded via the `config` crate from environment variables. Nested values
//! use `__` as separator, so `SESSION__DURATION_MINUTES` sets
//! [`SessionConfig::duration_minutes`].

use axum_extra::extract::cookie::Key;
use oauth_sidecar_core::ProviderName;
use oauth_sidecar_platform_access::{
    ClientCredentials, ConfigurationError, Credentials, GoogleProvider, ProviderSettings,
};
use rootcause::prelude::Report;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Minimum length of `SESSION_SECRET`, imposed by the cookie signing key.
const MIN_SESSION_SECRET_LEN: usize = 64;

/// Longest accepted session lifetime: one year.
const MAX_SESSION_DURATION_MINUTES: i64 = 366 * 24 * 60;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// OAuth2 client id issued by the provider.
    pub client_id: String,

    /// OAuth2 client secret issued by the provider.
    pub client_secret: String,

    /// Base URL of the protected service.
    pub internal_backend: String,

    /// Address the proxy listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Host used for absolute self URLs. Falls back to the request's `Host`.
    #[serde(default)]
    pub external_host: Option<String>,

    /// Scheme used for absolute self URLs.
    #[serde(default = "default_callback_scheme")]
    pub callback_scheme: String,

    /// Overrides the provider's discovery document URL.
    #[serde(default)]
    pub discovery_url: Option<String>,

    /// Timeout of every outbound call, in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Secret used to sign cookies. A random key is generated when unset,
    /// which invalidates all sessions on restart.
    #[serde(default)]
    pub session_secret: Option<String>,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session duration in minutes.
    #[serde(default = "default_session_duration_minutes")]
    pub duration_minutes: i64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_callback_scheme() -> String {
    "https".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    5
}

fn default_session_duration_minutes() -> i64 {
    480
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_session_duration_minutes(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, Report<ConfigurationError>> {
        Self::load(config::Environment::default())
    }

    /// Loads configuration from an environment source.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn load(environment: config::Environment) -> Result<Self, Report<ConfigurationError>> {
        let config: Self = config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| ConfigurationError::Load {
                details: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        for (field, value) in [
            ("CLIENT_ID", &self.client_id),
            ("CLIENT_SECRET", &self.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigurationError::InvalidValue {
                    field,
                    details: "must not be empty".to_string(),
                });
            }
        }

        self.backend_url()?;

        if let Some(url) = &self.discovery_url {
            Url::parse(url).map_err(|e| ConfigurationError::InvalidUrl {
                field: "DISCOVERY_URL",
                details: e.to_string(),
            })?;
        }

        if !matches!(self.callback_scheme.as_str(), "http" | "https") {
            return Err(ConfigurationError::InvalidValue {
                field: "CALLBACK_SCHEME",
                details: format!("expected 'http' or 'https', got '{}'", self.callback_scheme),
            });
        }

        if self.request_timeout_seconds == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "REQUEST_TIMEOUT_SECONDS",
                details: "must be greater than zero".to_string(),
            });
        }

        if !(1..=MAX_SESSION_DURATION_MINUTES).contains(&self.session.duration_minutes) {
            return Err(ConfigurationError::InvalidValue {
                field: "SESSION__DURATION_MINUTES",
                details: format!("must be between 1 and {MAX_SESSION_DURATION_MINUTES}"),
            });
        }

        if let Some(secret) = &self.session_secret
            && secret.len() < MIN_SESSION_SECRET_LEN
        {
            return Err(ConfigurationError::InvalidValue {
                field: "SESSION_SECRET",
                details: format!("must be at least {MIN_SESSION_SECRET_LEN} bytes"),
            });
        }

        Ok(())
    }

    /// Returns the parsed backend base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `INTERNAL_BACKEND` is not an absolute http(s) URL.
    pub fn backend_url(&self) -> Result<Url, ConfigurationError> {
        let url = Url::parse(&self.internal_backend).map_err(|e| {
            ConfigurationError::InvalidUrl {
                field: "INTERNAL_BACKEND",
                details: e.to_string(),
            }
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ConfigurationError::InvalidUrl {
                field: "INTERNAL_BACKEND",
                details: format!("'{url}' is not an http(s) base URL"),
            });
        }
        Ok(url)
    }

    /// Returns the timeout applied to every outbound call.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// Returns the provider the gate sends users to.
    #[must_use]
    pub fn provider_name(&self) -> ProviderName {
        ProviderName::from_static(GoogleProvider::NAME)
    }

    /// Returns the configured provider credentials.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new().with(
            self.provider_name(),
            ClientCredentials::new(&self.client_id, &self.client_secret),
        )
    }

    /// Returns the provider settings derived from this configuration.
    #[must_use]
    pub fn provider_settings(&self) -> ProviderSettings {
        let builder = ProviderSettings::builder().timeout(self.request_timeout());
        match &self.discovery_url {
            Some(url) => builder.discovery_url(self.provider_name(), url.clone()),
            None => builder,
        }
        .build()
    }

    /// Returns the cookie signing key, or `None` when no secret is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is too short to derive a key from.
    pub fn cookie_key(&self) -> Result<Option<Key>, ConfigurationError> {
        self.session_secret
            .as_ref()
            .map(|secret| {
                Key::try_from(secret.as_bytes()).map_err(|e| ConfigurationError::InvalidValue {
                    field: "SESSION_SECRET",
                    details: e.to_string(),
                })
            })
            .transpose()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn environment(vars: &[(&str, &str)]) -> config::Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        config::Environment::default().source(Some(source))
    }

    pub(crate) const REQUIRED: &[(&str, &str)] = &[
        ("CLIENT_ID", "client-id"),
        ("CLIENT_SECRET", "client-secret"),
        ("INTERNAL_BACKEND", "http://127.0.0.1:9000"),
    ];

    fn with_required(extra: &[(&str, &str)]) -> config::Environment {
        let vars: Vec<_> = REQUIRED.iter().chain(extra).copied().collect();
        environment(&vars)
    }

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.duration_minutes, 480);
        assert!(config.secure_cookies);
    }

    #[test]
    fn loads_required_values_with_defaults() {
        let config = ServerConfig::load(with_required(&[])).expect("valid configuration");

        assert_eq!(config.client_id, "client-id");
        assert_eq!(config.client_secret, "client-secret");
        assert_eq!(config.backend_url().expect("url").as_str(), "http://127.0.0.1:9000/");
        assert_eq!(config.listen_addr, "0.0.0.0:8000".parse().expect("addr"));
        assert_eq!(config.external_host, None);
        assert_eq!(config.callback_scheme, "https");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.session.duration_minutes, 480);
        assert!(config.cookie_key().expect("no secret").is_none());
    }

    #[test]
    fn loads_optional_and_nested_values() {
        let secret = "s".repeat(64);
        let config = ServerConfig::load(with_required(&[
            ("LISTEN_ADDR", "127.0.0.1:8080"),
            ("EXTERNAL_HOST", "sidecar.example.com"),
            ("CALLBACK_SCHEME", "http"),
            ("REQUEST_TIMEOUT_SECONDS", "2"),
            ("SESSION_SECRET", secret.as_str()),
            ("SESSION__DURATION_MINUTES", "15"),
            ("SESSION__SECURE_COOKIES", "false"),
        ]))
        .expect("valid configuration");

        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse().expect("addr"));
        assert_eq!(config.external_host.as_deref(), Some("sidecar.example.com"));
        assert_eq!(config.callback_scheme, "http");
        assert_eq!(config.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.session.duration_minutes, 15);
        assert!(!config.session.secure_cookies);
        assert!(config.cookie_key().expect("valid secret").is_some());
    }

    #[test]
    fn missing_required_value_is_rejected() {
        let err = ServerConfig::load(environment(&[
            ("CLIENT_ID", "client-id"),
            ("INTERNAL_BACKEND", "http://127.0.0.1:9000"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("client_secret"), "{err}");
    }

    #[test]
    fn invalid_backend_is_rejected() {
        let err = ServerConfig::load(environment(&[
            ("CLIENT_ID", "client-id"),
            ("CLIENT_SECRET", "client-secret"),
            ("INTERNAL_BACKEND", "not a url"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("INTERNAL_BACKEND"), "{err}");
    }

    #[test]
    fn short_session_secret_is_rejected() {
        let err = ServerConfig::load(with_required(&[("SESSION_SECRET", "too-short")]))
            .unwrap_err();
        assert!(err.to_string().contains("SESSION_SECRET"), "{err}");
    }

    #[test]
    fn out_of_range_session_duration_is_rejected() {
        for minutes in ["0", "-5", "527041", "9223372036854775807"] {
            let err = ServerConfig::load(with_required(&[("SESSION__DURATION_MINUTES", minutes)]))
                .unwrap_err();
            assert!(
                err.to_string().contains("SESSION__DURATION_MINUTES"),
                "{minutes}: {err}"
            );
        }

        let config = ServerConfig::load(with_required(&[("SESSION__DURATION_MINUTES", "527040")]))
            .expect("one year is accepted");
        assert_eq!(config.session.duration_minutes, MAX_SESSION_DURATION_MINUTES);
    }

    #[test]
    fn discovery_url_override_reaches_provider_settings() {
        let config = ServerConfig::load(with_required(&[(
            "DISCOVERY_URL",
            "http://127.0.0.1:9001/.well-known/openid-configuration",
        )]))
        .expect("valid configuration");

        let settings = config.provider_settings();
        assert_eq!(
            settings.discovery_url(&config.provider_name()),
            Some("http://127.0.0.1:9001/.well-known/openid-configuration")
        );
        assert!(config.credentials().get(&config.provider_name()).is_some());
    }
}
