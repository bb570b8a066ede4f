//! Types exchanged across the authorization-code flow.
//!
//! - `CallbackUrl`: the absolute URL the provider redirects back to
//! - `AuthorizationRequest`: where to send the user, plus the secrets to keep
//! - `AuthState`: CSRF token and PKCE verifier carried between the two legs
//! - `CallbackQuery`: the query parameters the provider sends back

use crate::error::SessionError;
use crate::session::{decode_payload, encode_payload};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Absolute URL of this service's callback route.
///
/// The same value must be sent as `redirect_uri` when authorizing and when
/// exchanging the code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrl(Url);

impl CallbackUrl {
    /// Wraps an absolute callback URL.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self(url)
    }

    /// Builds `<scheme>://<host><path>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parts do not form a valid absolute URL.
    pub fn from_parts(scheme: &str, host: &str, path: &str) -> Result<Self, url::ParseError> {
        Url::parse(&format!("{scheme}://{host}{path}")).map(Self)
    }

    /// Returns the URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the underlying URL.
    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for CallbackUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Secrets generated when authorizing and checked on the callback.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    csrf_token: String,
    pkce_verifier: String,
}

impl AuthState {
    /// Creates an auth state.
    #[must_use]
    pub fn new(csrf_token: String, pkce_verifier: String) -> Self {
        Self {
            csrf_token,
            pkce_verifier,
        }
    }

    /// Returns the CSRF token sent as the `state` parameter.
    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    /// Returns the PKCE code verifier.
    #[must_use]
    pub fn pkce_verifier(&self) -> &str {
        &self.pkce_verifier
    }

    /// Returns true if the `state` parameter returned by the provider
    /// matches the CSRF token.
    #[must_use]
    pub fn matches(&self, returned_state: Option<&str>) -> bool {
        returned_state.is_some_and(|state| state == self.csrf_token)
    }

    /// Encodes the state for cookie storage.
    #[must_use]
    pub fn encode(&self) -> String {
        encode_payload(self)
    }

    /// Decodes a state previously produced by [`AuthState::encode`].
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid encoded state.
    pub fn decode(value: &str) -> Result<Self, SessionError> {
        decode_payload(value)
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("csrf_token", &self.csrf_token)
            .field("pkce_verifier", &"<redacted>")
            .finish()
    }
}

/// Where to send the user to log in.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// The provider's authorization URL with all request parameters.
    pub url: Url,
    /// Secrets to keep until the callback.
    pub state: AuthState,
}

/// Query parameters of the provider's redirect back to the callback route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    /// The authorization code, absent when the user denied access.
    pub code: Option<String>,
    /// The CSRF token echoed back by the provider.
    pub state: Option<String>,
    /// Error code reported by the provider, if any.
    pub error: Option<String>,
}
