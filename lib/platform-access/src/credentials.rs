//! OAuth2 client credentials, keyed by provider name.
//!
//! Credentials are loaded once at process start and never change afterwards.

use oauth_sidecar_core::ProviderName;
use std::collections::BTreeMap;
use std::fmt;

/// Client id and secret registered with one provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    id: String,
    secret: String,
}

impl ClientCredentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

// The secret never appears in logs.
impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Credentials for every configured provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    entries: BTreeMap<ProviderName, ClientCredentials>,
}

impl Credentials {
    /// Creates an empty credential table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the credentials of a provider.
    #[must_use]
    pub fn with(mut self, provider: ProviderName, credentials: ClientCredentials) -> Self {
        self.entries.insert(provider, credentials);
        self
    }

    /// Returns the credentials of a provider, if configured.
    #[must_use]
    pub fn get(&self, provider: &ProviderName) -> Option<&ClientCredentials> {
        self.entries.get(provider)
    }
}
