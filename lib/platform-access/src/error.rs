//! Error types for the platform-access crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ConfigurationError`: invalid credentials, endpoints or provider names
//! - `DiscoveryError`: a provider's discovery document could not be used
//! - `TokenExchangeError`: an authorization code did not yield an identity
//! - `RegistryError`: a provider could not be resolved from the registry
//! - `SessionError`: a session or auth-state cookie could not be decoded

use oauth_sidecar_core::ProviderName;
use std::fmt;

/// Errors from invalid startup configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The provider name is not in the static provider table.
    UnknownProvider { name: String },
    /// No credentials were configured for a known provider.
    MissingCredentials { provider: ProviderName },
    /// A configured URL could not be parsed.
    InvalidUrl { field: &'static str, details: String },
    /// A configured value is present but unusable.
    InvalidValue { field: &'static str, details: String },
    /// Configuration could not be read or a required value is missing.
    Load { details: String },
    /// The outbound HTTP client could not be built.
    HttpClient { details: String },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProvider { name } => write!(f, "unknown provider '{name}'"),
            Self::MissingCredentials { provider } => {
                write!(f, "no credentials configured for provider '{provider}'")
            }
            Self::InvalidUrl { field, details } => write!(f, "invalid {field}: {details}"),
            Self::InvalidValue { field, details } => write!(f, "invalid {field}: {details}"),
            Self::Load { details } => write!(f, "failed to load configuration: {details}"),
            Self::HttpClient { details } => write!(f, "failed to build HTTP client: {details}"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Errors from fetching or interpreting a provider discovery document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// The discovery document could not be fetched.
    Unreachable { url: String, details: String },
    /// The discovery request timed out.
    Timeout { url: String },
    /// The discovery endpoint answered with a non-success status.
    Status { url: String, status: u16 },
    /// The discovery document is not valid or lacks a required endpoint.
    Malformed { url: String, details: String },
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable { url, details } => {
                write!(f, "discovery document at '{url}' is unreachable: {details}")
            }
            Self::Timeout { url } => write!(f, "discovery request to '{url}' timed out"),
            Self::Status { url, status } => {
                write!(f, "discovery document at '{url}' returned status {status}")
            }
            Self::Malformed { url, details } => {
                write!(f, "discovery document at '{url}' is malformed: {details}")
            }
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Errors from exchanging an authorization code for an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenExchangeError {
    /// The token endpoint rejected the code or could not be reached.
    Exchange { provider: ProviderName, details: String },
    /// A provider call timed out.
    Timeout {
        provider: ProviderName,
        endpoint: &'static str,
    },
    /// The userinfo endpoint could not be reached.
    Userinfo { provider: ProviderName, details: String },
    /// The userinfo endpoint answered with a non-success status.
    UserinfoStatus { provider: ProviderName, status: u16 },
    /// The userinfo document is not a usable identity.
    MalformedIdentity { provider: ProviderName, details: String },
}

impl fmt::Display for TokenExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exchange { provider, details } => {
                write!(f, "provider '{provider}' token exchange failed: {details}")
            }
            Self::Timeout { provider, endpoint } => {
                write!(f, "provider '{provider}' {endpoint} request timed out")
            }
            Self::Userinfo { provider, details } => {
                write!(f, "provider '{provider}' userinfo request failed: {details}")
            }
            Self::UserinfoStatus { provider, status } => {
                write!(f, "provider '{provider}' userinfo returned status {status}")
            }
            Self::MalformedIdentity { provider, details } => {
                write!(f, "provider '{provider}' returned an unusable identity: {details}")
            }
        }
    }
}

impl std::error::Error for TokenExchangeError {}

/// Errors from resolving a provider through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The provider is unknown, lacks credentials or is misconfigured.
    Configuration(ConfigurationError),
    /// The provider's discovery failed.
    Discovery { provider: ProviderName },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "provider configuration error: {err}"),
            Self::Discovery { provider } => {
                write!(f, "failed to initialize provider '{provider}'")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<ConfigurationError> for RegistryError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

/// Errors from decoding cookie payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The payload is not valid base64url-encoded JSON of the expected shape.
    Malformed { details: String },
    /// The session is past its expiry time.
    Expired,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { details } => write!(f, "malformed cookie payload: {details}"),
            Self::Expired => write!(f, "session has expired"),
        }
    }
}

impl std::error::Error for SessionError {}
