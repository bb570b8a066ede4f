//! Strongly-typed provider names.
//!
//! Provider names key the credential table and the provider registry. They
//! are short lowercase tokens such as `google`.

use std::fmt;
use std::str::FromStr;

/// Error returned when parsing a provider name from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProviderNameError {
    /// The rejected input.
    pub input: String,
    /// The reason for the parse failure.
    pub reason: &'static str,
}

impl fmt::Display for ParseProviderNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid provider name '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for ParseProviderNameError {}

/// Name of an OAuth2 provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderName(String);

impl ProviderName {
    /// Creates a provider name from a compile-time constant.
    ///
    /// Intended for the static provider table; the value is not validated.
    #[must_use]
    pub fn from_static(name: &'static str) -> Self {
        Self(name.to_string())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProviderName {
    type Err = ParseProviderNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reject = |reason| ParseProviderNameError {
            input: s.to_string(),
            reason,
        };

        if s.is_empty() {
            return Err(reject("name is empty"));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(reject("only lowercase letters, digits, '-' and '_' are allowed"));
        }

        Ok(Self(s.to_string()))
    }
}
