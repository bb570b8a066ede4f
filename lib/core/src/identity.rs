//! The verified identity returned by a provider's userinfo endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Errors from interpreting a userinfo document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The document is not a JSON object.
    NotAnObject,
    /// The document has no string `email` claim.
    MissingEmail,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "userinfo document is not a JSON object"),
            Self::MissingEmail => write!(f, "userinfo document has no email claim"),
        }
    }
}

impl std::error::Error for IdentityError {}

/// A user record obtained from a successful token exchange.
///
/// Only `email` is interpreted; every other claim is kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    email: String,
    #[serde(flatten)]
    claims: Map<String, Value>,
}

impl Identity {
    /// Creates an identity with no claims besides the email.
    #[must_use]
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            claims: Map::new(),
        }
    }

    /// Builds an identity from a userinfo JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not an object or lacks a string
    /// `email` claim.
    pub fn from_userinfo(document: Value) -> Result<Self, IdentityError> {
        let Value::Object(mut claims) = document else {
            return Err(IdentityError::NotAnObject);
        };

        match claims.remove("email") {
            Some(Value::String(email)) if !email.is_empty() => Ok(Self { email, claims }),
            _ => Err(IdentityError::MissingEmail),
        }
    }

    /// Returns the email address forwarded as the trust header.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_userinfo_keeps_other_claims() {
        let identity = Identity::from_userinfo(json!({
            "sub": "1234567890",
            "email": "alice@example.com",
            "email_verified": true
        }))
        .expect("valid userinfo");

        assert_eq!(identity.email(), "alice@example.com");
        assert_eq!(identity.claims.get("sub"), Some(&json!("1234567890")));
        assert_eq!(identity.claims.get("email_verified"), Some(&json!(true)));
        assert!(identity.claims.get("email").is_none());
    }

    #[test]
    fn from_userinfo_requires_email() {
        let err = Identity::from_userinfo(json!({ "sub": "1" })).unwrap_err();
        assert_eq!(err, IdentityError::MissingEmail);

        let err = Identity::from_userinfo(json!({ "email": 42 })).unwrap_err();
        assert_eq!(err, IdentityError::MissingEmail);

        let err = Identity::from_userinfo(json!({ "email": "" })).unwrap_err();
        assert_eq!(err, IdentityError::MissingEmail);
    }

    #[test]
    fn from_userinfo_rejects_non_objects() {
        let err = Identity::from_userinfo(json!(["alice@example.com"])).unwrap_err();
        assert_eq!(err, IdentityError::NotAnObject);
    }

    #[test]
    fn serializes_flat() {
        let identity = Identity::from_userinfo(json!({
            "email": "bob@example.com",
            "hd": "example.com"
        }))
        .expect("valid userinfo");

        let value = serde_json::to_value(&identity).expect("serialize");
        assert_eq!(value, json!({ "email": "bob@example.com", "hd": "example.com" }));
    }
}
