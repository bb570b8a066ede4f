//! Session model for authenticated clients.
//!
//! A session is created by a successful callback and carried by the client in
//! a signed cookie. It holds the verified email and its validity window; an
//! expired session is treated exactly like a missing one.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use oauth_sidecar_core::Identity;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::SessionError;

/// An established login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Email of the verified identity.
    email: String,
    /// When the callback established the session.
    issued_at: DateTime<Utc>,
    /// When the session stops being accepted.
    expires_at: DateTime<Utc>,
}

impl Session {
    /// Establishes a session for a verified identity.
    ///
    /// The session is valid for the specified duration.
    #[must_use]
    pub fn establish(identity: &Identity, duration: Duration) -> Self {
        let now = Utc::now();
        Self {
            email: identity.email().to_string(),
            issued_at: now,
            expires_at: now + duration,
        }
    }

    /// Returns the email forwarded as the trust header.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns when the session expires.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Encodes the session for cookie storage.
    #[must_use]
    pub fn encode(&self) -> String {
        encode_payload(self)
    }

    /// Decodes a cookie value and checks that the session is still valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is malformed or the session expired.
    pub fn decode(value: &str) -> Result<Self, SessionError> {
        let session: Self = decode_payload(value)?;
        if session.is_expired() {
            return Err(SessionError::Expired);
        }
        Ok(session)
    }
}

/// Serializes a value as base64url-encoded JSON, safe for cookie values.
pub(crate) fn encode_payload<T: Serialize>(value: &T) -> String {
    // Serializing these plain structs cannot fail.
    let json = serde_json::to_vec(value).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

pub(crate) fn decode_payload<T: DeserializeOwned>(value: &str) -> Result<T, SessionError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| SessionError::Malformed {
            details: e.to_string(),
        })?;
    serde_json::from_slice(&bytes).map_err(|e| SessionError::Malformed {
        details: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new("alice@example.com")
    }

    #[test]
    fn established_session_has_correct_fields() {
        let before = Utc::now();
        let session = Session::establish(&identity(), Duration::hours(1));
        let after = Utc::now();

        assert_eq!(session.email(), "alice@example.com");
        assert!(session.issued_at >= before);
        assert!(session.issued_at <= after);
        assert_eq!(session.expires_at() - session.issued_at, Duration::hours(1));
        assert!(!session.is_expired());
    }

    #[test]
    fn session_expiration() {
        let session = Session::establish(&identity(), Duration::seconds(-1));
        assert!(session.is_expired());
    }

    #[test]
    fn decode_accepts_encoded_session() {
        let session = Session::establish(&identity(), Duration::hours(1));
        let decoded = Session::decode(&session.encode()).expect("decodes");
        assert_eq!(decoded, session);
    }

    #[test]
    fn decode_rejects_expired_session() {
        let session = Session::establish(&identity(), Duration::seconds(-1));
        assert_eq!(
            Session::decode(&session.encode()).unwrap_err(),
            SessionError::Expired
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            Session::decode("not base64!").unwrap_err(),
            SessionError::Malformed { .. }
        ));

        let not_a_session = URL_SAFE_NO_PAD.encode(br#"{"email":"a@b.c"}"#);
        assert!(matches!(
            Session::decode(&not_a_session).unwrap_err(),
            SessionError::Malformed { .. }
        ));
    }

    #[test]
    fn encoded_value_is_cookie_safe() {
        let encoded = Session::establish(&identity(), Duration::hours(1)).encode();
        assert!(
            encoded
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }
}
