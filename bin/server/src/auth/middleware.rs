//! Authentication gate extractor for Axum.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{SignedCookieJar, cookie::Key};
use oauth_sidecar_platform_access::Session;
use tracing::debug;

use super::{AUTHORIZE_PATH, SESSION_COOKIE, found};
use crate::app::AppState;
use crate::external::ExternalOrigin;

/// Extractor for requiring an established, unexpired session.
///
/// If there is none, the client is redirected to the authorization route.
pub struct RequireSession(pub Session);

impl<S> FromRequestParts<S> for RequireSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let jar = SignedCookieJar::from_headers(&parts.headers, Key::from_ref(&app_state));

        // Unsigned or tampered cookies are not returned by the jar
        let session = jar
            .get(SESSION_COOKIE)
            .and_then(|cookie| match Session::decode(cookie.value()) {
                Ok(session) => Some(session),
                Err(e) => {
                    debug!(error = %e, "ignoring session cookie");
                    None
                }
            });

        match session {
            Some(session) => Ok(RequireSession(session)),
            None => {
                let location = ExternalOrigin::resolve(parts, &app_state.config)
                    .and_then(|origin| origin.url(AUTHORIZE_PATH).ok())
                    .map_or_else(|| AUTHORIZE_PATH.to_string(), String::from);
                Err(AuthRejection::NotAuthenticated { location })
            }
        }
    }
}

/// Rejection type for the authentication gate.
#[derive(Debug)]
pub enum AuthRejection {
    /// No valid session; carries the authorization route's URL.
    NotAuthenticated { location: String },
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::NotAuthenticated { location } => found(&location),
        }
    }
}
