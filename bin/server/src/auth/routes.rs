//! Authentication routes for authorize, callback, and logout.

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    SignedCookieJar,
    cookie::{Cookie, SameSite},
};
use oauth_sidecar_platform_access::{AuthState, CallbackQuery, Session};
use time::Duration as TimeDuration;
use tracing::{debug, error, info, warn};

use super::{AUTH_STATE_COOKIE, SESSION_COOKIE, found};
use crate::app::AppState;
use crate::external::ExternalOrigin;

/// Lifetime of the auth state cookie.
const AUTH_STATE_MINUTES: i64 = 10;

/// Starts the authorization flow by redirecting to the provider.
pub async fn authorize(
    State(state): State<AppState>,
    origin: ExternalOrigin,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let provider = state
        .provider()
        .await
        .map_err(|report| AuthError::ProviderUnavailable(report.to_string()))?;

    let callback_url = origin
        .callback_url()
        .map_err(|e| AuthError::InvalidHost(e.to_string()))?;

    let request = provider.authorize(&callback_url);

    // Keep the CSRF token and PKCE verifier until the callback
    let cookie = Cookie::build((AUTH_STATE_COOKIE, request.state.encode()))
        .path("/")
        .http_only(true)
        .secure(state.config.session.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(AUTH_STATE_MINUTES));

    debug!(provider = %provider.name(), callback_url = %callback_url, "redirecting to provider");

    Ok((jar.add(cookie), found(request.url.as_str())))
}

/// Completes the authorization flow after the user signs in with the provider.
pub async fn callback(
    State(state): State<AppState>,
    origin: ExternalOrigin,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    jar: SignedCookieJar,
) -> Result<impl IntoResponse, AuthError> {
    let Query(query) = query.map_err(|e| AuthError::InvalidQuery(e.body_text()))?;

    // Retrieve and validate auth state from cookie
    let auth_state_cookie = jar
        .get(AUTH_STATE_COOKIE)
        .ok_or(AuthError::MissingAuthState)?;

    let auth_state = AuthState::decode(auth_state_cookie.value())
        .map_err(|e| AuthError::InvalidAuthState(e.to_string()))?;

    // Validate CSRF token
    if !auth_state.matches(query.state.as_deref()) {
        return Err(AuthError::CsrfMismatch);
    }

    let provider = state
        .provider()
        .await
        .map_err(|report| AuthError::ProviderUnavailable(report.to_string()))?;

    let callback_url = origin
        .callback_url()
        .map_err(|e| AuthError::InvalidHost(e.to_string()))?;

    let identity = provider
        .callback(&query, &auth_state, &callback_url)
        .await
        .map_err(|report| AuthError::TokenExchange(report.to_string()))?
        .ok_or(AuthError::NoIdentity)?;

    let session = Session::establish(&identity, state.session_duration());
    info!(email = %session.email(), expires_at = %session.expires_at(), "session established");

    // Set session cookie
    let session_cookie = Cookie::build((SESSION_COOKIE, session.encode()))
        .path("/")
        .http_only(true)
        .secure(state.config.session.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(TimeDuration::minutes(state.config.session.duration_minutes));

    // Remove auth state cookie
    let remove_auth_state = Cookie::build((AUTH_STATE_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    let jar = jar.add(session_cookie).add(remove_auth_state);

    Ok((jar, found("/")))
}

/// Ends the session by removing its cookie.
pub async fn logout(jar: SignedCookieJar) -> impl IntoResponse {
    if jar.get(SESSION_COOKIE).is_some() {
        info!("session ended");
    }

    // Remove session cookie
    let remove_session = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(TimeDuration::ZERO);

    (jar.add(remove_session), found("/"))
}

/// Authentication errors.
///
/// Every callback failure answers with the same 404 so that the cause is
/// never revealed to the client.
#[derive(Debug)]
pub enum AuthError {
    ProviderUnavailable(String),
    InvalidHost(String),
    InvalidQuery(String),
    MissingAuthState,
    InvalidAuthState(String),
    CsrfMismatch,
    NoIdentity,
    TokenExchange(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::ProviderUnavailable(msg) => {
                error!("Provider unavailable: {}", msg);
                (StatusCode::BAD_GATEWAY, "Authentication provider unavailable")
            }
            Self::InvalidHost(msg) => {
                warn!("Invalid host for callback URL: {}", msg);
                (StatusCode::BAD_REQUEST, "Invalid Host header")
            }
            Self::InvalidQuery(msg) => {
                warn!("Malformed callback query: {}", msg);
                (StatusCode::NOT_FOUND, "Not Found")
            }
            Self::MissingAuthState => {
                debug!("Callback without auth state cookie");
                (StatusCode::NOT_FOUND, "Not Found")
            }
            Self::InvalidAuthState(msg) => {
                warn!("Invalid auth state cookie: {}", msg);
                (StatusCode::NOT_FOUND, "Not Found")
            }
            Self::CsrfMismatch => {
                warn!("CSRF token mismatch on callback");
                (StatusCode::NOT_FOUND, "Not Found")
            }
            Self::NoIdentity => {
                debug!("Callback without authorization code");
                (StatusCode::NOT_FOUND, "Not Found")
            }
            Self::TokenExchange(msg) => {
                warn!("Token exchange failed: {}", msg);
                (StatusCode::NOT_FOUND, "Not Found")
            }
        };

        (status, message).into_response()
    }
}
