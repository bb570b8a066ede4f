//! Authentication for the sidecar.
//!
//! This module provides:
//! - The authorization-code routes (authorize, callback, logout)
//! - The `RequireSession` extractor that gates every proxied request
//!
//! Sessions are carried by the client in a signed cookie; the callback route
//! is the only writer and logout the only deleter.

pub mod middleware;
pub mod routes;

use axum::{
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};

pub use middleware::{AuthRejection, RequireSession};
pub use routes::{AuthError, authorize, callback, logout};

/// Route that starts the authorization flow.
pub const AUTHORIZE_PATH: &str = "/oauth2authorize";

/// Route the provider redirects back to.
pub const CALLBACK_PATH: &str = "/oauth2callback";

/// Route that ends the session.
pub const LOGOUT_PATH: &str = "/oauth2logout";

/// Session cookie name.
pub const SESSION_COOKIE: &str = "session";

/// Auth state cookie name (CSRF token and PKCE verifier during the flow).
pub const AUTH_STATE_COOKIE: &str = "oauth2_state";

/// Builds a `302 Found` redirect.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}
