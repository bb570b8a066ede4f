//! oauth-sidecar server.
//!
//! An authenticating reverse proxy deployed next to a single internal
//! service. Every request needs a session established through the OAuth2
//! authorization-code flow; authenticated requests are forwarded to the
//! backend with the caller's email in `X-Remote-User`.

pub mod app;
pub mod auth;
pub mod config;
pub mod cors;
pub mod error;
pub mod external;
pub mod proxy;
