//! Absolute URLs of the sidecar as seen by the browser.
//!
//! The host is the configured `EXTERNAL_HOST` when set, otherwise the
//! request's `Host` header, otherwise the authority of the request URI.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header::HOST, request::Parts},
    response::{IntoResponse, Response},
};
use oauth_sidecar_platform_access::CallbackUrl;
use url::Url;

use crate::app::AppState;
use crate::auth::CALLBACK_PATH;
use crate::config::ServerConfig;

/// Scheme and host of the sidecar's public address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalOrigin {
    scheme: String,
    host: String,
}

impl ExternalOrigin {
    /// Resolves the origin for a request.
    ///
    /// Returns `None` if no host is configured and the request names none.
    #[must_use]
    pub fn resolve(parts: &Parts, config: &ServerConfig) -> Option<Self> {
        let host = config
            .external_host
            .clone()
            .or_else(|| {
                parts
                    .headers
                    .get(HOST)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            })
            .or_else(|| parts.uri.authority().map(ToString::to_string))
            .filter(|host| !host.is_empty())?;

        Some(Self {
            scheme: config.callback_scheme.clone(),
            host,
        })
    }

    /// Returns the absolute URL of a path on this origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not form a valid URL.
    pub fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}{}", self.scheme, self.host, path))
    }

    /// Returns the callback URL registered with the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not form a valid URL.
    pub fn callback_url(&self) -> Result<CallbackUrl, url::ParseError> {
        CallbackUrl::from_parts(&self.scheme, &self.host, CALLBACK_PATH)
    }
}

impl<S> FromRequestParts<S> for ExternalOrigin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = MissingHost;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        Self::resolve(parts, &app_state.config).ok_or(MissingHost)
    }
}

/// Rejection used when no host can be determined.
#[derive(Debug)]
pub struct MissingHost;

impl IntoResponse for MissingHost {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, "Missing Host header").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{REQUIRED, environment};
    use axum::http::Request;

    fn config(extra: &[(&str, &str)]) -> ServerConfig {
        let vars: Vec<_> = REQUIRED.iter().chain(extra).copied().collect();
        ServerConfig::load(environment(&vars)).expect("valid configuration")
    }

    fn parts(uri: &str, host: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(host) = host {
            builder = builder.header(HOST, host);
        }
        builder.body(()).expect("request").into_parts().0
    }

    #[test]
    fn host_header_is_used_by_default() {
        let origin = ExternalOrigin::resolve(&parts("/", Some("localhost:8000")), &config(&[]))
            .expect("origin");
        assert_eq!(
            origin.callback_url().expect("url").as_str(),
            "https://localhost:8000/oauth2callback"
        );
    }

    #[test]
    fn configured_host_wins_over_request() {
        let origin = ExternalOrigin::resolve(
            &parts("/", Some("10.0.0.7:8000")),
            &config(&[("EXTERNAL_HOST", "app.example.com"), ("CALLBACK_SCHEME", "http")]),
        )
        .expect("origin");
        assert_eq!(
            origin.url("/oauth2authorize").expect("url").as_str(),
            "http://app.example.com/oauth2authorize"
        );
    }

    #[test]
    fn uri_authority_is_the_last_resort() {
        let origin = ExternalOrigin::resolve(&parts("http://proxy.local/foo", None), &config(&[]))
            .expect("origin");
        assert_eq!(
            origin.url("/x").expect("url").as_str(),
            "https://proxy.local/x"
        );
    }

    #[test]
    fn no_host_yields_none() {
        assert!(ExternalOrigin::resolve(&parts("/foo", None), &config(&[])).is_none());
    }
}
