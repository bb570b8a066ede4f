//! Forwarding of authenticated requests to the internal backend.
//!
//! One inbound request yields exactly one backend call. The caller's
//! verified email replaces any client-supplied `X-Remote-User` header, and
//! the backend's status, body and content type are relayed unchanged.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri,
        header::{
            ACCEPT_ENCODING, ALLOW, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST,
            PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE, TRAILER, TRANSFER_ENCODING, UPGRADE,
        },
    },
    response::{IntoResponse, Response},
};
use oauth_sidecar_platform_access::{ConfigurationError, http_client};
use serde::de::IgnoredAny;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::app::AppState;
use crate::auth::RequireSession;

/// Header carrying the verified identity to the backend.
pub const X_REMOTE_USER: HeaderName = HeaderName::from_static("x-remote-user");

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Methods relayed to the backend.
const SUPPORTED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::PUT, Method::DELETE];

/// Value of the `Allow` header on 405 responses.
const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE";

/// Proxies an authenticated request to the backend.
///
/// The body is taken unbuffered so that only POST and PUT bodies are read,
/// without a size limit.
pub async fn forward(
    State(state): State<AppState>,
    RequireSession(session): RequireSession,
    request: Request,
) -> Result<Response, ForwardError> {
    let (parts, body) = request.into_parts();
    state
        .forwarder
        .forward(parts.method, &parts.uri, &parts.headers, body, session.email())
        .await
}

/// HTTP client bound to the backend base URL.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    backend: Arc<Url>,
}

impl Forwarder {
    /// Creates a forwarder for a backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(backend: Url, timeout: Duration) -> Result<Self, ConfigurationError> {
        Ok(Self {
            client: http_client(timeout)?,
            backend: Arc::new(backend),
        })
    }

    /// Returns the backend URL for a request path and raw query.
    ///
    /// The base and the path are joined with exactly one `/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the joined URL is invalid.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Result<Url, ForwardError> {
        let base = self.backend.as_str().trim_end_matches('/');
        let mut target = format!("{base}/{}", path.trim_start_matches('/'));
        if let Some(query) = query {
            target.push('?');
            target.push_str(query);
        }

        Url::parse(&target).map_err(|e| ForwardError::InvalidTarget {
            details: e.to_string(),
        })
    }

    /// Performs the backend call and relays its response.
    ///
    /// # Errors
    ///
    /// Returns an error if the method is not supported, the request body
    /// cannot be read, the identity cannot be sent as a header, or the
    /// backend cannot be reached in time.
    #[instrument(skip_all, fields(method = %method, path = %uri.path()))]
    pub async fn forward(
        &self,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: Body,
        email: &str,
    ) -> Result<Response, ForwardError> {
        if !SUPPORTED_METHODS.contains(&method) {
            return Err(ForwardError::UnsupportedMethod { method });
        }

        let target = self.target_url(uri.path(), uri.query())?;
        let mut outbound = forwarded_headers(headers);

        // GET and DELETE bodies are never read
        let body = if method == Method::POST || method == Method::PUT {
            let bytes = axum::body::to_bytes(body, usize::MAX)
                .await
                .map_err(|e| ForwardError::UnreadableBody {
                    details: e.to_string(),
                })?;
            Some(json_body(headers, bytes, &mut outbound))
        } else {
            None
        };

        // The identity header is always written last
        let identity = HeaderValue::from_str(email).map_err(|_| ForwardError::InvalidIdentity)?;
        outbound.insert(X_REMOTE_USER, identity);

        let mut request = self
            .client
            .request(method, target.clone())
            .headers(outbound);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|e| backend_error(&target, e))?;
        debug!(status = %response.status(), "backend responded");

        relay(response)
            .await
            .map_err(|e| backend_error(&target, e))
    }
}

/// Copies inbound headers, minus hop-by-hop and transport-owned ones.
fn forwarded_headers(inbound: &HeaderMap) -> HeaderMap {
    // Headers named by `Connection` are hop-by-hop as well
    let listed: Vec<HeaderName> = inbound
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    let mut outbound = HeaderMap::with_capacity(inbound.len() + 1);
    for (name, value) in inbound {
        if is_hop_by_hop(name) || is_transport_owned(name) || listed.contains(name) {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }
    outbound
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    [
        &CONNECTION,
        &KEEP_ALIVE,
        &PROXY_AUTHENTICATE,
        &PROXY_AUTHORIZATION,
        &TE,
        &TRAILER,
        &TRANSFER_ENCODING,
        &UPGRADE,
    ]
    .contains(&name)
}

/// Headers the outbound client sets itself, plus the identity header.
///
/// `Accept-Encoding` is dropped because only the content type is relayed,
/// so an encoded backend body would reach the client undecodable.
fn is_transport_owned(name: &HeaderName) -> bool {
    [&HOST, &CONTENT_LENGTH, &ACCEPT_ENCODING, &X_REMOTE_USER].contains(&name)
}

/// Returns the body to send for POST and PUT.
///
/// A JSON body is relayed byte-for-byte; anything else becomes `{}`.
fn json_body(inbound: &HeaderMap, body: Bytes, outbound: &mut HeaderMap) -> Bytes {
    if is_json_content_type(inbound) && serde_json::from_slice::<IgnoredAny>(&body).is_ok() {
        return body;
    }

    debug!("replacing non-JSON request body");
    outbound.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Bytes::from_static(b"{}")
}

fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|essence| essence.trim().to_ascii_lowercase())
        .is_some_and(|essence| essence == "application/json" || essence.ends_with("+json"))
}

/// Builds the client response from the backend's status, body and content type.
async fn relay(response: reqwest::Response) -> Result<Response, reqwest::Error> {
    let status = response.status();
    let content_type = response.headers().get(CONTENT_TYPE).cloned();
    let body = response.bytes().await?;

    let mut relayed = Response::new(Body::from(body));
    *relayed.status_mut() = status;
    if let Some(content_type) = content_type {
        relayed.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    Ok(relayed)
}

fn backend_error(target: &Url, err: reqwest::Error) -> ForwardError {
    if err.is_timeout() {
        ForwardError::Timeout {
            target: target.to_string(),
        }
    } else {
        ForwardError::Unreachable {
            target: target.to_string(),
            details: err.to_string(),
        }
    }
}

/// Errors from forwarding a request.
#[derive(Debug)]
pub enum ForwardError {
    /// The method is not relayed.
    UnsupportedMethod { method: Method },
    /// The inbound request body could not be read.
    UnreadableBody { details: String },
    /// The backend URL for the request is invalid.
    InvalidTarget { details: String },
    /// The session email is not a valid header value.
    InvalidIdentity,
    /// The backend did not answer in time.
    Timeout { target: String },
    /// The backend could not be reached.
    Unreachable { target: String, details: String },
}

impl fmt::Display for ForwardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedMethod { method } => write!(f, "method {method} is not supported"),
            Self::UnreadableBody { details } => {
                write!(f, "failed to read request body: {details}")
            }
            Self::InvalidTarget { details } => write!(f, "invalid backend URL: {details}"),
            Self::InvalidIdentity => write!(f, "session email is not a valid header value"),
            Self::Timeout { target } => write!(f, "backend request to '{target}' timed out"),
            Self::Unreachable { target, details } => {
                write!(f, "backend request to '{target}' failed: {details}")
            }
        }
    }
}

impl std::error::Error for ForwardError {}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        match &self {
            Self::UnsupportedMethod { .. } => {
                debug!("{}", self);
                (
                    StatusCode::METHOD_NOT_ALLOWED,
                    [(ALLOW, ALLOWED_METHODS)],
                    "Method not allowed",
                )
                    .into_response()
            }
            Self::UnreadableBody { .. } => {
                debug!("{}", self);
                (StatusCode::BAD_REQUEST, "Bad request").into_response()
            }
            Self::InvalidTarget { .. } | Self::InvalidIdentity => {
                error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            Self::Timeout { .. } => {
                warn!("{}", self);
                (StatusCode::GATEWAY_TIMEOUT, "Gateway timeout").into_response()
            }
            Self::Unreachable { .. } => {
                warn!("{}", self);
                (StatusCode::BAD_GATEWAY, "Bad gateway").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarder(backend: &str) -> Forwarder {
        Forwarder::new(backend.parse().expect("url"), Duration::from_secs(1)).expect("client")
    }

    #[test]
    fn target_url_joins_with_single_slash() {
        let bare = forwarder("http://backend:9000");
        assert_eq!(
            bare.target_url("/foo", Some("x=1")).expect("url").as_str(),
            "http://backend:9000/foo?x=1"
        );
        assert_eq!(
            bare.target_url("/", None).expect("url").as_str(),
            "http://backend:9000/"
        );

        let nested = forwarder("http://backend:9000/api/");
        assert_eq!(
            nested.target_url("/users/7", None).expect("url").as_str(),
            "http://backend:9000/api/users/7"
        );
    }

    #[test]
    fn target_url_keeps_raw_query() {
        let target = forwarder("http://backend")
            .target_url("/search", Some("q=a%20b&page=2&flag"))
            .expect("url");
        assert_eq!(target.query(), Some("q=a%20b&page=2&flag"));
    }

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let mut inbound = HeaderMap::new();
        inbound.insert(HOST, HeaderValue::from_static("sidecar.example.com"));
        inbound.insert(CONNECTION, HeaderValue::from_static("keep-alive, x-trace-hop"));
        inbound.insert(KEEP_ALIVE, HeaderValue::from_static("timeout=5"));
        inbound.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        inbound.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        inbound.insert("x-trace-hop", HeaderValue::from_static("1"));
        inbound.insert("x-request-id", HeaderValue::from_static("abc"));
        inbound.append("accept", HeaderValue::from_static("text/html"));
        inbound.append("accept", HeaderValue::from_static("application/json"));
        inbound.insert(X_REMOTE_USER, HeaderValue::from_static("mallory@example.com"));

        let outbound = forwarded_headers(&inbound);

        assert_eq!(outbound.len(), 3);
        assert_eq!(outbound["x-request-id"], "abc");
        assert_eq!(outbound.get_all("accept").iter().count(), 2);
        assert!(!outbound.contains_key(X_REMOTE_USER));
    }

    #[test]
    fn json_body_is_relayed_unchanged() {
        let mut inbound = HeaderMap::new();
        inbound.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        let mut outbound = forwarded_headers(&inbound);

        let body = Bytes::from_static(b"{ \"a\" : [1, 2] }");
        assert_eq!(json_body(&inbound, body.clone(), &mut outbound), body);
        assert_eq!(outbound[CONTENT_TYPE], "application/json; charset=utf-8");
    }

    #[test]
    fn non_json_body_becomes_empty_object() {
        let mut inbound = HeaderMap::new();
        inbound.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let mut outbound = forwarded_headers(&inbound);

        let body = json_body(&inbound, Bytes::from_static(b"a=1&b=2"), &mut outbound);
        assert_eq!(body, Bytes::from_static(b"{}"));
        assert_eq!(outbound[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn unparseable_json_becomes_empty_object() {
        let mut inbound = HeaderMap::new();
        inbound.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut outbound = forwarded_headers(&inbound);

        let body = json_body(&inbound, Bytes::from_static(b"{\"a\":"), &mut outbound);
        assert_eq!(body, Bytes::from_static(b"{}"));
    }

    #[test]
    fn vendor_json_content_type_is_json() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.api+json"),
        );
        assert!(is_json_content_type(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(!is_json_content_type(&headers));
        assert!(!is_json_content_type(&HeaderMap::new()));
    }

    #[test]
    fn unsupported_method_lists_allowed_methods() {
        let response = ForwardError::UnsupportedMethod {
            method: Method::PATCH,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, POST, PUT, DELETE");
    }

    #[test]
    fn backend_failures_map_to_gateway_statuses() {
        let timeout = ForwardError::Timeout {
            target: "http://backend/".to_string(),
        };
        assert_eq!(timeout.into_response().status(), StatusCode::GATEWAY_TIMEOUT);

        let unreachable = ForwardError::Unreachable {
            target: "http://backend/".to_string(),
            details: "connection refused".to_string(),
        };
        assert_eq!(unreachable.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
