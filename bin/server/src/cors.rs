//! CORS handling for every route.
//!
//! `OPTIONS` requests are answered here, before routing, so a preflight
//! never reaches the authentication gate or the backend. Any other response
//! to a request that carried `Origin` is marked as readable from any origin.

use axum::{
    body::Body,
    extract::Request,
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
            ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
        },
    },
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Seconds a browser may cache a preflight answer.
const MAX_AGE_SECONDS: &str = "10";

/// Answers preflights and adds `Access-Control-Allow-Origin` to responses.
pub async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return preflight(request.headers());
    }

    let has_origin = request.headers().contains_key(ORIGIN);
    let mut response = next.run(request).await;
    if has_origin {
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    }
    response
}

/// Builds the answer to a CORS preflight.
fn preflight(headers: &HeaderMap) -> Response {
    let mut response = Response::new(Body::empty());
    let response_headers = response.headers_mut();
    response_headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response_headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECONDS));

    let Some(requested_method) = headers.get(ACCESS_CONTROL_REQUEST_METHOD) else {
        debug!("preflight without requested method");
        *response.status_mut() = StatusCode::BAD_REQUEST;
        return response;
    };

    response_headers.insert(ACCESS_CONTROL_ALLOW_METHODS, requested_method.clone());
    if let Some(requested_headers) = headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
        response_headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested_headers.clone());
    }
    response
}
