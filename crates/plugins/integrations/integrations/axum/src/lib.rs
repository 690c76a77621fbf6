//! # Daily Auth Axum Integration
//!
//! Serves a Daily Auth [`Router`](daily_auth_core::Router) from an Axum
//! application. Request conversion happens here; routing, validation and the
//! response envelope stay in the plugin handlers.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use daily_auth_axum::auth_routes;
//!
//! let mut router = daily_auth_core::Router::new("/api");
//! plugin.register_routes(&mut router);
//!
//! let app = axum::Router::new()
//!     .route("/health", axum::routing::get(|| async { "ok" }))
//!     .merge(auth_routes(std::sync::Arc::new(router)));
//! ```

mod routes;

pub use routes::{auth_routes, mount};

use axum::response::{IntoResponse, Response};
use daily_auth_core::error::AuthError;
use daily_auth_core::router::{Method as AuthMethod, Request as AuthRequest, Response as AuthResponse};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use std::collections::HashMap;

/// Converts an Axum request to a Daily Auth request.
///
/// Returns `None` for methods the router does not model.
pub fn to_auth_request(
    method: &http::Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Option<serde_json::Value>,
) -> Option<AuthRequest> {
    let auth_method = match *method {
        http::Method::GET => AuthMethod::GET,
        http::Method::POST => AuthMethod::POST,
        http::Method::PUT => AuthMethod::PUT,
        http::Method::PATCH => AuthMethod::PATCH,
        http::Method::DELETE => AuthMethod::DELETE,
        http::Method::OPTIONS => AuthMethod::OPTIONS,
        http::Method::HEAD => AuthMethod::HEAD,
        _ => return None,
    };

    let mut auth_headers = HashMap::new();
    for (key, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            auth_headers.insert(key.as_str().to_string(), v.to_string());
        }
    }

    // Parse query parameters
    let query: HashMap<String, String> = uri
        .query()
        .map(|q| {
            q.split('&')
                .filter_map(|pair| {
                    let mut parts = pair.splitn(2, '=');
                    Some((parts.next()?.to_string(), parts.next()?.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    // First hop of X-Forwarded-For is the client.
    let ip = auth_headers
        .get("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    Some(AuthRequest {
        method: auth_method,
        path: uri.path().to_string(),
        query,
        headers: auth_headers,
        body,
        ip,
    })
}

/// Converts a Daily Auth response to an Axum response.
pub fn to_axum_response(auth_response: AuthResponse) -> Response {
    let status = StatusCode::from_u16(auth_response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = if let Some(body) = auth_response.body {
        axum::Json(body).into_response()
    } else {
        status.into_response()
    };

    *response.status_mut() = status;

    // Add headers
    for (key, value) in auth_response.headers {
        if let (Ok(name), Ok(val)) = (HeaderName::try_from(key), HeaderValue::try_from(value)) {
            response.headers_mut().insert(name, val);
        }
    }

    response
}

/// Wrapper for AuthError that implements IntoResponse.
#[derive(Debug)]
pub struct AuthErrorResponse(pub AuthError);

impl IntoResponse for AuthErrorResponse {
    fn into_response(self) -> Response {
        let err = self.0;
        if !err.is_user_error() {
            tracing::error!(error = %err, "request failed");
        }
        to_axum_response(AuthResponse::error(err.status_code(), err.code(), err.to_string()))
    }
}

impl From<AuthError> for AuthErrorResponse {
    fn from(err: AuthError) -> Self {
        AuthErrorResponse(err)
    }
}
