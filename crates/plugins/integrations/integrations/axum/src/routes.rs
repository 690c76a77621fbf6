//! Route mounting for Daily Auth routes.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use daily_auth_core::router::{Response as AuthResponse, Router as AuthRouter};
use http::{HeaderMap, Method, Uri};
use std::sync::Arc;

use crate::{to_auth_request, to_axum_response};

/// Creates an Axum router that dispatches every request to `router`.
///
/// The returned router uses a fallback, so merge it after the application's
/// own routes. Paths are matched against the full request path, including the
/// auth router's base path.
///
/// # Example
///
/// ```rust,ignore
/// let app = axum::Router::new()
///     .route("/health", get(health))
///     .merge(auth_routes(Arc::new(router)));
/// ```
pub fn auth_routes<S>(router: Arc<AuthRouter>) -> axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    axum::Router::new()
        .fallback(dispatch)
        .with_state(AuthState { router })
}

/// Takes ownership of a fully registered router and mounts it.
pub fn mount(router: AuthRouter) -> axum::Router {
    auth_routes(Arc::new(router))
}

/// Shared state for auth routes.
#[derive(Clone)]
struct AuthState {
    router: Arc<AuthRouter>,
}

async fn dispatch(
    State(state): State<AuthState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(path = %uri.path(), error = %err, "rejecting non-JSON body");
                return to_axum_response(AuthResponse::error(
                    400,
                    "INVALID_REQUEST",
                    "Request body must be JSON",
                ));
            }
        }
    };

    let Some(request) = to_auth_request(&method, &uri, &headers, body) else {
        return http::StatusCode::METHOD_NOT_ALLOWED.into_response();
    };
    to_axum_response(state.router.handle(request).await)
}
