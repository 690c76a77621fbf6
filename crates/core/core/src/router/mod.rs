//! Framework-agnostic router for plugin routes.
//!
//! Plugins register [`Route`]s on a [`Router`]; framework integrations turn
//! incoming HTTP requests into [`Request`]s and call [`Router::handle`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    OPTIONS,
    HEAD,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
            Method::OPTIONS => "OPTIONS",
            Method::HEAD => "HEAD",
        };
        f.write_str(name)
    }
}

/// A generic HTTP request representation.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Query parameters.
    pub query: HashMap<String, String>,
    /// Request headers (lowercase keys).
    pub headers: HashMap<String, String>,
    /// Request body (JSON).
    pub body: Option<Value>,
    /// Client IP address.
    pub ip: Option<String>,
}

impl Request {
    /// Creates a new request.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: None,
            ip: None,
        }
    }

    /// Creates a POST request carrying a JSON body.
    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    /// Gets a query parameter.
    pub fn query_param(&self, name: &str) -> Option<&String> {
        self.query.get(name)
    }

    /// Gets a header value.
    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_lowercase())
    }

    /// Deserializes the body to a type.
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        self.body
            .as_ref()
            .and_then(|b| serde_json::from_value(b.clone()).ok())
    }
}

/// A generic HTTP response representation.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body (JSON).
    pub body: Option<Value>,
}

impl Response {
    /// Creates a new response with status code.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Creates a 200 OK response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Creates a 400 Bad Request response.
    pub fn bad_request() -> Self {
        Self::new(400)
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::new(404)
    }

    /// Creates a 405 Method Not Allowed response.
    pub fn method_not_allowed() -> Self {
        Self::new(405)
    }

    /// Creates a 429 Too Many Requests response.
    pub fn too_many_requests() -> Self {
        Self::new(429)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        Self::new(500)
    }

    /// Creates a 503 Service Unavailable response.
    pub fn service_unavailable() -> Self {
        Self::new(503)
    }

    /// Sets the response body as JSON.
    pub fn json<T: Serialize>(mut self, body: T) -> Self {
        self.body = serde_json::to_value(body).ok();
        self.headers
            .insert("content-type".to_string(), "application/json".to_string());
        self
    }

    /// Sets a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    /// Builds the standard error envelope: `{ success: false, error: { code, message } }`.
    pub fn error(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self::new(status).json(serde_json::json!({
            "success": false,
            "error": {
                "code": code,
                "message": message.into(),
            }
        }))
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for request handlers.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handles a request and returns a response.
    async fn handle(&self, req: Request) -> Response;
}

/// A route definition.
pub struct Route {
    /// The HTTP method.
    pub method: Method,
    /// The path, relative to the router's base path.
    pub path: String,
    /// The handler.
    pub handler: Arc<dyn RequestHandler>,
    /// Route metadata for documentation.
    pub metadata: RouteMetadata,
}

/// Metadata for route documentation.
#[derive(Debug, Clone, Default)]
pub struct RouteMetadata {
    /// Short summary.
    pub summary: Option<String>,
    /// Detailed description.
    pub description: Option<String>,
    /// Tags for grouping.
    pub tags: Vec<String>,
}

impl Route {
    /// Creates a new route.
    pub fn new(method: Method, path: impl Into<String>, handler: impl RequestHandler + 'static) -> Self {
        Self {
            method,
            path: path.into(),
            handler: Arc::new(handler),
            metadata: RouteMetadata::default(),
        }
    }

    /// Sets the summary.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.metadata.summary = Some(summary.into());
        self
    }

    /// Sets the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.metadata.description = Some(desc.into());
        self
    }

    /// Adds a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// A router that collects routes from plugins and dispatches requests.
#[derive(Debug)]
pub struct Router {
    /// Base path prefix.
    pub base_path: String,
    /// Collected routes.
    routes: Vec<Route>,
}

impl Router {
    /// Creates a new router with a base path.
    pub fn new(base_path: impl Into<String>) -> Self {
        let base_path = base_path.into().trim_end_matches('/').to_string();
        Self {
            base_path,
            routes: Vec::new(),
        }
    }

    /// Adds a route.
    pub fn route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Adds a POST route.
    pub fn post(&mut self, path: &str, handler: impl RequestHandler + 'static) {
        self.route(Route::new(Method::POST, path, handler));
    }

    /// Adds a GET route.
    pub fn get(&mut self, path: &str, handler: impl RequestHandler + 'static) {
        self.route(Route::new(Method::GET, path, handler));
    }

    /// Returns all routes.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Returns the full path of a route (base path + route path).
    pub fn full_path(&self, route: &Route) -> String {
        format!("{}{}", self.base_path, route.path)
    }

    /// Returns the number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if there are no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Merges another router into this one.
    pub fn merge(&mut self, other: Router) {
        self.routes.extend(other.routes);
    }

    /// Dispatches a request to the matching route.
    ///
    /// Unknown paths yield 404; a known path with a different method yields 405.
    pub async fn handle(&self, req: Request) -> Response {
        let path = req.path.trim_end_matches('/');
        let Some(relative) = path.strip_prefix(self.base_path.as_str()).map(str::to_string) else {
            return Response::error(404, "NOT_FOUND", "Route not found");
        };

        let mut path_matched = false;
        for route in &self.routes {
            if route.path != relative {
                continue;
            }
            if route.method == req.method {
                tracing::debug!(method = %req.method, path = %req.path, "dispatching request");
                return route.handler.handle(req).await;
            }
            path_matched = true;
        }

        if path_matched {
            Response::error(405, "METHOD_NOT_ALLOWED", "Method not allowed")
        } else {
            Response::error(404, "NOT_FOUND", "Route not found")
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new("/api")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl RequestHandler for Echo {
        async fn handle(&self, req: Request) -> Response {
            Response::ok().json(json!({ "path": req.path, "body": req.body }))
        }
    }

    fn router() -> Router {
        let mut router = Router::new("/api/");
        router.post("/auth/echo", Echo);
        router
    }

    #[tokio::test]
    async fn test_dispatch_to_matching_route() {
        let response = router()
            .handle(Request::post_json("/api/auth/echo", json!({ "a": 1 })))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body.unwrap()["body"]["a"], 1);
    }

    #[tokio::test]
    async fn test_trailing_slash_is_ignored() {
        let response = router()
            .handle(Request::post_json("/api/auth/echo/", json!({})))
            .await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let response = router()
            .handle(Request::post_json("/api/auth/missing", json!({})))
            .await;
        assert_eq!(response.status, 404);

        let response = router()
            .handle(Request::post_json("/elsewhere/auth/echo", json!({})))
            .await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let response = router()
            .handle(Request::new(Method::GET, "/api/auth/echo"))
            .await;
        assert_eq!(response.status, 405);
        assert_eq!(response.body.unwrap()["error"]["code"], "METHOD_NOT_ALLOWED");
    }

    #[test]
    fn test_error_envelope() {
        let response = Response::error(429, "RATE_LIMITED", "Too many OTP requests");
        let body = response.body.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
        assert_eq!(response.headers["content-type"], "application/json");
    }

    #[test]
    fn test_request_json_and_headers() {
        #[derive(Deserialize)]
        struct Body {
            #[serde(rename = "phoneNumber")]
            phone_number: String,
        }

        let req = Request::post_json("/x", json!({ "phoneNumber": "+14155552222" }))
            .with_header("X-Forwarded-For", "10.0.0.1");
        let body: Body = req.json().unwrap();
        assert_eq!(body.phone_number, "+14155552222");
        assert_eq!(req.header("x-forwarded-for").unwrap(), "10.0.0.1");
    }

    #[test]
    fn test_merge_and_full_path() {
        let mut base = router();
        let mut other = Router::new("/api");
        other.post("/auth/other", Echo);
        base.merge(other);
        assert_eq!(base.len(), 2);
        let paths: Vec<String> = base.routes().map(|r| base.full_path(r)).collect();
        assert!(paths.contains(&"/api/auth/other".to_string()));
    }
}
