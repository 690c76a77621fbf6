//! Integration tests for Daily Auth Core
//!
//! This test suite covers:
//! - Plugin route registration
//! - Router dispatch across merged plugin routers
//! - Error handling
//! - Manual clock sharing

use async_trait::async_trait;
use chrono::Duration;
use daily_auth_core::*;
use serde_json::json;

struct Greeting(&'static str);

#[async_trait]
impl RequestHandler for Greeting {
    async fn handle(&self, req: Request) -> Response {
        let name = req
            .body
            .as_ref()
            .and_then(|b| b.get("name"))
            .and_then(|n| n.as_str())
            .map(str::to_string);
        match name {
            Some(name) => Response::ok().json(json!({ "success": true, "message": format!("{} {name}", self.0) })),
            None => {
                let err = AuthError::missing_field("name");
                Response::error(err.status_code(), err.code(), err.to_string())
            }
        }
    }
}

struct GreetingPlugin;

impl AuthPlugin for GreetingPlugin {
    fn id(&self) -> &'static str {
        "greeting"
    }

    fn name(&self) -> &'static str {
        "Greeting"
    }

    fn register_routes(&self, router: &mut Router) {
        router.route(
            Route::new(Method::POST, "/auth/hello", Greeting("Hello"))
                .summary("Say hello")
                .tag("greeting"),
        );
        router.route(Route::new(Method::DELETE, "/auth/hello", Greeting("Bye")));
    }
}

struct SilentPlugin;

impl AuthPlugin for SilentPlugin {
    fn id(&self) -> &'static str {
        "silent"
    }

    fn name(&self) -> &'static str {
        "Silent"
    }
}

mod plugin_tests {
    use super::*;

    #[test]
    fn test_plugin_registration() {
        let mut router = Router::default();
        GreetingPlugin.register_routes(&mut router);
        SilentPlugin.register_routes(&mut router);

        assert_eq!(router.len(), 2);
        let first = router.routes().next().unwrap();
        assert_eq!(router.full_path(first), "/api/auth/hello");
        assert_eq!(first.metadata.summary.as_deref(), Some("Say hello"));
        assert_eq!(first.metadata.tags, vec!["greeting".to_string()]);
    }

    #[test]
    fn test_default_register_routes_is_noop() {
        let mut router = Router::new("/api");
        SilentPlugin.register_routes(&mut router);
        assert!(router.is_empty());
        assert_eq!(SilentPlugin.id(), "silent");
    }
}

mod router_tests {
    use super::*;

    fn router() -> Router {
        let mut router = Router::new("/api");
        let mut plugin_router = Router::new("/api");
        GreetingPlugin.register_routes(&mut plugin_router);
        router.merge(plugin_router);
        router
    }

    #[tokio::test]
    async fn test_dispatch_by_method() {
        let router = router();
        let response = router
            .handle(Request::post_json("/api/auth/hello", json!({ "name": "Asha" })))
            .await;
        assert!(response.is_success());
        assert_eq!(response.body.unwrap()["message"], "Hello Asha");

        let response = router
            .handle(Request::new(Method::DELETE, "/api/auth/hello").with_body(json!({ "name": "Asha" })))
            .await;
        assert_eq!(response.body.unwrap()["message"], "Bye Asha");
    }

    #[tokio::test]
    async fn test_handler_error_envelope() {
        let response = router()
            .handle(Request::post_json("/api/auth/hello", json!({})))
            .await;
        assert_eq!(response.status, 400);
        let body = response.body.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "MISSING_FIELD");
        assert_eq!(body["error"]["message"], "Missing required field: name");
    }

    #[tokio::test]
    async fn test_unmatched_requests() {
        let router = router();
        let response = router.handle(Request::new(Method::GET, "/api/auth/hello")).await;
        assert_eq!(response.status, 405);

        let response = router.handle(Request::new(Method::POST, "/api/auth/bye")).await;
        assert_eq!(response.status, 404);
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn test_error_result_propagation() {
        fn load(key: &str) -> AuthResult<u32> {
            Err(AuthError::missing_config(key))
        }
        fn start() -> AuthResult<u32> {
            let value = load("otp.length")?;
            Ok(value + 1)
        }

        let err = start().unwrap_err();
        assert_eq!(err.to_string(), "Missing configuration: otp.length");
        assert_eq!(err.status_code(), 503);
        assert!(!err.is_user_error());
    }
}

mod clock_tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_manual_clock_behind_trait_object() {
        let manual = ManualClock::starting_now();
        let shared: Arc<dyn Clock> = Arc::new(manual.clone());
        let start = shared.now();

        manual.advance(Duration::hours(1));
        assert_eq!(shared.now() - start, Duration::hours(1));
    }
}
