//! Server wiring tests
//!
//! Tests cover:
//! - Building the server from configuration
//! - Serving the health check and OTP routes
//! - Secret resolution from the environment

use axum::body::Body;
use daily_auth_server::*;
use http::{Request, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

fn env(pairs: &[(&str, &str)]) -> EnvLookup {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Arc::new(move |key| vars.get(key).cloned())
}

async fn call(app: &axum::Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(path)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

mod wiring_tests {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let server = DailyAuthServer::from_config_with_env(AppConfig::default(), env(&[]))
            .await
            .unwrap();
        let (status, body) = call(&server.app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_demo_login_end_to_end() {
        let config = parse_config(
            r#"
            [phone]
            expose_demo_codes = true
            "#,
        )
        .unwrap();
        let server = DailyAuthServer::from_config_with_env(config, env(&[])).await.unwrap();
        let app = server.app();

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/request-otp",
            Some(json!({ "phoneNumber": "98765 43210" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["demoCode"], "123456");

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/verify-otp",
            Some(json!({ "phoneNumber": "+919876543210", "otpCode": "123456" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "business_admin");
    }

    #[tokio::test]
    async fn test_console_delivery_and_verification() {
        let config = parse_config(
            r#"
            [otp.settings]
            length = 4
            "#,
        )
        .unwrap();
        let server = DailyAuthServer::from_config_with_env(config, env(&[])).await.unwrap();
        assert_eq!(server.settings().current().await.length, 4);
        let app = server.app();

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/request-otp",
            Some(json!({ "phoneNumber": "+919812345678" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["method"], "whatsapp");

        let (status, body) = call(
            &app,
            "POST",
            "/api/auth/verify-otp",
            Some(json!({ "phoneNumber": "+919812345678", "otpCode": "123456" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_CODE_FORMAT");
    }

    #[tokio::test]
    async fn test_custom_base_path_and_demo_identities() {
        let config = parse_config(
            r#"
            [server]
            base_path = "/v2"

            [phone]
            default_country = "US"
            demo_identities = []
            "#,
        )
        .unwrap();
        let server = DailyAuthServer::from_config_with_env(config, env(&[])).await.unwrap();
        assert!(server.engine().demo_policy().is_empty());

        let (status, body) = call(
            &server.app(),
            "POST",
            "/v2/auth/request-otp",
            Some(json!({ "phoneNumber": "(415) 555-2222" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["phoneNumber"], "+1 415 555 2222");
        assert_eq!(body["data"]["method"], "whatsapp");
    }

    #[tokio::test]
    async fn test_clear_rate_limit_requires_opt_in() {
        let body = json!({ "phoneNumber": "+919812345678" });

        let server = DailyAuthServer::from_config_with_env(AppConfig::default(), env(&[]))
            .await
            .unwrap();
        let (status, response) =
            call(&server.app(), "POST", "/api/auth/clear-rate-limit", Some(body.clone())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(response["error"]["code"], "NOT_FOUND");

        let config = parse_config("[phone]\nexpose_clear_rate_limit = true").unwrap();
        let server = DailyAuthServer::from_config_with_env(config, env(&[])).await.unwrap();
        let (status, response) =
            call(&server.app(), "POST", "/api/auth/clear-rate-limit", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["phoneNumber"], "+919812345678");
    }

    #[tokio::test]
    async fn test_messaging_diagnostic_requires_opt_in() {
        let server = DailyAuthServer::from_config_with_env(AppConfig::default(), env(&[]))
            .await
            .unwrap();
        let (status, _) = call(&server.app(), "POST", "/api/auth/test-messaging", Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let config = parse_config("[phone]\nexpose_test_messaging = true").unwrap();
        let server = DailyAuthServer::from_config_with_env(config, env(&[])).await.unwrap();
        let (status, body) = call(&server.app(), "POST", "/api/auth/test-messaging", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["provider"], "console");
    }

    #[tokio::test]
    async fn test_env_settings_source() {
        let config = parse_config("[otp]\nsource = \"env\"").unwrap();
        let server = DailyAuthServer::from_config_with_env(
            config,
            env(&[("OTP_LENGTH", "8"), ("OTP_MAX_ATTEMPTS", "5")]),
        )
        .await
        .unwrap();
        let settings = server.settings().current().await;
        assert_eq!(settings.length, 8);
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.rate_limit_per_hour, 3);
    }
}

mod secret_tests {
    use super::*;

    #[tokio::test]
    async fn test_vault_requires_token() {
        let config = parse_config("[otp]\nsource = \"vault\"").unwrap();
        let err = DailyAuthServer::from_config_with_env(config, env(&[]))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("VAULT_TOKEN"));
    }

    #[tokio::test]
    async fn test_twilio_requires_section_and_token() {
        let config = parse_config("[delivery]\nprovider = \"twilio\"").unwrap();
        let err = DailyAuthServer::from_config_with_env(config, env(&[]))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("delivery.twilio"));

        let config = parse_config(
            r#"
            [delivery]
            provider = "twilio"

            [delivery.twilio]
            account_sid = "AC123"
            "#,
        )
        .unwrap();
        let err = DailyAuthServer::from_config_with_env(config.clone(), env(&[]))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("TWILIO_AUTH_TOKEN"));

        assert!(
            DailyAuthServer::from_config_with_env(config, env(&[("TWILIO_AUTH_TOKEN", "tok")]))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_invalid_demo_phone_is_rejected() {
        let config = parse_config(
            r#"
            [[phone.demo_identities]]
            phone = "not a phone"
            code = "123456"
            role = "employee"
            "#,
        )
        .unwrap();
        let err = DailyAuthServer::from_config_with_env(config, env(&[]))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ServerError::DemoIdentity(_)));
    }

    #[tokio::test]
    async fn test_non_numeric_demo_code_is_rejected() {
        let config = parse_config(
            r#"
            [[phone.demo_identities]]
            phone = "9876543212"
            code = "12ab"
            role = "employee"
            "#,
        )
        .unwrap();
        let err = DailyAuthServer::from_config_with_env(config, env(&[]))
            .await
            .err()
            .unwrap();
        assert!(matches!(&err, ServerError::DemoCode { phone } if phone == "+919876543212"));
        assert!(err.to_string().contains("+919876543212"));
    }
}
