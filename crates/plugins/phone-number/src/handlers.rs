//! Request handlers for the Phone Number plugin.

use async_trait::async_trait;
use daily_auth_core::router::{Request, RequestHandler, Response};
use daily_auth_core::AuthError;
use daily_auth_otp_utils::{OtpPurpose, VerificationResult};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::config::PhoneNumberConfig;
use crate::engine::{OtpError, PhoneOtpEngine};
use crate::messaging::{Channel, DeliveryPreference, OtpDispatcher};

fn invalid_body() -> Response {
    Response::error(400, "INVALID_REQUEST", "Invalid request body")
}

fn auth_error(err: &AuthError) -> Response {
    Response::error(err.status_code(), err.code(), err.to_string())
}

fn otp_error(err: &OtpError) -> Response {
    match err {
        OtpError::RateLimited {
            remaining_attempts,
            retry_after_seconds,
        } => Response::too_many_requests()
            .header("retry-after", retry_after_seconds.to_string())
            .json(json!({
                "success": false,
                "error": {
                    "code": err.code(),
                    "message": err.to_string(),
                },
                "remainingAttempts": remaining_attempts,
                "retryAfterSeconds": retry_after_seconds,
            })),
        OtpError::Store(inner) => {
            tracing::error!(error = %inner, "OTP store failure");
            Response::error(err.status_code(), err.code(), "Unable to process OTP request")
        }
        _ => Response::error(err.status_code(), err.code(), err.to_string()),
    }
}

/// Request body for issuing an OTP.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOtpBody {
    pub phone_number: Option<String>,
    #[serde(default)]
    pub purpose: OtpPurpose,
    pub preferred_method: Option<DeliveryPreference>,
}

/// Handler for POST /auth/request-otp
pub struct RequestOtpHandler {
    pub(crate) engine: Arc<PhoneOtpEngine>,
    pub(crate) dispatcher: Arc<OtpDispatcher>,
    pub(crate) config: PhoneNumberConfig,
}

#[async_trait]
impl RequestHandler for RequestOtpHandler {
    async fn handle(&self, req: Request) -> Response {
        let Some(body) = req.json::<RequestOtpBody>() else {
            return invalid_body();
        };
        let Some(phone_number) = body.phone_number else {
            return auth_error(&AuthError::missing_field("phoneNumber"));
        };

        let issuance = match self.engine.request_otp(&phone_number, body.purpose).await {
            Ok(issuance) => issuance,
            Err(err) => return otp_error(&err),
        };

        if let Some(demo) = &issuance.demo {
            let mut data = json!({
                "phoneNumber": issuance.phone.display(),
                "method": "demo",
                "expiresIn": issuance.expires_in,
                "demo": true,
            });
            if self.config.expose_demo_codes {
                data["demoCode"] = json!(demo.code);
            }
            return Response::ok().json(json!({
                "success": true,
                "message": "Demo OTP issued",
                "data": data,
            }));
        }

        let preference = body
            .preferred_method
            .unwrap_or(self.config.default_preference);
        match self.dispatcher.deliver(&issuance, preference).await {
            Ok(receipt) => Response::ok().json(json!({
                "success": true,
                "message": format!("OTP sent via {}", receipt.channel),
                "data": {
                    "phoneNumber": issuance.phone.display(),
                    "method": receipt.channel,
                    "expiresIn": issuance.expires_in,
                },
            })),
            Err(err) => {
                tracing::warn!(phone = %issuance.phone.masked(), error = %err, "OTP delivery failed");
                Response::error(500, err.code(), format!("Failed to send OTP: {err}"))
            }
        }
    }
}

/// Request body for verifying an OTP.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpBody {
    pub phone_number: Option<String>,
    pub otp_code: Option<String>,
}

/// Handler for POST /auth/verify-otp
pub struct VerifyOtpHandler {
    pub(crate) engine: Arc<PhoneOtpEngine>,
}

#[async_trait]
impl RequestHandler for VerifyOtpHandler {
    async fn handle(&self, req: Request) -> Response {
        let Some(body) = req.json::<VerifyOtpBody>() else {
            return invalid_body();
        };
        let Some(phone_number) = body.phone_number else {
            return auth_error(&AuthError::missing_field("phoneNumber"));
        };
        let Some(otp_code) = body.otp_code else {
            return auth_error(&AuthError::missing_field("otpCode"));
        };

        let verification = match self.engine.verify_otp(&phone_number, &otp_code).await {
            Ok(verification) => verification,
            Err(err) => return otp_error(&err),
        };

        let phone = &verification.phone;
        match verification.result {
            VerificationResult::Valid => {
                let demo = verification.demo.as_ref();
                Response::ok().json(json!({
                    "success": true,
                    "message": "Phone number verified successfully",
                    "user": {
                        "phone": phone.as_str(),
                        "formattedPhone": phone.display(),
                        "country": phone.country(),
                        "requiresRoleSelection": demo.is_none_or(|d| d.requires_role_selection),
                        "role": demo.map(|d| d.role),
                        "restaurantName": demo.and_then(|d| d.restaurant_name.clone()),
                        "demo": demo.is_some(),
                    },
                }))
            }
            failure => {
                let status = match failure {
                    VerificationResult::AttemptsExceeded => 429,
                    _ => 400,
                };
                let mut body = json!({
                    "success": false,
                    "error": {
                        "code": failure.code().unwrap_or_default(),
                        "message": failure.message(),
                    },
                });
                if let Some(remaining) = failure.attempts_remaining() {
                    body["attemptsRemaining"] = json!(remaining);
                }
                Response::new(status).json(body)
            }
        }
    }
}

/// Request body for clearing a rate limit.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearRateLimitBody {
    pub phone_number: Option<String>,
}

/// Handler for POST /auth/clear-rate-limit
pub struct ClearRateLimitHandler {
    pub(crate) engine: Arc<PhoneOtpEngine>,
}

#[async_trait]
impl RequestHandler for ClearRateLimitHandler {
    async fn handle(&self, req: Request) -> Response {
        let Some(body) = req.json::<ClearRateLimitBody>() else {
            return invalid_body();
        };
        let Some(phone_number) = body.phone_number else {
            return auth_error(&AuthError::missing_field("phoneNumber"));
        };

        match self.engine.clear_rate_limit(&phone_number).await {
            Ok(phone) => Response::ok().json(json!({
                "success": true,
                "message": "Rate limit cleared",
                "phoneNumber": phone.as_str(),
            })),
            Err(err) => otp_error(&err),
        }
    }
}

/// What a test-messaging call exercises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    /// Only check that the provider accepts the credentials.
    #[default]
    Connection,
    /// Send a sample login message.
    Message,
}

/// Request body for the messaging diagnostic.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMessagingBody {
    pub phone_number: Option<String>,
    pub method: Option<Channel>,
    #[serde(default)]
    pub test_type: TestKind,
}

/// Handler for POST /auth/test-messaging
pub struct TestMessagingHandler {
    pub(crate) engine: Arc<PhoneOtpEngine>,
    pub(crate) dispatcher: Arc<OtpDispatcher>,
}

#[async_trait]
impl RequestHandler for TestMessagingHandler {
    async fn handle(&self, req: Request) -> Response {
        let Some(body) = req.json::<TestMessagingBody>() else {
            return invalid_body();
        };

        if body.test_type == TestKind::Connection {
            return match self.dispatcher.check_connection().await {
                Ok(status) => Response::ok().json(json!({
                    "success": true,
                    "message": "Messaging provider connection successful",
                    "data": {
                        "provider": status.provider,
                        "account": status.account,
                        "status": status.status,
                        "timestamp": self.engine.now().to_rfc3339(),
                    },
                })),
                Err(err) => Response::error(500, err.code(), format!("Messaging provider connection failed: {err}")),
            };
        }

        let Some(phone_number) = body.phone_number else {
            return auth_error(&AuthError::missing_field("phoneNumber"));
        };
        let phone = match self.engine.normalizer().normalize_default(&phone_number) {
            Ok(phone) => phone,
            Err(err) => return otp_error(&OtpError::from(err)),
        };
        let channel = body.method.unwrap_or(Channel::Sms);

        match self.dispatcher.send_test_message(&phone, channel).await {
            Ok(receipt) => Response::ok().json(json!({
                "success": true,
                "message": format!("Test message sent via {}", receipt.channel),
                "data": {
                    "phoneNumber": phone.display(),
                    "method": receipt.channel,
                    "messageId": receipt.message_id,
                },
            })),
            Err(err) => {
                tracing::warn!(phone = %phone.masked(), error = %err, "test message failed");
                Response::error(500, err.code(), format!("Failed to send test message: {err}"))
            }
        }
    }
}
