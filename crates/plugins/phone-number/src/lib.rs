//! # Daily Auth Phone Number Plugin
//!
//! Phone OTP login: canonicalizes phone numbers, issues rate-limited
//! one-time codes, delivers them over WhatsApp or SMS and verifies them.
//! Demo identities skip rate limiting and delivery with a fixed code.

mod config;
pub mod demo;
pub mod engine;
mod handlers;
pub mod messaging;
pub mod phone;
pub mod twilio;

pub use config::PhoneNumberConfig;
pub use demo::{DemoConfigError, DemoIdentity, DemoPolicy, DemoRole};
pub use engine::{Issuance, OtpError, PhoneOtpEngine, PhoneOtpEngineBuilder, PurgeReport, Verification};
pub use handlers::{ClearRateLimitBody, RequestOtpBody, TestKind, TestMessagingBody, VerifyOtpBody};
pub use messaging::{
    Channel, ConsoleSender, DeliveryError, DeliveryPreference, DeliveryReceipt, MessageSender,
    MessageTemplates, OtpDispatcher, OutgoingMessage, ProviderStatus, TEST_MESSAGE_CODE,
};
pub use phone::{PhoneError, PhoneIdentity, PhoneNormalizer};
pub use twilio::{TwilioConfig, TwilioSender};

use daily_auth_core::router::{Method, Route, Router};
use daily_auth_core::traits::AuthPlugin;
use std::sync::Arc;

/// The Phone Number authentication plugin.
pub struct PhoneNumberPlugin {
    engine: Arc<PhoneOtpEngine>,
    dispatcher: Arc<OtpDispatcher>,
    config: PhoneNumberConfig,
}

impl PhoneNumberPlugin {
    /// Creates a new Phone Number plugin.
    pub fn new(engine: Arc<PhoneOtpEngine>, dispatcher: Arc<OtpDispatcher>, config: PhoneNumberConfig) -> Self {
        Self {
            engine,
            dispatcher,
            config,
        }
    }

    /// Gets the plugin configuration.
    pub fn config(&self) -> &PhoneNumberConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<PhoneOtpEngine> {
        &self.engine
    }
}

impl AuthPlugin for PhoneNumberPlugin {
    fn id(&self) -> &'static str {
        "phone_number"
    }

    fn name(&self) -> &'static str {
        "Phone Number OTP Authentication"
    }

    fn register_routes(&self, router: &mut Router) {
        // POST /auth/request-otp
        router.route(
            Route::new(
                Method::POST,
                "/auth/request-otp",
                handlers::RequestOtpHandler {
                    engine: self.engine.clone(),
                    dispatcher: self.dispatcher.clone(),
                    config: self.config.clone(),
                },
            )
            .summary("Request OTP")
            .description("Issues a one-time code for the phone number and delivers it over WhatsApp or SMS.")
            .tag(self.config.tag.clone()),
        );

        // POST /auth/verify-otp
        router.route(
            Route::new(
                Method::POST,
                "/auth/verify-otp",
                handlers::VerifyOtpHandler {
                    engine: self.engine.clone(),
                },
            )
            .summary("Verify OTP")
            .description("Verifies a one-time code. Codes are single use.")
            .tag(self.config.tag.clone()),
        );

        // POST /auth/clear-rate-limit
        if self.config.expose_clear_rate_limit {
            router.route(
                Route::new(
                    Method::POST,
                    "/auth/clear-rate-limit",
                    handlers::ClearRateLimitHandler {
                        engine: self.engine.clone(),
                    },
                )
                .summary("Clear rate limit")
                .description("Administrative reset of a phone number's issuance window.")
                .tag(self.config.tag.clone()),
            );
        }

        // POST /auth/test-messaging
        if self.config.expose_test_messaging {
            router.route(
                Route::new(
                    Method::POST,
                    "/auth/test-messaging",
                    handlers::TestMessagingHandler {
                        engine: self.engine.clone(),
                        dispatcher: self.dispatcher.clone(),
                    },
                )
                .summary("Test messaging")
                .description("Checks the messaging provider connection or sends a sample message.")
                .tag(self.config.tag.clone()),
            );
        }
    }
}
