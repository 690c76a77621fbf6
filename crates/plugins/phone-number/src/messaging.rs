//! Out-of-band delivery of issued codes.
//!
//! The engine never transmits anything itself. After an issuance, the
//! [`OtpDispatcher`] picks a channel for the phone, renders the message and
//! hands it to a [`MessageSender`].

use async_trait::async_trait;
use daily_auth_otp_utils::{format_code_for_message, OtpPurpose};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::engine::Issuance;
use crate::phone::PhoneIdentity;

/// SMS bodies longer than three segments are refused.
pub const MAX_SMS_LENGTH: usize = 480;
const SMS_SEGMENT_LENGTH: usize = 160;

/// Sample code carried by diagnostic messages.
pub const TEST_MESSAGE_CODE: &str = "123456";

/// A delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    WhatsApp,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::WhatsApp => "whatsapp",
            Channel::Sms => "sms",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller's channel preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryPreference {
    WhatsApp,
    Sms,
    /// WhatsApp first, SMS if WhatsApp fails.
    #[default]
    Auto,
}

/// Picks the channel for `phone`, or `None` when it cannot receive messages.
pub fn resolve_channel(preference: DeliveryPreference, phone: &PhoneIdentity) -> Option<Channel> {
    let preferred = phone.preferred_channel()?;
    match preference {
        DeliveryPreference::WhatsApp => Some(Channel::WhatsApp),
        DeliveryPreference::Sms => Some(Channel::Sms),
        DeliveryPreference::Auto => Some(preferred),
    }
}

/// A rendered message ready for a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub channel: Channel,
    /// Provider address: `+E164` for SMS, `whatsapp:+E164` for WhatsApp.
    pub to: String,
    pub body: String,
}

/// What a provider reported after accepting a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub channel: Channel,
    pub message_id: Option<String>,
    pub status: Option<String>,
}

/// Why a code could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("Phone number cannot receive messages")]
    NoChannel,

    #[error("SMS content too long ({length} chars, max 480)")]
    MessageTooLong { length: usize },

    #[error("{channel} delivery failed: {message}")]
    Provider { channel: Channel, message: String },

    #[error("{provider} connection failed: {message}")]
    Connection {
        provider: &'static str,
        message: String,
    },
}

impl DeliveryError {
    /// Creates a provider error.
    pub fn provider(channel: Channel, message: impl Into<String>) -> Self {
        Self::Provider {
            channel,
            message: message.into(),
        }
    }

    /// Returns an error code for API responses.
    pub fn code(&self) -> &'static str {
        "DELIVERY_FAILED"
    }
}

/// What a provider reported about its own reachability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub provider: &'static str,
    /// Last characters of the provider account id, if the provider has one.
    pub account: Option<String>,
    pub status: Option<String>,
}

/// Length report for an SMS body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmsLength {
    pub length: usize,
    pub segments: usize,
    pub is_valid: bool,
}

/// Checks an SMS body against the segment budget.
pub fn check_sms_length(body: &str) -> SmsLength {
    let length = body.chars().count();
    SmsLength {
        length,
        segments: length.div_ceil(SMS_SEGMENT_LENGTH),
        is_valid: length <= MAX_SMS_LENGTH,
    }
}

/// Message bodies for each channel and purpose.
#[derive(Debug, Clone)]
pub struct MessageTemplates {
    app_name: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self::new("Restaurant Daily")
    }
}

impl MessageTemplates {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Renders the SMS body for `purpose`.
    pub fn sms(&self, purpose: OtpPurpose, code: &str, expires_in: &str) -> String {
        let app = &self.app_name;
        match purpose {
            OtpPurpose::Login => format!(
                "{app}: Your login code is {code}. Valid for {expires_in}. Don't share this code."
            ),
            OtpPurpose::Registration => format!(
                "Welcome to {app}! Your verification code is {code}. Valid for {expires_in}."
            ),
            OtpPurpose::PasswordReset => format!(
                "{app}: Password reset code: {code}. Valid for {expires_in}. Contact support if you didn't request this."
            ),
        }
    }

    /// Renders the WhatsApp body.
    pub fn whatsapp(&self, code: &str, expires_in: &str) -> String {
        format!(
            "🍽️ *{}*\n\nYour verification code: *{}*\nExpires in: {}\n\nKeep this code secure and don't share it.",
            self.app_name,
            format_code_for_message(code),
            expires_in
        )
    }

    /// Renders a complete message for `channel`.
    pub fn render(
        &self,
        channel: Channel,
        phone: &PhoneIdentity,
        purpose: OtpPurpose,
        code: &str,
        expires_in: &str,
    ) -> OutgoingMessage {
        match channel {
            Channel::WhatsApp => OutgoingMessage {
                channel,
                to: phone.whatsapp_address(),
                body: self.whatsapp(code, expires_in),
            },
            Channel::Sms => OutgoingMessage {
                channel,
                to: phone.as_str().to_string(),
                body: self.sms(purpose, code, expires_in),
            },
        }
    }
}

/// A messaging provider.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Sends one message.
    async fn send(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, DeliveryError>;

    /// Checks that the provider accepts the configured credentials.
    async fn check_connection(&self) -> Result<ProviderStatus, DeliveryError> {
        Ok(ProviderStatus {
            provider: self.name(),
            account: None,
            status: None,
        })
    }
}

/// Writes messages to the log instead of sending them. For development.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSender;

#[async_trait]
impl MessageSender for ConsoleSender {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, DeliveryError> {
        tracing::info!(
            channel = %message.channel,
            to = %message.to,
            body = %message.body,
            "console delivery"
        );
        Ok(DeliveryReceipt {
            channel: message.channel,
            message_id: None,
            status: Some("logged".to_string()),
        })
    }
}

/// Chooses a channel, renders and sends issued codes.
#[derive(Clone)]
pub struct OtpDispatcher {
    sender: Arc<dyn MessageSender>,
    templates: MessageTemplates,
}

impl OtpDispatcher {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self {
            sender,
            templates: MessageTemplates::default(),
        }
    }

    /// Uses custom templates.
    pub fn with_templates(mut self, templates: MessageTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn templates(&self) -> &MessageTemplates {
        &self.templates
    }

    /// Delivers the code of `issuance`.
    ///
    /// In auto mode a failed WhatsApp send is retried once over SMS. The
    /// issued record stays valid whatever happens here.
    pub async fn deliver(
        &self,
        issuance: &Issuance,
        preference: DeliveryPreference,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let phone = &issuance.phone;
        let channel = resolve_channel(preference, phone).ok_or(DeliveryError::NoChannel)?;

        match self.send_via(channel, issuance).await {
            Err(err) if channel == Channel::WhatsApp && preference == DeliveryPreference::Auto => {
                tracing::warn!(
                    phone = %phone.masked(),
                    sender = self.sender.name(),
                    error = %err,
                    "WhatsApp delivery failed, falling back to SMS"
                );
                self.send_via(Channel::Sms, issuance).await
            }
            other => other,
        }
    }

    /// Asks the sender whether its provider is reachable.
    pub async fn check_connection(&self) -> Result<ProviderStatus, DeliveryError> {
        let result = self.sender.check_connection().await;
        match &result {
            Ok(status) => tracing::info!(
                sender = self.sender.name(),
                account = ?status.account,
                "messaging provider reachable"
            ),
            Err(err) => tracing::warn!(
                sender = self.sender.name(),
                error = %err,
                "messaging provider unreachable"
            ),
        }
        result
    }

    /// Sends a sample login message to `phone` over `channel`.
    ///
    /// Nothing is issued; the message carries [`TEST_MESSAGE_CODE`].
    pub async fn send_test_message(
        &self,
        phone: &PhoneIdentity,
        channel: Channel,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        if phone.preferred_channel().is_none() {
            return Err(DeliveryError::NoChannel);
        }
        let message = self
            .templates
            .render(channel, phone, OtpPurpose::Login, TEST_MESSAGE_CODE, "5 minutes");
        let receipt = self.send_checked(&message).await?;
        tracing::info!(
            phone = %phone.masked(),
            channel = %channel,
            sender = self.sender.name(),
            message_id = ?receipt.message_id,
            "test message delivered"
        );
        Ok(receipt)
    }

    async fn send_via(
        &self,
        channel: Channel,
        issuance: &Issuance,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let message = self.templates.render(
            channel,
            &issuance.phone,
            issuance.record.purpose,
            &issuance.record.code,
            &issuance.expires_in,
        );
        let receipt = self.send_checked(&message).await?;
        tracing::info!(
            phone = %issuance.phone.masked(),
            channel = %channel,
            sender = self.sender.name(),
            message_id = ?receipt.message_id,
            "OTP delivered"
        );
        Ok(receipt)
    }

    async fn send_checked(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, DeliveryError> {
        if message.channel == Channel::Sms {
            let length = check_sms_length(&message.body);
            if !length.is_valid {
                return Err(DeliveryError::MessageTooLong {
                    length: length.length,
                });
            }
        }
        self.sender.send(message).await
    }
}

impl std::fmt::Debug for OtpDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpDispatcher")
            .field("sender", &self.sender.name())
            .field("templates", &self.templates)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phone::PhoneNormalizer;

    fn phone(raw: &str) -> PhoneIdentity {
        PhoneNormalizer::default().normalize_default(raw).unwrap()
    }

    #[test]
    fn test_resolve_channel() {
        let mobile = phone("+919876543210");
        assert_eq!(resolve_channel(DeliveryPreference::Auto, &mobile), Some(Channel::WhatsApp));
        assert_eq!(resolve_channel(DeliveryPreference::Sms, &mobile), Some(Channel::Sms));

        let landline = phone("+911123456789");
        assert_eq!(resolve_channel(DeliveryPreference::Auto, &landline), None);
        assert_eq!(resolve_channel(DeliveryPreference::Sms, &landline), None);
    }

    #[test]
    fn test_sms_templates() {
        let templates = MessageTemplates::default();
        assert_eq!(
            templates.sms(OtpPurpose::Login, "482913", "5 minutes"),
            "Restaurant Daily: Your login code is 482913. Valid for 5 minutes. Don't share this code."
        );
        assert!(templates
            .sms(OtpPurpose::Registration, "482913", "5 minutes")
            .starts_with("Welcome to Restaurant Daily!"));
        assert!(templates
            .sms(OtpPurpose::PasswordReset, "482913", "5 minutes")
            .contains("Password reset code: 482913"));
    }

    #[test]
    fn test_render_addresses() {
        let templates = MessageTemplates::new("Daily");
        let identity = phone("+919876543210");

        let whatsapp = templates.render(Channel::WhatsApp, &identity, OtpPurpose::Login, "482913", "5 minutes");
        assert_eq!(whatsapp.to, "whatsapp:+919876543210");
        assert!(whatsapp.body.contains("*482 913*"));
        assert!(whatsapp.body.contains("*Daily*"));

        let sms = templates.render(Channel::Sms, &identity, OtpPurpose::Login, "482913", "5 minutes");
        assert_eq!(sms.to, "+919876543210");
    }

    #[test]
    fn test_sms_length() {
        let short = check_sms_length(&"a".repeat(161));
        assert_eq!(short.segments, 2);
        assert!(short.is_valid);

        let long = check_sms_length(&"a".repeat(481));
        assert_eq!(long.segments, 4);
        assert!(!long.is_valid);
    }

    #[test]
    fn test_delivery_error_code() {
        assert_eq!(DeliveryError::NoChannel.code(), "DELIVERY_FAILED");
        assert_eq!(
            DeliveryError::provider(Channel::WhatsApp, "sandbox").to_string(),
            "whatsapp delivery failed: sandbox"
        );
    }
}
