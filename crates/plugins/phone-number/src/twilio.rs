//! Twilio Messages API sender.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::messaging::{
    Channel, DeliveryError, DeliveryReceipt, MessageSender, OutgoingMessage, ProviderStatus,
};

/// Twilio account settings.
#[derive(Clone, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number for SMS.
    #[serde(default)]
    pub sms_from: Option<String>,
    /// Sender number for WhatsApp, with or without the `whatsapp:` prefix.
    #[serde(default)]
    pub whatsapp_from: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.twilio.com".to_string()
}

impl TwilioConfig {
    pub fn new(account_sid: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            sms_from: None,
            whatsapp_from: None,
            api_base: default_api_base(),
        }
    }

    pub fn sms_from(mut self, from: impl Into<String>) -> Self {
        self.sms_from = Some(from.into());
        self
    }

    pub fn whatsapp_from(mut self, from: impl Into<String>) -> Self {
        self.whatsapp_from = Some(from.into());
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("sms_from", &self.sms_from)
            .field("whatsapp_from", &self.whatsapp_from)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountResource {
    sid: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResource {
    code: Option<u32>,
    message: Option<String>,
}

/// Best available description of a failed Twilio call.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorResource>().await {
        Ok(ErrorResource {
            code: Some(code),
            message: Some(message),
        }) => format!("{message} (code {code})"),
        Ok(ErrorResource {
            message: Some(message),
            ..
        }) => message,
        _ => format!("Twilio returned {status}"),
    }
}

fn account_tail(sid: &str) -> String {
    let skip = sid.chars().count().saturating_sub(8);
    sid.chars().skip(skip).collect()
}

/// Sends SMS and WhatsApp messages through Twilio.
#[derive(Debug, Clone)]
pub struct TwilioSender {
    config: TwilioConfig,
    client: reqwest::Client,
}

impl TwilioSender {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    fn account_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    fn from_address(&self, channel: Channel) -> Result<String, DeliveryError> {
        match channel {
            Channel::Sms => self
                .config
                .sms_from
                .clone()
                .ok_or_else(|| DeliveryError::provider(channel, "no SMS sender number configured")),
            Channel::WhatsApp => {
                let from = self.config.whatsapp_from.as_deref().ok_or_else(|| {
                    DeliveryError::provider(channel, "no WhatsApp sender number configured")
                })?;
                Ok(if from.starts_with("whatsapp:") {
                    from.to_string()
                } else {
                    format!("whatsapp:{from}")
                })
            }
        }
    }
}

#[async_trait]
impl MessageSender for TwilioSender {
    fn name(&self) -> &'static str {
        "twilio"
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<DeliveryReceipt, DeliveryError> {
        let channel = message.channel;
        let from = self.from_address(channel)?;

        let mut form: HashMap<&str, &str> = HashMap::new();
        form.insert("To", &message.to);
        form.insert("From", &from);
        form.insert("Body", &message.body);

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| DeliveryError::provider(channel, format!("request to Twilio failed: {e}")))?;

        if !response.status().is_success() {
            return Err(DeliveryError::provider(channel, error_detail(response).await));
        }

        let resource: MessageResource = response
            .json()
            .await
            .map_err(|e| DeliveryError::provider(channel, format!("unreadable Twilio response: {e}")))?;
        Ok(DeliveryReceipt {
            channel,
            message_id: resource.sid,
            status: resource.status,
        })
    }

    async fn check_connection(&self) -> Result<ProviderStatus, DeliveryError> {
        let failed = |message: String| DeliveryError::Connection {
            provider: "twilio",
            message,
        };

        let response = self
            .client
            .get(self.account_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .send()
            .await
            .map_err(|e| failed(format!("request to Twilio failed: {e}")))?;
        if !response.status().is_success() {
            return Err(failed(error_detail(response).await));
        }

        let account: AccountResource = response
            .json()
            .await
            .map_err(|e| failed(format!("unreadable Twilio response: {e}")))?;
        let sid = account.sid.unwrap_or_else(|| self.config.account_sid.clone());
        Ok(ProviderStatus {
            provider: "twilio",
            account: Some(account_tail(&sid)),
            status: account.status,
        })
    }
}
