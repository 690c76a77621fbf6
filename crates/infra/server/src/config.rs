//! Server configuration.
//!
//! Read from a TOML file. Every section and key is optional; missing values
//! fall back to the defaults below. Secrets are never written in the file,
//! only the names of the environment variables holding them.

use daily_auth_otp_utils::OtpSettings;
use daily_auth_plugin_phone_number::{DeliveryPreference, DemoIdentity, TwilioConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// The whole configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub otp: OtpConfig,
    pub phone: PhoneConfig,
    pub delivery: DeliveryConfig,
}

/// Server-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Host to bind to.
    pub host: String,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Base path for auth routes.
    pub base_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
            log_level: "info".to_string(),
            base_path: "/api".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where OTP settings come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingsSourceKind {
    /// The `[otp.settings]` table of this file.
    #[default]
    Static,
    /// `OTP_*` environment variables.
    Env,
    /// A Vault KV v2 secret.
    Vault,
}

/// OTP settings configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    pub source: SettingsSourceKind,
    /// Upper bound on one settings fetch.
    pub fetch_timeout_secs: u64,
    /// How often settings are re-read. Zero disables refreshing.
    pub refresh_interval_secs: u64,
    /// Values for the static source.
    pub settings: OtpSettings,
    pub vault: VaultConfig,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            source: SettingsSourceKind::Static,
            fetch_timeout_secs: 5,
            refresh_interval_secs: 300,
            settings: OtpSettings::default(),
            vault: VaultConfig::default(),
        }
    }
}

impl OtpConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

/// Vault location of the OTP secret.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub address: String,
    pub mount: String,
    pub path: String,
    /// Environment variable holding the Vault token.
    pub token_env: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8200".to_string(),
            mount: "secret".to_string(),
            path: "otp".to_string(),
            token_env: "VAULT_TOKEN".to_string(),
        }
    }
}

/// Phone handling and demo identities.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhoneConfig {
    /// Country assumed for numbers without a calling code.
    pub default_country: String,
    /// Allow-list of ISO country codes.
    pub supported_countries: Vec<String>,
    /// Echo demo codes in issuance responses. Development only.
    pub expose_demo_codes: bool,
    /// Mount the unauthenticated clear-rate-limit route. Operators only.
    pub expose_clear_rate_limit: bool,
    /// Mount the messaging diagnostic route. Operators only.
    pub expose_test_messaging: bool,
    /// Environment variable holding the code hashing secret. Codes are
    /// stored in plain form when unset or when the variable is empty.
    pub code_secret_env: Option<String>,
    /// Demo identities. `None` keeps the built-in set, an empty list disables demos.
    pub demo_identities: Option<Vec<DemoIdentity>>,
    pub demo_expiry_minutes: u32,
}

impl Default for PhoneConfig {
    fn default() -> Self {
        Self {
            default_country: "IN".to_string(),
            supported_countries: vec![
                "IN".to_string(),
                "US".to_string(),
                "GB".to_string(),
                "AU".to_string(),
            ],
            expose_demo_codes: false,
            expose_clear_rate_limit: false,
            expose_test_messaging: false,
            code_secret_env: None,
            demo_identities: None,
            demo_expiry_minutes: 30,
        }
    }
}

/// Messaging provider selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryProvider {
    /// Log messages instead of sending them.
    #[default]
    Console,
    Twilio,
}

/// Delivery configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub provider: DeliveryProvider,
    pub default_preference: DeliveryPreference,
    /// Brand name used in message templates.
    pub app_name: String,
    pub twilio: Option<TwilioSection>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            provider: DeliveryProvider::Console,
            default_preference: DeliveryPreference::Auto,
            app_name: "Restaurant Daily".to_string(),
            twilio: None,
        }
    }
}

/// Twilio account, with the auth token read from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct TwilioSection {
    pub account_sid: String,
    #[serde(default = "default_twilio_token_env")]
    pub auth_token_env: String,
    pub sms_from: Option<String>,
    pub whatsapp_from: Option<String>,
    pub api_base: Option<String>,
}

fn default_twilio_token_env() -> String {
    "TWILIO_AUTH_TOKEN".to_string()
}

impl TwilioSection {
    /// Builds the sender config once the auth token has been resolved.
    pub fn to_config(&self, auth_token: String) -> TwilioConfig {
        let mut config = TwilioConfig::new(&self.account_sid, auth_token);
        if let Some(from) = &self.sms_from {
            config = config.sms_from(from);
        }
        if let Some(from) = &self.whatsapp_from {
            config = config.whatsapp_from(from);
        }
        if let Some(base) = &self.api_base {
            config = config.api_base(base);
        }
        config
    }
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Loads configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let content =
        std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::IoError(e.to_string()))?;
    parse_config(&content)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}
