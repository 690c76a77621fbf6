//! Built-in configuration sources.

use async_trait::async_trait;
use daily_auth_core::{AuthError, AuthResult};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::{ConfigSource, OtpSettings};

/// A source that always returns the same settings.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    settings: OtpSettings,
}

impl StaticSource {
    pub fn new(settings: OtpSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ConfigSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self) -> AuthResult<OtpSettings> {
        Ok(self.settings)
    }
}

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads settings from `OTP_*` environment variables.
///
/// Unset variables keep their default; a set but unparsable variable fails
/// the whole fetch.
#[derive(Clone)]
pub struct EnvSource {
    lookup: Lookup,
}

impl EnvSource {
    pub const LENGTH: &'static str = "OTP_LENGTH";
    pub const EXPIRY_MINUTES: &'static str = "OTP_EXPIRY_MINUTES";
    pub const MAX_ATTEMPTS: &'static str = "OTP_MAX_ATTEMPTS";
    pub const RATE_LIMIT_PER_HOUR: &'static str = "OTP_RATE_LIMIT_PER_HOUR";
    pub const CLEANUP_INTERVAL_HOURS: &'static str = "OTP_CLEANUP_INTERVAL_HOURS";

    /// Creates a source reading the process environment.
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Creates a source with a custom variable lookup.
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    fn read<T: std::str::FromStr>(&self, key: &str, default: T) -> AuthResult<T> {
        match (self.lookup)(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| AuthError::config(format!("{key} is not a number: {raw:?}"))),
        }
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvSource").finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfigSource for EnvSource {
    fn name(&self) -> &'static str {
        "env"
    }

    async fn fetch(&self) -> AuthResult<OtpSettings> {
        let defaults = OtpSettings::default();
        Ok(OtpSettings {
            length: self.read(Self::LENGTH, defaults.length)?,
            expiry_minutes: self.read(Self::EXPIRY_MINUTES, defaults.expiry_minutes)?,
            max_attempts: self.read(Self::MAX_ATTEMPTS, defaults.max_attempts)?,
            rate_limit_per_hour: self.read(Self::RATE_LIMIT_PER_HOUR, defaults.rate_limit_per_hour)?,
            cleanup_interval_hours: self
                .read(Self::CLEANUP_INTERVAL_HOURS, defaults.cleanup_interval_hours)?,
        })
    }
}

/// Reads settings from a Vault KV v2 secret.
///
/// Issues `GET {address}/v1/{mount}/data/{path}` and reads the values under
/// `data.data`. Vault stores them as strings, which [`OtpSettings`] accepts.
#[derive(Clone)]
pub struct VaultSource {
    address: String,
    mount: String,
    path: String,
    token: String,
    client: reqwest::Client,
}

impl VaultSource {
    /// Creates a source for the given server and token, reading `secret/otp`.
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_string(),
            mount: "secret".to_string(),
            path: "otp".to_string(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Sets the KV mount.
    pub fn mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into().trim_matches('/').to_string();
        self
    }

    /// Sets the secret path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into().trim_matches('/').to_string();
        self
    }

    /// Uses a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The URL the secret is read from.
    pub fn url(&self) -> String {
        format!("{}/v1/{}/data/{}", self.address, self.mount, self.path)
    }

    /// Extracts settings from a KV v2 read response.
    pub fn parse_response(body: &Value) -> AuthResult<OtpSettings> {
        let data = body
            .pointer("/data/data")
            .ok_or_else(|| AuthError::config("vault response has no data.data"))?;
        Ok(serde_json::from_value(data.clone())?)
    }
}

impl fmt::Debug for VaultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSource")
            .field("address", &self.address)
            .field("mount", &self.mount)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfigSource for VaultSource {
    fn name(&self) -> &'static str {
        "vault"
    }

    async fn fetch(&self) -> AuthResult<OtpSettings> {
        let response = self
            .client
            .get(self.url())
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .map_err(|e| AuthError::config(format!("vault request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::config(format!("vault returned {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AuthError::config(format!("vault response is not JSON: {e}")))?;
        Self::parse_response(&body)
    }
}
