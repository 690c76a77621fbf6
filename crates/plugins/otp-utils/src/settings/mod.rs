//! Runtime OTP settings.
//!
//! Settings come from a [`ConfigSource`] and live in a [`SharedSettings`]
//! handle that the engine reads one snapshot from per operation. A source
//! that fails, times out or returns nonsense never blocks issuance: the
//! handle falls back to [`OtpSettings::default`] on first load and keeps the
//! last good value on refresh.

mod sources;

pub use sources::{EnvSource, StaticSource, VaultSource};

use async_trait::async_trait;
use daily_auth_core::{AuthError, AuthResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// OTP engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpSettings {
    /// Number of digits in a code.
    #[serde(deserialize_with = "lenient_number")]
    pub length: usize,
    /// Code lifetime in minutes.
    #[serde(deserialize_with = "lenient_number")]
    pub expiry_minutes: u32,
    /// Failed verifications allowed per code.
    #[serde(deserialize_with = "lenient_number")]
    pub max_attempts: u32,
    /// Issuances allowed per phone per rolling hour.
    #[serde(deserialize_with = "lenient_number")]
    pub rate_limit_per_hour: u32,
    /// Interval of the optional hygiene sweep.
    #[serde(deserialize_with = "lenient_number")]
    pub cleanup_interval_hours: u32,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            length: 6,
            expiry_minutes: 5,
            max_attempts: 3,
            rate_limit_per_hour: 3,
            cleanup_interval_hours: 24,
        }
    }
}

impl OtpSettings {
    /// Checks that every value is usable.
    pub fn validate(&self) -> AuthResult<()> {
        if !(4..=10).contains(&self.length) {
            return Err(AuthError::invalid_field("length", "must be between 4 and 10"));
        }
        for (field, value) in [
            ("expiry_minutes", self.expiry_minutes),
            ("max_attempts", self.max_attempts),
            ("rate_limit_per_hour", self.rate_limit_per_hour),
            ("cleanup_interval_hours", self.cleanup_interval_hours),
        ] {
            if value == 0 {
                return Err(AuthError::invalid_field(field, "must be at least 1"));
            }
        }
        Ok(())
    }

    /// Code time-to-live.
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.expiry_minutes))
    }

    /// Interval between hygiene sweeps.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.cleanup_interval_hours) * 3600)
    }
}

/// Accepts a number either as a JSON integer or as a numeric string.
fn lenient_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr,
    <T as TryFrom<u64>>::Error: fmt::Display,
    <T as FromStr>::Err: fmt::Display,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(value) => T::try_from(value).map_err(D::Error::custom),
        Raw::Str(value) => value.trim().parse().map_err(D::Error::custom),
    }
}

/// Where settings are fetched from.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetches the current settings.
    async fn fetch(&self) -> AuthResult<OtpSettings>;
}

/// Cloneable handle to the settings the engine runs with.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<OtpSettings>>,
}

impl SharedSettings {
    /// Creates a handle holding fixed settings.
    pub fn new(settings: OtpSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Loads settings from `source`, falling back to defaults on any failure.
    pub async fn load(source: &dyn ConfigSource, timeout: Duration) -> Self {
        match fetch_validated(source, timeout).await {
            Ok(settings) => {
                tracing::info!(source = source.name(), ?settings, "loaded OTP settings");
                Self::new(settings)
            }
            Err(err) => {
                tracing::warn!(
                    source = source.name(),
                    error = %err,
                    "failed to load OTP settings, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Re-fetches from `source`. Keeps the current value when the fetch fails.
    pub async fn refresh(&self, source: &dyn ConfigSource, timeout: Duration) -> bool {
        match fetch_validated(source, timeout).await {
            Ok(settings) => {
                let mut current = self.inner.write().await;
                if *current != settings {
                    tracing::info!(source = source.name(), ?settings, "OTP settings changed");
                }
                *current = settings;
                true
            }
            Err(err) => {
                tracing::warn!(
                    source = source.name(),
                    error = %err,
                    "failed to refresh OTP settings, keeping previous values"
                );
                false
            }
        }
    }

    /// Returns a snapshot of the current settings.
    pub async fn current(&self) -> OtpSettings {
        *self.inner.read().await
    }

    /// Replaces the current settings.
    pub async fn replace(&self, settings: OtpSettings) {
        *self.inner.write().await = settings;
    }
}

async fn fetch_validated(source: &dyn ConfigSource, timeout: Duration) -> AuthResult<OtpSettings> {
    let settings = tokio::time::timeout(timeout, source.fetch())
        .await
        .map_err(|_| AuthError::config(format!("{} did not answer within {timeout:?}", source.name())))??;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FailingSource;

    #[async_trait]
    impl ConfigSource for FailingSource {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn fetch(&self) -> AuthResult<OtpSettings> {
            Err(AuthError::config("backend down"))
        }
    }

    struct SlowSource;

    #[async_trait]
    impl ConfigSource for SlowSource {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn fetch(&self) -> AuthResult<OtpSettings> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(OtpSettings {
                length: 8,
                ..Default::default()
            })
        }
    }

    fn custom() -> OtpSettings {
        OtpSettings {
            length: 8,
            expiry_minutes: 10,
            max_attempts: 5,
            rate_limit_per_hour: 10,
            cleanup_interval_hours: 12,
        }
    }

    #[test]
    fn test_defaults() {
        let settings = OtpSettings::default();
        assert_eq!(settings.length, 6);
        assert_eq!(settings.expiry_minutes, 5);
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.rate_limit_per_hour, 3);
        assert_eq!(settings.cleanup_interval_hours, 24);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.ttl(), chrono::Duration::minutes(5));
    }

    #[test]
    fn test_deserialize_strings_and_numbers() {
        let settings: OtpSettings = serde_json::from_value(json!({
            "length": "8",
            "expiry_minutes": 10,
            "max_attempts": " 5 ",
        }))
        .unwrap();
        assert_eq!(settings.length, 8);
        assert_eq!(settings.expiry_minutes, 10);
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.rate_limit_per_hour, 3);

        assert!(serde_json::from_value::<OtpSettings>(json!({ "length": "six" })).is_err());
    }

    #[test]
    fn test_validate() {
        let too_short = OtpSettings {
            length: 3,
            ..Default::default()
        };
        assert!(too_short.validate().is_err());

        let no_attempts = OtpSettings {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(no_attempts.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_falls_back_on_error() {
        let shared = SharedSettings::load(&FailingSource, Duration::from_secs(1)).await;
        assert_eq!(shared.current().await, OtpSettings::default());
    }

    #[tokio::test]
    async fn test_load_falls_back_on_timeout() {
        let shared = SharedSettings::load(&SlowSource, Duration::from_millis(20)).await;
        assert_eq!(shared.current().await, OtpSettings::default());
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_values() {
        let source = StaticSource::new(OtpSettings {
            length: 40,
            ..Default::default()
        });
        let shared = SharedSettings::load(&source, Duration::from_secs(1)).await;
        assert_eq!(shared.current().await, OtpSettings::default());
    }

    #[tokio::test]
    async fn test_refresh_keeps_last_good_value() {
        let shared = SharedSettings::load(&StaticSource::new(custom()), Duration::from_secs(1)).await;
        assert_eq!(shared.current().await, custom());

        assert!(!shared.refresh(&FailingSource, Duration::from_secs(1)).await);
        assert_eq!(shared.current().await, custom());

        assert!(shared
            .refresh(&StaticSource::new(OtpSettings::default()), Duration::from_secs(1))
            .await);
        assert_eq!(shared.current().await, OtpSettings::default());
    }
}
