//! # Daily Auth OTP Utilities
//!
//! Building blocks for phone OTP challenges. This crate provides:
//! - OTP records and purposes
//! - Code generation
//! - Sliding-window rate limiting
//! - The store seam and code-at-rest handling
//! - The verification state machine
//! - Runtime settings with pluggable configuration sources

mod generator;
mod locks;
mod rate_limit;
pub mod settings;
mod storage;
mod verification;

pub use generator::{format_code_for_message, is_well_formed_code, CodeGenerator, RandomCodeGenerator};
pub use locks::KeyedLocks;
pub use rate_limit::RateLimiter;
pub use settings::{ConfigSource, EnvSource, OtpSettings, SharedSettings, StaticSource, VaultSource};
pub use storage::{CodeStorage, OtpStore};
pub use verification::{check, RecordFate, VerificationResult};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The business context of an OTP challenge.
///
/// Informational only: it selects a message template but never changes how a
/// code is verified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    #[default]
    Login,
    Registration,
    PasswordReset,
}

impl OtpPurpose {
    /// Returns the wire name of the purpose.
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Login => "login",
            OtpPurpose::Registration => "registration",
            OtpPurpose::PasswordReset => "password_reset",
        }
    }
}

impl std::fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outstanding verification challenge for a phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRecord {
    /// Unique identifier for this challenge.
    pub id: String,
    /// Canonical E.164 phone number owning the challenge.
    pub phone: String,
    /// The code, or its digest when stored hashed.
    pub code: String,
    /// Digits in the code as issued; survives hashing and length changes.
    #[serde(default)]
    pub code_length: usize,
    pub purpose: OtpPurpose,
    pub expires_at: DateTime<Utc>,
    /// Failed verification attempts so far.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl OtpRecord {
    /// Creates a fresh record issued at `now` with zero attempts.
    pub fn new(
        phone: impl Into<String>,
        code: impl Into<String>,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let code = code.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            phone: phone.into(),
            code_length: code.len(),
            code,
            purpose,
            expires_at: now + ttl,
            attempts: 0,
            created_at: now,
        }
    }

    /// Checks whether the record has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Human-readable remaining lifetime at `now`.
    pub fn expiry_description(&self, now: DateTime<Utc>) -> String {
        expiry_description(self.expires_at, now)
    }
}

/// Describes the time left until `expires_at`, rounded up to whole minutes.
pub fn expiry_description(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining_ms = (expires_at - now).num_milliseconds();
    if remaining_ms <= 0 {
        return "expired".to_string();
    }
    let minutes = (remaining_ms + 59_999) / 60_000;
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{minutes} minutes")
    }
}
