//! Record storage seam and code-at-rest handling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use daily_auth_core::AuthResult;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::OtpRecord;

/// Storage for outstanding OTP records, keyed by canonical phone.
///
/// At most one record exists per phone; `put` replaces.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Fetches the record for `phone`.
    async fn get(&self, phone: &str) -> AuthResult<Option<OtpRecord>>;

    /// Stores `record`, replacing any record for the same phone.
    async fn put(&self, record: OtpRecord) -> AuthResult<()>;

    /// Removes the record for `phone`, returning whether one existed.
    async fn remove(&self, phone: &str) -> AuthResult<bool>;

    /// Removes every record that has expired at `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<usize>;

    /// Number of stored records.
    async fn len(&self) -> AuthResult<usize>;

    /// Returns true when nothing is stored.
    async fn is_empty(&self) -> AuthResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// How codes are kept at rest.
#[derive(Debug, Clone, Default)]
pub enum CodeStorage {
    /// Store codes as issued.
    #[default]
    Plain,
    /// Store `hex(sha256(code || last four phone digits || secret))`.
    Hashed { secret: String },
}

impl CodeStorage {
    /// Creates a hashed storage mode with the given secret.
    pub fn hashed(secret: impl Into<String>) -> Self {
        Self::Hashed {
            secret: secret.into(),
        }
    }

    /// Prepares a code for storage.
    pub fn prepare_for_storage(&self, code: &str, phone: &str) -> String {
        match self {
            CodeStorage::Plain => code.to_string(),
            CodeStorage::Hashed { secret } => digest(code, phone, secret),
        }
    }

    /// Compares a submitted code against a stored value in constant time.
    pub fn verify(&self, submitted: &str, stored: &str, phone: &str) -> bool {
        let candidate = self.prepare_for_storage(submitted, phone);
        candidate.as_bytes().ct_eq(stored.as_bytes()).into()
    }
}

fn digest(code: &str, phone: &str, secret: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(char::is_ascii_digit).collect();
    let last_four: String = digits[digits.len().saturating_sub(4)..].iter().collect();

    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.update(last_four.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
