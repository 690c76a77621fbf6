//! The verification state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CodeStorage, OtpRecord};

/// Result of a verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationResult {
    /// The code matched; the challenge is consumed.
    Valid,
    /// The code did not match and the challenge is still live.
    WrongCode { attempts_remaining: u32 },
    /// The challenge expired before a matching code arrived.
    Expired,
    /// The challenge ran out of attempts.
    AttemptsExceeded,
    /// No challenge exists for the phone.
    NotFound,
}

impl VerificationResult {
    /// Returns true if verification was successful.
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Valid)
    }

    /// Returns an error code for API responses.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            VerificationResult::Valid => None,
            VerificationResult::WrongCode { .. } => Some("WRONG_CODE"),
            VerificationResult::Expired => Some("EXPIRED"),
            VerificationResult::AttemptsExceeded => Some("ATTEMPTS_EXCEEDED"),
            VerificationResult::NotFound => Some("NOT_FOUND"),
        }
    }

    /// Returns a user-facing message.
    pub fn message(&self) -> String {
        match self {
            VerificationResult::Valid => "Phone number verified".to_string(),
            VerificationResult::WrongCode { attempts_remaining } => format!(
                "Invalid verification code. {attempts_remaining} {} remaining.",
                if *attempts_remaining == 1 { "attempt" } else { "attempts" }
            ),
            VerificationResult::Expired => {
                "Verification code has expired. Please request a new one.".to_string()
            }
            VerificationResult::AttemptsExceeded => {
                "Too many failed attempts. Please request a new code.".to_string()
            }
            VerificationResult::NotFound => {
                "No verification code found. Please request a new one.".to_string()
            }
        }
    }

    /// Remaining attempts, present only for a wrong code.
    pub fn attempts_remaining(&self) -> Option<u32> {
        match self {
            VerificationResult::WrongCode { attempts_remaining } => Some(*attempts_remaining),
            _ => None,
        }
    }
}

/// What the caller must do with the record after [`check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFate {
    /// Write the record back; its attempt counter changed.
    Keep,
    /// Delete the record.
    Remove,
}

/// Runs one verification step against an existing record.
///
/// Order matters: exhausted and expired records are rejected before the
/// attempt counter moves, and a correct code is accepted before the counter
/// is compared with the limit. The caller must hold the phone's lock for the
/// whole get/check/write-back sequence.
pub fn check(
    record: &mut OtpRecord,
    submitted: &str,
    max_attempts: u32,
    storage: &CodeStorage,
    now: DateTime<Utc>,
) -> (VerificationResult, RecordFate) {
    if record.attempts >= max_attempts {
        return (VerificationResult::AttemptsExceeded, RecordFate::Remove);
    }

    if record.is_expired_at(now) {
        return (VerificationResult::Expired, RecordFate::Remove);
    }

    record.attempts += 1;

    if storage.verify(submitted, &record.code, &record.phone) {
        return (VerificationResult::Valid, RecordFate::Remove);
    }

    if record.attempts >= max_attempts {
        (VerificationResult::AttemptsExceeded, RecordFate::Remove)
    } else {
        (
            VerificationResult::WrongCode {
                attempts_remaining: max_attempts - record.attempts,
            },
            RecordFate::Keep,
        )
    }
}
