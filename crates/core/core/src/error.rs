//! Error types for Daily Auth.
//!
//! `AuthError` covers infrastructure failures that cross crate boundaries
//! (storage, configuration, delivery, request decoding). Expected outcomes of
//! the OTP flow such as a wrong code or an unsupported country are typed
//! results in their own crates, not `AuthError`s.

use thiserror::Error;

/// The main error type for Daily Auth operations.
#[derive(Debug, Error)]
pub enum AuthError {
    // ==================== Validation Errors ====================
    /// A required field is missing.
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// A field value is invalid.
    #[error("Invalid field value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// The phone number could not be canonicalized.
    #[error("Invalid phone number: {reason}")]
    InvalidPhoneNumber { reason: String },

    // ==================== Rate Limiting ====================
    /// Too many requests have been made.
    #[error("Rate limit exceeded. Try again in {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    // ==================== Delivery Errors ====================
    /// The messaging provider did not accept the message.
    #[error("Delivery via {channel} failed: {message}")]
    DeliveryFailed { channel: String, message: String },

    // ==================== Storage Errors ====================
    /// A storage backend operation failed.
    #[error("Storage error: {message}")]
    StorageError { message: String },

    // ==================== Configuration Errors ====================
    /// The configuration is invalid.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// A required configuration value is missing.
    #[error("Missing configuration: {key}")]
    MissingConfiguration { key: String },

    // ==================== Internal Errors ====================
    /// An internal error occurred.
    #[error("Internal error: {message}")]
    InternalError { message: String },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

impl AuthError {
    /// Creates a new missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates a new invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new delivery error.
    pub fn delivery(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Creates a new storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageError {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Creates a new missing configuration error.
    pub fn missing_config(key: impl Into<String>) -> Self {
        Self::MissingConfiguration { key: key.into() }
    }

    /// Creates a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Returns an error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "MISSING_FIELD",
            Self::InvalidField { .. } => "INVALID_FIELD",
            Self::InvalidPhoneNumber { .. } => "INVALID_PHONE_NUMBER",
            Self::RateLimitExceeded { .. } => "RATE_LIMITED",
            Self::DeliveryFailed { .. } => "DELIVERY_FAILED",
            Self::StorageError { .. } => "STORAGE_ERROR",
            Self::ConfigurationError { .. } => "CONFIGURATION_ERROR",
            Self::MissingConfiguration { .. } => "MISSING_CONFIGURATION",
            Self::InternalError { .. } => "INTERNAL_ERROR",
            Self::SerializationError { .. } => "SERIALIZATION_ERROR",
        }
    }

    /// Returns true if this is a user-facing error (vs internal).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. }
                | Self::InvalidField { .. }
                | Self::InvalidPhoneNumber { .. }
                | Self::RateLimitExceeded { .. }
        )
    }

    /// Returns an HTTP status code appropriate for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MissingField { .. } | Self::InvalidPhoneNumber { .. } => 400,
            Self::InvalidField { .. } => 422,
            Self::RateLimitExceeded { .. } => 429,
            Self::ConfigurationError { .. } | Self::MissingConfiguration { .. } => 503,
            _ => 500,
        }
    }
}

/// A Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            message: err.to_string(),
        }
    }
}
