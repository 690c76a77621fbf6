//! The phone OTP engine.
//!
//! Ties the normalizer, demo policy, rate limiter, generator and store
//! together. Every operation on a phone runs under that phone's lock, so the
//! check-record-generate-put issuance sequence and the get-check-write back
//! verification sequence never interleave for the same number.

use chrono::{DateTime, Utc};
use daily_auth_core::{AuthError, AuthResult, Clock, SystemClock};
use daily_auth_otp_utils::{
    check, expiry_description, CodeGenerator, CodeStorage, KeyedLocks,
    OtpPurpose, OtpRecord, OtpSettings, OtpStore, RandomCodeGenerator, RateLimiter, RecordFate,
    SharedSettings, VerificationResult,
};
use std::sync::Arc;
use thiserror::Error;

use crate::demo::{DemoIdentity, DemoPolicy};
use crate::phone::{PhoneError, PhoneIdentity, PhoneNormalizer};

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum OtpError {
    #[error(transparent)]
    InvalidPhone(#[from] PhoneError),

    #[error("OTP must be a {length}-digit number")]
    InvalidCodeFormat { length: usize },

    #[error("Too many OTP requests. Please try again later.")]
    RateLimited {
        remaining_attempts: u32,
        retry_after_seconds: u64,
    },

    #[error(transparent)]
    Store(#[from] AuthError),
}

impl OtpError {
    /// Returns an error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            OtpError::InvalidPhone(err) => err.code(),
            OtpError::InvalidCodeFormat { .. } => "INVALID_CODE_FORMAT",
            OtpError::RateLimited { .. } => "RATE_LIMITED",
            OtpError::Store(err) => err.code(),
        }
    }

    /// Returns an HTTP status code appropriate for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            OtpError::InvalidPhone(_) | OtpError::InvalidCodeFormat { .. } => 400,
            OtpError::RateLimited { .. } => 429,
            OtpError::Store(err) => err.status_code(),
        }
    }
}

/// A successfully issued challenge.
#[derive(Debug, Clone)]
pub struct Issuance {
    pub phone: PhoneIdentity,
    /// The record with its plain code, for delivery.
    pub record: OtpRecord,
    /// Set when the phone is a demo identity; nothing should be delivered.
    pub demo: Option<DemoIdentity>,
    /// Human-readable lifetime at issuance, e.g. "5 minutes".
    pub expires_in: String,
}

impl Issuance {
    pub fn is_demo(&self) -> bool {
        self.demo.is_some()
    }
}

/// Outcome of a verification call.
#[derive(Debug, Clone)]
pub struct Verification {
    pub phone: PhoneIdentity,
    pub result: VerificationResult,
    /// The demo identity that logged in, on success only.
    pub demo: Option<DemoIdentity>,
}

/// Counts from one hygiene sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub records: usize,
    pub rate_windows: usize,
    pub locks: usize,
}

/// Issues, rate limits and verifies phone OTPs.
pub struct PhoneOtpEngine {
    normalizer: PhoneNormalizer,
    demo: DemoPolicy,
    settings: SharedSettings,
    store: Arc<dyn OtpStore>,
    generator: Arc<dyn CodeGenerator>,
    code_storage: CodeStorage,
    clock: Arc<dyn Clock>,
    limiter: RateLimiter,
    locks: KeyedLocks,
}

impl PhoneOtpEngine {
    pub fn builder() -> PhoneOtpEngineBuilder {
        PhoneOtpEngineBuilder::default()
    }

    pub fn normalizer(&self) -> &PhoneNormalizer {
        &self.normalizer
    }

    pub fn demo_policy(&self) -> &DemoPolicy {
        &self.demo
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Issues a challenge for `raw`.
    ///
    /// Demo phones get a record with their fixed code and the demo lifetime,
    /// without touching the rate limiter or the generator. Other phones are
    /// rate checked, the attempt recorded and a fresh code minted.
    pub async fn request_otp(&self, raw: &str, purpose: OtpPurpose) -> Result<Issuance, OtpError> {
        let phone = self.normalizer.normalize_default(raw)?;
        let settings = self.settings.current().await;
        let _guard = self.locks.lock(phone.as_str()).await;

        if let Some(demo) = self.demo.lookup(&phone) {
            let now = self.clock.now();
            let record = OtpRecord::new(phone.as_str(), demo.code.as_str(), purpose, now, self.demo.ttl());
            self.put_record(&record).await?;
            tracing::info!(phone = %phone.masked(), purpose = %purpose, "issued demo OTP");
            return Ok(Issuance {
                expires_in: record.expiry_description(now),
                phone,
                record,
                demo: Some(demo.clone()),
            });
        }

        let limit = settings.rate_limit_per_hour;
        if self.limiter.is_rate_limited(phone.as_str(), limit).await {
            let remaining_attempts = self.limiter.remaining_attempts(phone.as_str(), limit).await;
            let retry_after_seconds = self.limiter.retry_after(phone.as_str(), limit).await;
            tracing::warn!(
                phone = %phone.masked(),
                limit,
                retry_after_seconds,
                "OTP request rate limited"
            );
            return Err(OtpError::RateLimited {
                remaining_attempts,
                retry_after_seconds,
            });
        }
        self.limiter.record_attempt(phone.as_str()).await;

        let record = self.mint(&phone, purpose, &settings).await?;
        let expires_in = record.expiry_description(self.clock.now());
        Ok(Issuance {
            phone,
            record,
            demo: None,
            expires_in,
        })
    }

    /// Mints and stores a fresh code for an already canonical phone.
    ///
    /// Replaces any outstanding record for the phone. Does not consult the
    /// rate limiter.
    pub async fn generate(&self, phone: &PhoneIdentity, purpose: OtpPurpose) -> Result<OtpRecord, OtpError> {
        let settings = self.settings.current().await;
        let _guard = self.locks.lock(phone.as_str()).await;
        self.mint(phone, purpose, &settings).await
    }

    /// Verifies `code` for `raw`.
    ///
    /// A code that is not all digits, or whose length matches neither the
    /// current setting nor the outstanding record, is rejected before any
    /// state changes.
    pub async fn verify_otp(&self, raw: &str, code: &str) -> Result<Verification, OtpError> {
        let phone = self.normalizer.normalize_default(raw)?;
        let settings = self.settings.current().await;
        let demo = self.demo.lookup(&phone);

        let length = demo.map_or(settings.length, |d| d.code.len());
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpError::InvalidCodeFormat { length });
        }

        let _guard = self.locks.lock(phone.as_str()).await;
        let Some(mut record) = self.store.get(phone.as_str()).await? else {
            if code.len() != length {
                return Err(OtpError::InvalidCodeFormat { length });
            }
            tracing::info!(phone = %phone.masked(), "verification without outstanding OTP");
            return Ok(Verification {
                phone,
                result: VerificationResult::NotFound,
                demo: None,
            });
        };

        // Codes issued before a length change stay verifiable until they lapse.
        if code.len() != record.code_length && code.len() != length {
            return Err(OtpError::InvalidCodeFormat {
                length: if record.code_length > 0 { record.code_length } else { length },
            });
        }

        let now = self.clock.now();
        let (result, fate) = check(&mut record, code, settings.max_attempts, &self.code_storage, now);
        match fate {
            RecordFate::Remove => {
                self.store.remove(phone.as_str()).await?;
            }
            RecordFate::Keep => self.store.put(record).await?,
        }

        match result {
            VerificationResult::Valid => {
                tracing::info!(phone = %phone.masked(), demo = demo.is_some(), "OTP verified")
            }
            _ => tracing::info!(
                phone = %phone.masked(),
                reason = result.code().unwrap_or_default(),
                "OTP verification failed"
            ),
        }

        Ok(Verification {
            demo: if result.is_valid() { demo.cloned() } else { None },
            phone,
            result,
        })
    }

    /// Empties the rate window of `raw`.
    pub async fn clear_rate_limit(&self, raw: &str) -> Result<PhoneIdentity, OtpError> {
        let phone = self.normalizer.normalize_default(raw)?;
        let cleared = self.limiter.clear(phone.as_str()).await;
        tracing::info!(phone = %phone.masked(), cleared, "rate limit cleared");
        Ok(phone)
    }

    /// Issuances `raw` may still make in the current window.
    pub async fn remaining_attempts(&self, raw: &str) -> Result<u32, OtpError> {
        let phone = self.normalizer.normalize_default(raw)?;
        let limit = self.settings.current().await.rate_limit_per_hour;
        Ok(self.limiter.remaining_attempts(phone.as_str(), limit).await)
    }

    /// Drops expired records, empty rate windows and idle locks.
    ///
    /// Expiry is enforced on verification anyway; this only bounds memory.
    pub async fn purge_expired(&self) -> AuthResult<PurgeReport> {
        let report = PurgeReport {
            records: self.store.purge_expired(self.clock.now()).await?,
            rate_windows: self.limiter.prune().await,
            locks: self.locks.prune().await,
        };
        tracing::debug!(?report, "OTP hygiene sweep");
        Ok(report)
    }

    async fn mint(
        &self,
        phone: &PhoneIdentity,
        purpose: OtpPurpose,
        settings: &OtpSettings,
    ) -> Result<OtpRecord, OtpError> {
        let code = self.generator.generate(settings.length);
        let record = OtpRecord::new(phone.as_str(), code, purpose, self.clock.now(), settings.ttl());
        self.put_record(&record).await?;
        tracing::info!(
            phone = %phone.masked(),
            purpose = %purpose,
            expires = %expiry_description(record.expires_at, self.clock.now()),
            "issued OTP"
        );
        Ok(record)
    }

    async fn put_record(&self, record: &OtpRecord) -> AuthResult<()> {
        let mut stored = record.clone();
        stored.code = self.code_storage.prepare_for_storage(&record.code, &record.phone);
        self.store.put(stored).await
    }
}

impl std::fmt::Debug for PhoneOtpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhoneOtpEngine")
            .field("normalizer", &self.normalizer)
            .field("demo_identities", &self.demo.len())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Builder for [`PhoneOtpEngine`].
#[derive(Default)]
pub struct PhoneOtpEngineBuilder {
    normalizer: Option<PhoneNormalizer>,
    demo: Option<DemoPolicy>,
    settings: Option<SharedSettings>,
    store: Option<Arc<dyn OtpStore>>,
    generator: Option<Arc<dyn CodeGenerator>>,
    code_storage: Option<CodeStorage>,
    clock: Option<Arc<dyn Clock>>,
}

impl PhoneOtpEngineBuilder {
    pub fn normalizer(mut self, normalizer: PhoneNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn demo_policy(mut self, demo: DemoPolicy) -> Self {
        self.demo = Some(demo);
        self
    }

    pub fn settings(mut self, settings: SharedSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Sets the record store. Required.
    pub fn store(mut self, store: impl OtpStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn shared_store(mut self, store: Arc<dyn OtpStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn generator(mut self, generator: impl CodeGenerator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    pub fn code_storage(mut self, code_storage: CodeStorage) -> Self {
        self.code_storage = Some(code_storage);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Builds the engine.
    pub fn build(self) -> AuthResult<PhoneOtpEngine> {
        let store = self.store.ok_or_else(|| AuthError::missing_config("store"))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Ok(PhoneOtpEngine {
            normalizer: self.normalizer.unwrap_or_default(),
            demo: self.demo.unwrap_or_default(),
            settings: self.settings.unwrap_or_default(),
            store,
            generator: self.generator.unwrap_or_else(|| Arc::new(RandomCodeGenerator)),
            code_storage: self.code_storage.unwrap_or_default(),
            limiter: RateLimiter::new(clock.clone()),
            locks: KeyedLocks::new(),
            clock,
        })
    }
}
