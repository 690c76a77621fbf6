//! # Daily Auth Memory Adapter
//!
//! An in-memory [`OtpStore`] for single-process deployments, tests and
//! development.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use daily_auth_adapter_memory::MemoryAdapter;
//!
//! let engine = PhoneOtpEngine::builder()
//!     .store(MemoryAdapter::new())
//!     .build();
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use daily_auth_core::AuthResult;
use daily_auth_otp_utils::{OtpRecord, OtpStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory OTP record store.
///
/// Records are keyed by canonical phone number. Data is lost when the process
/// exits, and separate processes never see each other's records.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    records: Arc<RwLock<HashMap<String, OtpRecord>>>,
}

impl MemoryAdapter {
    /// Creates a new in-memory adapter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all stored data.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

#[async_trait]
impl OtpStore for MemoryAdapter {
    async fn get(&self, phone: &str) -> AuthResult<Option<OtpRecord>> {
        Ok(self.records.read().await.get(phone).cloned())
    }

    async fn put(&self, record: OtpRecord) -> AuthResult<()> {
        self.records
            .write()
            .await
            .insert(record.phone.clone(), record);
        Ok(())
    }

    async fn remove(&self, phone: &str) -> AuthResult<bool> {
        Ok(self.records.write().await.remove(phone).is_some())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> AuthResult<usize> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok(before - records.len())
    }

    async fn len(&self) -> AuthResult<usize> {
        Ok(self.records.read().await.len())
    }
}
