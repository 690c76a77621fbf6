//! Sliding-window rate limiting for OTP issuance.

use chrono::{DateTime, Duration, Utc};
use daily_auth_core::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-key sliding-window counter.
///
/// Each key keeps the timestamps of its recorded attempts. Timestamps older
/// than the window are pruned lazily whenever the key is checked.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    window: Duration,
    windows: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
}

impl RateLimiter {
    /// Creates a limiter with a one hour window.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_window(clock, Duration::hours(1))
    }

    /// Creates a limiter with a custom window.
    pub fn with_window(clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            clock,
            window,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Prunes the key's window and returns true if it already holds `limit` attempts.
    pub async fn is_rate_limited(&self, key: &str, limit: u32) -> bool {
        self.pruned_count(key).await >= limit as usize
    }

    /// Appends the current time to the key's window.
    ///
    /// Call only after a limit check has passed so rejected requests are not counted.
    pub async fn record_attempt(&self, key: &str) {
        let now = self.clock.now();
        let mut windows = self.windows.write().await;
        windows.entry(key.to_string()).or_default().push(now);
    }

    /// Returns `max(0, limit - attempts in window)`.
    pub async fn remaining_attempts(&self, key: &str, limit: u32) -> u32 {
        let used = self.pruned_count(key).await;
        (limit as usize).saturating_sub(used) as u32
    }

    /// Seconds until the key drops below `limit` again, or 0 if it already is.
    pub async fn retry_after(&self, key: &str, limit: u32) -> u64 {
        let now = self.clock.now();
        let mut windows = self.windows.write().await;
        let Some(stamps) = windows.get_mut(key) else {
            return 0;
        };
        prune(stamps, now, self.window);

        let limit = limit as usize;
        if stamps.len() < limit {
            return 0;
        }
        // Slot frees up when the entry `len - limit` ages out.
        let freeing = stamps[stamps.len() - limit];
        let wait = freeing + self.window - now;
        let millis = wait.num_milliseconds().max(0);
        ((millis + 999) / 1000) as u64
    }

    /// Empties the key's window.
    pub async fn clear(&self, key: &str) -> bool {
        self.windows.write().await.remove(key).is_some()
    }

    /// Prunes every window and drops empty ones, returning how many were dropped.
    pub async fn prune(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.write().await;
        let before = windows.len();
        windows.retain(|_, stamps| {
            prune(stamps, now, self.window);
            !stamps.is_empty()
        });
        before - windows.len()
    }

    /// Number of keys with a window.
    pub async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }

    async fn pruned_count(&self, key: &str) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.write().await;
        match windows.get_mut(key) {
            Some(stamps) => {
                prune(stamps, now, self.window);
                stamps.len()
            }
            None => 0,
        }
    }
}

fn prune(stamps: &mut Vec<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) {
    let cutoff = now - window;
    stamps.retain(|stamp| *stamp > cutoff);
}
