//! Fixed-window per-minute rate limiting, shared across instances via
//! [`SharedBacking`] when configured.

use crate::cache::SharedBacking;
use crate::error::{AppError, Result};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Rate limits requests per key (typically `tenant:api-key`) to
/// `limit_per_minute` within each fixed 60-second window.
pub struct RateLimiter {
    backing: Arc<dyn SharedBacking>,
    limit_per_minute: u32,
}

impl RateLimiter {
    pub fn new(backing: Arc<dyn SharedBacking>, limit_per_minute: u32) -> Self {
        Self {
            backing,
            limit_per_minute,
        }
    }

    fn window_key(&self, key: &str, now: SystemTime) -> String {
        let minute = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            / 60;
        format!("rate-limit:{key}:{minute}")
    }

    /// Increment `key`'s counter for the current minute window and return
    /// an error once the count exceeds the configured limit.
    pub async fn check(&self, key: &str) -> Result<()> {
        self.check_at(key, SystemTime::now()).await
    }

    /// Testable variant that takes an explicit clock reading.
    pub async fn check_at(&self, key: &str, now: SystemTime) -> Result<()> {
        let window_key = self.window_key(key, now);
        let count = self
            .backing
            .incr(&window_key)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        if count == 1 {
            // First hit of this window: set the window to expire on its own
            // so stale windows don't accumulate forever.
            let _ = self.backing.expire(&window_key, Duration::from_secs(60)).await;
        }
        if count > self.limit_per_minute as i64 {
            return Err(AppError::RateLimited);
        }
        Ok(())
    }
}
