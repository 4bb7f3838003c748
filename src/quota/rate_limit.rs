//! Global rate limiter
//!
//! Enforces a minimum spacing between consecutive outbound calls across the
//! whole process, independent of which credential is used. The last-call
//! timestamp is a single value behind a fair async mutex: the lock is held
//! across the spacing sleep, so exactly one caller proceeds per interval and
//! waiters are served in arrival order.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Spaces outbound calls by a configured minimum interval
pub struct RateLimiter {
    spacing: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter with the given minimum spacing between calls
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_call: Mutex::new(None),
        }
    }

    /// Suspends until the spacing has elapsed since the last call, then
    /// records now as the last-call time
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.spacing {
                tokio::time::sleep(self.spacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
