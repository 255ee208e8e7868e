//! Per-`system_id` token bucket (spec §4.7: "rate-limited per worker
//! by a token bucket keyed on system_id to prevent any one tenant from
//! monopolizing throughput").

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// One bucket per `system_id`, created lazily on first use and refilled
/// continuously (fractional tokens accumulate between calls rather than
/// only on fixed ticks).
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    rate_per_second: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(rate_per_second: f64) -> Self {
        Self { buckets: Mutex::new(HashMap::new()), rate_per_second, burst: rate_per_second.max(1.0) }
    }

    /// Attempts to spend one token for `system_id`; returns `true` if
    /// one was available.
    pub fn try_acquire(&self, system_id: &str, now: Instant) -> bool {
        let mut guard = self.buckets.lock();
        let bucket = guard.entry(system_id.to_string()).or_insert_with(|| Bucket { tokens: self.burst, last_refill: now });
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_second).min(self.burst);
        bucket.last_refill = now;
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub fn tracked_systems(&self) -> usize {
        self.buckets.lock().len()
    }
}
