//! Exponential backoff with jitter for retryable transport errors
//! (spec §4.7 step 4).

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub factor: f64,
    pub cap: Duration,
    pub jitter: f64,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { base: Duration::from_millis(500), factor: 2.0, cap: Duration::from_secs(60), jitter: 0.2, max_attempts: 5 }
    }
}

impl BackoffPolicy {
    /// `attempt` is 1-based (the first retry after an initial failure
    /// is `attempt == 1`). The base delay doubles each attempt, capped,
    /// then jittered by up to ±`jitter` of its value.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let unjittered = self.base.as_secs_f64() * self.factor.powi(attempt.saturating_sub(1) as i32);
        let capped = unjittered.min(self.cap.as_secs_f64());
        let jitter_span = capped * self.jitter;
        let offset = rand::thread_rng().gen_range(-jitter_span..=jitter_span);
        Duration::from_secs_f64((capped + offset).max(0.0))
    }

    pub fn should_dead_letter(&self, attempt: u32) -> bool {
        attempt > self.max_attempts
    }
}
