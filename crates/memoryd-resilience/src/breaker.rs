use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_duration: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, success_threshold: 2, open_duration: Duration::from_secs(60) }
    }
}

#[derive(Debug, Default)]
pub struct BreakerCounters {
    pub successes: u64,
    pub failures: u64,
    pub rejections: u64,
    pub timeouts: u64,
}

struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

/// Per-named-dependency circuit breaker (spec §4.13): Closed -> Open on
/// `failure_threshold` consecutive failures, Open -> HalfOpen after
/// `open_duration`, HalfOpen -> Closed on `success_threshold`
/// consecutive successes, any HalfOpen failure snaps back to Open.
/// Calls made while Open are rejected without invoking the wrapped
/// operation; the caller is responsible for treating a timeout as a
/// failure outcome before reporting it here.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
    timeouts: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDecision {
    Proceed,
    Rejected,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner { state: BreakerState::Closed, consecutive_failures: 0, consecutive_successes: 0, opened_at: None }),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        let mut guard = self.inner.lock();
        self.maybe_transition_to_half_open(&mut guard);
        guard.state
    }

    /// Call before invoking the guarded operation. Returns `Rejected`
    /// while Open and not yet eligible for a half-open probe.
    pub fn before_call(&self) -> CallDecision {
        let mut guard = self.inner.lock();
        self.maybe_transition_to_half_open(&mut guard);
        match guard.state {
            BreakerState::Open => {
                self.rejections.fetch_add(1, Ordering::Relaxed);
                CallDecision::Rejected
            }
            BreakerState::Closed | BreakerState::HalfOpen => CallDecision::Proceed,
        }
    }

    pub fn on_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.inner.lock();
        guard.consecutive_failures = 0;
        match guard.state {
            BreakerState::HalfOpen => {
                guard.consecutive_successes += 1;
                if guard.consecutive_successes >= self.config.success_threshold {
                    guard.state = BreakerState::Closed;
                    guard.consecutive_successes = 0;
                    guard.opened_at = None;
                    tracing::info!(breaker = %self.name, "circuit closed after successful probes");
                }
            }
            BreakerState::Closed => {}
            BreakerState::Open => {}
        }
    }

    pub fn on_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.record_failure();
    }

    pub fn on_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        self.record_failure();
    }

    fn record_failure(&self) {
        let mut guard = self.inner.lock();
        guard.consecutive_successes = 0;
        match guard.state {
            BreakerState::HalfOpen => {
                self.open(&mut guard);
            }
            BreakerState::Closed => {
                guard.consecutive_failures += 1;
                if guard.consecutive_failures >= self.config.failure_threshold {
                    self.open(&mut guard);
                }
            }
            BreakerState::Open => {}
        }
    }

    fn open(&self, guard: &mut Inner) {
        guard.state = BreakerState::Open;
        guard.opened_at = Some(Instant::now());
        guard.consecutive_failures = 0;
        guard.consecutive_successes = 0;
        tracing::warn!(breaker = %self.name, "circuit opened");
    }

    fn maybe_transition_to_half_open(&self, guard: &mut Inner) {
        if guard.state == BreakerState::Open {
            if let Some(opened_at) = guard.opened_at {
                if opened_at.elapsed() >= self.config.open_duration {
                    guard.state = BreakerState::HalfOpen;
                    guard.consecutive_successes = 0;
                    tracing::info!(breaker = %self.name, "circuit half-open, probing");
                }
            }
        }
    }

    pub fn counters(&self) -> BreakerCounters {
        BreakerCounters {
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> BreakerConfig {
        BreakerConfig { failure_threshold: 5, success_threshold: 2, open_duration: Duration::from_millis(50) }
    }

    #[test]
    fn five_consecutive_failures_open_the_breaker() {
        let breaker = CircuitBreaker::new("object-store", fast_config());
        for _ in 0..5 {
            assert_eq!(breaker.before_call(), CallDecision::Proceed);
            breaker.on_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.before_call(), CallDecision::Rejected);
        assert_eq!(breaker.counters().rejections, 1);
    }

    #[test]
    fn half_open_failure_snaps_back_to_open() {
        let breaker = CircuitBreaker::new("object-store", fast_config());
        for _ in 0..5 {
            breaker.on_failure();
        }
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.before_call();
        breaker.on_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn two_successful_probes_close_the_breaker() {
        let breaker = CircuitBreaker::new("object-store", fast_config());
        for _ in 0..5 {
            breaker.on_failure();
        }
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(breaker.before_call(), CallDecision::Proceed);
        breaker.on_success();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert_eq!(breaker.before_call(), CallDecision::Proceed);
        breaker.on_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn timeout_counts_as_failure_toward_threshold() {
        let breaker = CircuitBreaker::new("object-store", fast_config());
        for _ in 0..4 {
            breaker.on_timeout();
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.on_timeout();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.counters().timeouts, 5);
    }

    #[test]
    fn interleaved_success_resets_consecutive_failure_count() {
        let breaker = CircuitBreaker::new("object-store", fast_config());
        breaker.on_failure();
        breaker.on_failure();
        breaker.on_success();
        breaker.on_failure();
        breaker.on_failure();
        breaker.on_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
