use crate::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use dashmap::DashMap;
use std::sync::Arc;

/// Named circuit breakers for every external dependency the facade
/// wraps (object store, webhook delivery, inter-shard RPC, ...).
/// Breakers are created lazily on first use so callers don't need to
/// enumerate dependency names up front.
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    config: BreakerConfig,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self { breakers: DashMap::new(), config }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(&existing);
        }
        let breaker = Arc::new(CircuitBreaker::new(name, self.config));
        self.breakers.insert(name.to_string(), Arc::clone(&breaker));
        breaker
    }

    pub fn snapshot_states(&self) -> Vec<(String, BreakerState)> {
        self.breakers.iter().map(|entry| (entry.key().clone(), entry.value().state())).collect()
    }
}
