mod anomaly;
mod correlation;
mod ring_buffer;
mod stats;
mod trend;

pub use anomaly::Anomaly;
pub use correlation::Correlation;
pub use trend::{Trend, TrendDirection};

use dashmap::DashMap;
use parking_lot::RwLock;
use ring_buffer::RingBuffer;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_RING_CAPACITY: usize = 4096;
const DEFAULT_FLAT_THRESHOLD: f64 = 0.05;
/// Spec §4.11: correlation bucket width is `window / 50`.
const CORRELATION_BUCKET_DIVISOR: i64 = 50;

/// One result row from `correlate_systems`: a pair of systems whose
/// readings for the same metric passed the significance filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemPairCorrelation {
    pub system_a: String,
    pub system_b: String,
    #[serde(flatten)]
    pub correlation: Correlation,
}

/// Per-(metric, system) ring buffers behind a map keyed by the pair.
/// A single producer is assumed per key (the ingestion/query path that
/// owns a given metric+system), so a short-held `RwLock` around each
/// buffer gives readers (trend/anomaly/correlate) a non-blocking
/// snapshot without needing lock-free atomics beyond what `DashMap`
/// itself already provides at the shard level.
pub struct AnalyticsEngine {
    series: DashMap<(String, String), RwLock<RingBuffer>>,
    ring_capacity: usize,
}

impl Default for AnalyticsEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}

impl AnalyticsEngine {
    pub fn new(ring_capacity: usize) -> Self {
        Self { series: DashMap::new(), ring_capacity }
    }

    pub fn record(&self, metric: &str, system_id: &str, timestamp_seconds: i64, value: f64) {
        let key = (metric.to_string(), system_id.to_string());
        let entry = self
            .series
            .entry(key)
            .or_insert_with(|| RwLock::new(RingBuffer::new(self.ring_capacity)));
        entry.write().push(timestamp_seconds, value);
    }

    pub fn snapshot(&self, metric: &str, system_id: &str) -> Vec<(i64, f64)> {
        let key = (metric.to_string(), system_id.to_string());
        match self.series.get(&key) {
            Some(entry) => entry.read().snapshot(),
            None => Vec::new(),
        }
    }

    pub fn trend(&self, metric: &str, system_id: &str, window: Duration) -> Option<Trend> {
        let samples = self.snapshot_within_window(metric, system_id, window);
        trend::compute_trend(&samples, DEFAULT_FLAT_THRESHOLD)
    }

    pub fn detect_anomalies(&self, metric: &str, system_id: &str, threshold_std: f64, window: Duration) -> Vec<Anomaly> {
        let samples = self.snapshot_within_window(metric, system_id, window);
        anomaly::detect_anomalies(&samples, threshold_std)
    }

    /// Restricts a snapshot to the trailing `window` of its own most
    /// recent sample, rather than the whole ring buffer (spec §4.11's
    /// "rolling windows"). A window of zero is treated as "no limit".
    fn snapshot_within_window(&self, metric: &str, system_id: &str, window: Duration) -> Vec<(i64, f64)> {
        let samples = self.snapshot(metric, system_id);
        let window_secs = window.as_secs() as i64;
        if window_secs <= 0 {
            return samples;
        }
        let Some((latest, _)) = samples.last() else { return samples };
        let cutoff = latest - window_secs;
        samples.into_iter().filter(|(timestamp, _)| *timestamp >= cutoff).collect()
    }

    /// Cross-system correlation (spec §4.11/§4.14): every system
    /// tracking `metric` is correlated against every other such
    /// system, bucketed at `window / 50` seconds, and only pairs that
    /// clear the significance filter in `correlation::correlate` are
    /// reported.
    pub fn correlate_systems(&self, metric: &str, window: Duration) -> Vec<SystemPairCorrelation> {
        let window_secs = window.as_secs() as i64;
        let bucket_width_seconds = (window_secs / CORRELATION_BUCKET_DIVISOR).max(1);

        let mut systems: Vec<String> = self
            .series
            .iter()
            .filter(|entry| entry.key().0 == metric)
            .map(|entry| entry.key().1.clone())
            .collect();
        systems.sort();

        let mut results = Vec::new();
        for i in 0..systems.len() {
            for j in (i + 1)..systems.len() {
                let a = self.snapshot(metric, &systems[i]);
                let b = self.snapshot(metric, &systems[j]);
                if let Some(correlation) = correlation::correlate(&a, &b, bucket_width_seconds) {
                    results.push(SystemPairCorrelation {
                        system_a: systems[i].clone(),
                        system_b: systems[j].clone(),
                        correlation,
                    });
                }
            }
        }
        results
    }

    pub fn tracked_series_count(&self) -> usize {
        self.series.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_single_extreme_outlier_is_flagged() {
        let engine = AnalyticsEngine::new(32);
        for i in 0..20 {
            engine.record("latency_ms", "sys-a", i, 5.0);
        }
        engine.record("latency_ms", "sys-a", 20, 95.0);

        let anomalies = engine.detect_anomalies("latency_ms", "sys-a", 2.5, Duration::from_secs(3600));
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].value, 95.0);
    }

    #[test]
    fn unknown_series_has_empty_snapshot_and_no_trend() {
        let engine = AnalyticsEngine::default();
        assert!(engine.snapshot("missing", "sys-a").is_empty());
        assert!(engine.trend("missing", "sys-a", Duration::from_secs(3600)).is_none());
    }

    #[test]
    fn distinct_systems_do_not_share_a_buffer() {
        let engine = AnalyticsEngine::new(16);
        engine.record("cpu", "sys-a", 0, 10.0);
        engine.record("cpu", "sys-b", 0, 90.0);
        assert_eq!(engine.snapshot("cpu", "sys-a"), vec![(0, 10.0)]);
        assert_eq!(engine.snapshot("cpu", "sys-b"), vec![(0, 90.0)]);
        assert_eq!(engine.tracked_series_count(), 2);
    }

    #[test]
    fn correlate_systems_reports_all_pairs_above_threshold() {
        let engine = AnalyticsEngine::new(64);
        for i in 0..20i64 {
            engine.record("qps", "sys-a", i * 60, i as f64);
            engine.record("qps", "sys-b", i * 60, i as f64 * 2.0);
            engine.record("qps", "sys-c", i * 60, if i % 2 == 0 { 1.0 } else { -1.0 });
        }
        let pairs = engine.correlate_systems("qps", Duration::from_secs(3000));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].system_a, "sys-a");
        assert_eq!(pairs[0].system_b, "sys-b");
        assert!(pairs[0].correlation.r > 0.9);
    }

    #[test]
    fn correlate_systems_ignores_other_metrics() {
        let engine = AnalyticsEngine::new(64);
        for i in 0..20i64 {
            engine.record("qps", "sys-a", i * 60, i as f64);
            engine.record("qps", "sys-b", i * 60, i as f64 * 2.0);
            engine.record("cpu", "sys-c", i * 60, i as f64);
        }
        let pairs = engine.correlate_systems("qps", Duration::from_secs(3000));
        assert_eq!(pairs.len(), 1);
        assert!(pairs.iter().all(|p| p.system_a != "sys-c" && p.system_b != "sys-c"));
    }

    #[test]
    fn rising_trend_is_detected_end_to_end() {
        let engine = AnalyticsEngine::new(32);
        for i in 0..10i64 {
            engine.record("error_rate", "sys-a", i, (i * 5) as f64);
        }
        let trend = engine.trend("error_rate", "sys-a", Duration::from_secs(3600)).unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
    }

    #[test]
    fn trend_window_excludes_stale_samples() {
        let engine = AnalyticsEngine::new(64);
        for i in 0..10i64 {
            engine.record("error_rate", "sys-a", i, 100.0);
        }
        for i in 100..110i64 {
            engine.record("error_rate", "sys-a", i, (i * 5) as f64);
        }
        let trend = engine.trend("error_rate", "sys-a", Duration::from_secs(20)).unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
    }
}
