use crate::stats;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Anomaly {
    pub index: usize,
    pub timestamp_seconds: i64,
    pub value: f64,
    pub z_score: f64,
}

/// Flags every sample whose z-score against the series' own mean and
/// population stddev exceeds `threshold_std`. A zero-variance series
/// (every sample identical) has no defined z-score and is reported as
/// anomaly-free rather than flagging every sample.
pub fn detect_anomalies(samples: &[(i64, f64)], threshold_std: f64) -> Vec<Anomaly> {
    if samples.len() < 2 {
        return Vec::new();
    }
    let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
    let mean = stats::mean(&values);
    let std_dev = stats::population_std_dev(&values, mean);
    if std_dev == 0.0 {
        return Vec::new();
    }

    samples
        .iter()
        .enumerate()
        .filter_map(|(index, (timestamp_seconds, value))| {
            let z_score = (value - mean) / std_dev;
            if z_score.abs() > threshold_std {
                Some(Anomaly { index, timestamp_seconds: *timestamp_seconds, value: *value, z_score })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_extreme_outlier_is_flagged() {
        let mut samples: Vec<(i64, f64)> = (0..20).map(|i| (i, 5.0)).collect();
        samples.push((20, 95.0));
        let anomalies = detect_anomalies(&samples, 2.5);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].index, 20);
        assert_eq!(anomalies[0].value, 95.0);
    }

    #[test]
    fn constant_series_has_no_anomalies() {
        let samples: Vec<(i64, f64)> = (0..10).map(|i| (i, 42.0)).collect();
        assert!(detect_anomalies(&samples, 2.5).is_empty());
    }

    #[test]
    fn single_sample_has_no_anomalies() {
        assert!(detect_anomalies(&[(0, 1.0)], 2.5).is_empty());
    }

    #[test]
    fn high_threshold_suppresses_mild_deviation() {
        let mut samples: Vec<(i64, f64)> = (0..20).map(|i| (i, 5.0)).collect();
        samples.push((20, 7.0));
        assert!(detect_anomalies(&samples, 2.5).is_empty());
    }
}
