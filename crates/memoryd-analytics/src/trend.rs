use crate::stats;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub direction: TrendDirection,
    pub slope: f64,
    pub r_squared: f64,
}

/// Fits a least-squares line over `samples` (already chronological) and
/// classifies the direction. A fit is `Stable` when the slope is
/// negligible relative to the series' own scale (normalized slope
/// below `flat_threshold`), since a raw slope near zero on a
/// small-magnitude series is not meaningfully different from one on a
/// large-magnitude series.
pub fn compute_trend(samples: &[(i64, f64)], flat_threshold: f64) -> Option<Trend> {
    if samples.len() < 2 {
        return None;
    }
    let points: Vec<(f64, f64)> = samples.iter().map(|(t, v)| (*t as f64, *v)).collect();
    let (slope, _intercept, r_squared) = stats::linear_regression(&points)?;

    let values: Vec<f64> = samples.iter().map(|(_, v)| *v).collect();
    let scale = stats::mean(&values).abs().max(1.0);
    let span = (points.last().unwrap().0 - points.first().unwrap().0).max(1.0);
    let normalized_slope = (slope * span / scale).abs();

    let direction = if normalized_slope < flat_threshold {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    Some(Trend { direction, slope, r_squared })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_series_is_stable() {
        let samples: Vec<(i64, f64)> = (0..10).map(|i| (i, 100.0)).collect();
        let trend = compute_trend(&samples, 0.05).unwrap();
        assert_eq!(trend.direction, TrendDirection::Stable);
    }

    #[test]
    fn rising_series_is_increasing() {
        let samples: Vec<(i64, f64)> = (0..10).map(|i| (i, (i * 10) as f64)).collect();
        let trend = compute_trend(&samples, 0.05).unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
    }

    #[test]
    fn falling_series_is_decreasing() {
        let samples: Vec<(i64, f64)> = (0..10).map(|i| (i, (100 - i * 10) as f64)).collect();
        let trend = compute_trend(&samples, 0.05).unwrap();
        assert_eq!(trend.direction, TrendDirection::Decreasing);
    }

    #[test]
    fn single_sample_has_no_trend() {
        assert!(compute_trend(&[(0, 1.0)], 0.05).is_none());
    }
}
