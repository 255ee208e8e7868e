use crate::stats;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub bucket_count: usize,
}

const MIN_BUCKETS: usize = 10;
const MIN_ABS_R: f64 = 0.5;
const MAX_P_VALUE: f64 = 0.05;

/// Buckets two raw sample series into fixed-width time buckets
/// (averaging samples that land in the same bucket), then reports a
/// Pearson correlation only over buckets populated in *both* series.
/// Returns `None` when fewer than `MIN_BUCKETS` common buckets exist,
/// or when the resulting correlation fails the significance filter
/// (`|r| >= 0.5` and `p < 0.05`) — a weak or statistically
/// unconvincing correlation is not reported at all, per the
/// cross-system correlation endpoint's contract.
pub fn correlate(a: &[(i64, f64)], b: &[(i64, f64)], bucket_width_seconds: i64) -> Option<Correlation> {
    if bucket_width_seconds <= 0 {
        return None;
    }
    let bucketed_a = bucket_average(a, bucket_width_seconds);
    let bucketed_b = bucket_average(b, bucket_width_seconds);

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (bucket, a_value) in &bucketed_a {
        if let Some(b_value) = bucketed_b.get(bucket) {
            xs.push(*a_value);
            ys.push(*b_value);
        }
    }
    if xs.len() < MIN_BUCKETS {
        return None;
    }

    let r = stats::pearson_r(&xs, &ys)?;
    let p_value = stats::t_test_two_tailed_p(r, xs.len())?;
    if r.abs() < MIN_ABS_R || p_value >= MAX_P_VALUE {
        return None;
    }
    Some(Correlation { r, p_value, bucket_count: xs.len() })
}

fn bucket_average(samples: &[(i64, f64)], bucket_width_seconds: i64) -> BTreeMap<i64, f64> {
    let mut sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for (timestamp, value) in samples {
        let bucket = timestamp.div_euclid(bucket_width_seconds);
        let entry = sums.entry(bucket).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    sums.into_iter().map(|(bucket, (sum, count))| (bucket, sum / count as f64)).collect()
}
