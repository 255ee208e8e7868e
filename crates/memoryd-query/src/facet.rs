//! Faceted aggregation: additive sum/count reduction across shards,
//! not top-k (spec §4.10 closing paragraph).

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use memoryd_storage::{Filter, Shard};

#[derive(Debug, Clone)]
pub struct FacetQuery {
    pub group_by: String,
    pub filter: Filter,
    pub sum_field: Option<String>,
    pub scan_limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacetBucket {
    pub value: String,
    pub count: u64,
    pub sum: f64,
}

#[derive(Debug, Clone)]
pub struct FacetResult {
    pub buckets: Vec<FacetBucket>,
    pub shards_queried: Vec<u32>,
    pub shards_failed: Vec<u32>,
    pub partial: bool,
}

#[derive(Default, Clone, Copy)]
struct Accumulator {
    count: u64,
    sum: f64,
}

/// Fans out a facet query to every shard, scanning both Hot and Warm
/// (Cold is excluded: archived rows no longer carry live metadata
/// suitable for grouping). Per-shard results are reduced with a plain
/// additive merge rather than a merge-heap, since a facet count has no
/// notion of "top" candidates to discard.
pub async fn run_facet_query(shards: &[Arc<Shard>], query: &FacetQuery, per_shard_deadline: Duration) -> FacetResult {
    let mut handles = Vec::with_capacity(shards.len());
    for shard in shards {
        let shard = shard.clone();
        let query = query.clone();
        handles.push((shard.shard_id, tokio::spawn(run_shard_facet(shard, query, per_shard_deadline))));
    }

    let mut totals: BTreeMap<String, Accumulator> = BTreeMap::new();
    let mut shards_queried = Vec::new();
    let mut shards_failed = Vec::new();
    for (shard_id, handle) in handles {
        match handle.await {
            Ok(Some(partial)) => {
                shards_queried.push(shard_id);
                for (value, accumulator) in partial {
                    let entry = totals.entry(value).or_default();
                    entry.count += accumulator.count;
                    entry.sum += accumulator.sum;
                }
            }
            Ok(None) => {
                tracing::warn!(shard_id, "facet scan exceeded per-shard deadline");
                shards_failed.push(shard_id);
            }
            Err(join_err) => {
                tracing::error!(shard_id, "facet scan task panicked: {join_err}");
                shards_failed.push(shard_id);
            }
        }
    }

    let buckets = totals
        .into_iter()
        .map(|(value, accumulator)| FacetBucket { value, count: accumulator.count, sum: accumulator.sum })
        .collect();
    FacetResult { buckets, partial: !shards_failed.is_empty(), shards_queried, shards_failed }
}

async fn run_shard_facet(shard: Arc<Shard>, query: FacetQuery, deadline: Duration) -> Option<BTreeMap<String, Accumulator>> {
    let task = tokio::task::spawn_blocking(move || {
        let mut totals: BTreeMap<String, Accumulator> = BTreeMap::new();
        let records = shard
            .hot
            .scan(&query.filter, query.scan_limit)
            .into_iter()
            .chain(shard.warm.scan(&query.filter, query.scan_limit));
        for record in records {
            let Some(group_value) = record.metadata.get(&query.group_by) else { continue };
            let entry = totals.entry(group_value.clone()).or_default();
            entry.count += 1;
            if let Some(sum_field) = &query.sum_field {
                if let Some(numeric) = record.metadata.get(sum_field).and_then(|v| v.parse::<f64>().ok()) {
                    entry.sum += numeric;
                }
            }
        }
        totals
    });

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(totals)) => Some(totals),
        Ok(Err(_join_err)) => None,
        Err(_elapsed) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoryd_storage::make_hot_record;
    use std::collections::BTreeMap as RecordMetadata;

    fn record_with_metadata(id: &str, project: &str, amount: &str) -> memoryd_storage::Record {
        let mut record = make_hot_record(id, "sys-a", "hello", vec![1.0, 0.0], 0, [0u8; 32]);
        let mut metadata: RecordMetadata<String, String> = RecordMetadata::new();
        metadata.insert("project_id".to_string(), project.to_string());
        metadata.insert("amount".to_string(), amount.to_string());
        record.metadata = metadata;
        record
    }

    #[tokio::test]
    async fn buckets_by_metadata_key_with_count_and_sum() {
        let shard = Arc::new(Shard::new(0, 2));
        shard.insert_hot(record_with_metadata("r1", "p1", "10")).unwrap();
        shard.insert_hot(record_with_metadata("r2", "p1", "5")).unwrap();
        shard.insert_hot(record_with_metadata("r3", "p2", "3")).unwrap();

        let query = FacetQuery {
            group_by: "project_id".to_string(),
            filter: Filter::default(),
            sum_field: Some("amount".to_string()),
            scan_limit: 1000,
        };
        let result = run_facet_query(&[shard], &query, Duration::from_secs(5)).await;

        assert!(!result.partial);
        let p1 = result.buckets.iter().find(|b| b.value == "p1").unwrap();
        assert_eq!(p1.count, 2);
        assert_eq!(p1.sum, 15.0);
        let p2 = result.buckets.iter().find(|b| b.value == "p2").unwrap();
        assert_eq!(p2.count, 1);
        assert_eq!(p2.sum, 3.0);
    }

    #[tokio::test]
    async fn results_reduce_additively_across_shards() {
        let shard_a = Arc::new(Shard::new(0, 2));
        let shard_b = Arc::new(Shard::new(1, 2));
        shard_a.insert_hot(record_with_metadata("r1", "p1", "10")).unwrap();
        shard_b.insert_hot(record_with_metadata("r2", "p1", "20")).unwrap();

        let query = FacetQuery {
            group_by: "project_id".to_string(),
            filter: Filter::default(),
            sum_field: Some("amount".to_string()),
            scan_limit: 1000,
        };
        let result = run_facet_query(&[shard_a, shard_b], &query, Duration::from_secs(5)).await;

        assert_eq!(result.shards_queried.len(), 2);
        let p1 = result.buckets.iter().find(|b| b.value == "p1").unwrap();
        assert_eq!(p1.count, 2);
        assert_eq!(p1.sum, 30.0);
    }

    #[tokio::test]
    async fn records_missing_the_group_by_key_are_skipped() {
        let shard = Arc::new(Shard::new(0, 2));
        shard.insert_hot(make_hot_record("r1", "sys-a", "hello", vec![1.0, 0.0], 0, [0u8; 32])).unwrap();

        let query = FacetQuery {
            group_by: "project_id".to_string(),
            filter: Filter::default(),
            sum_field: None,
            scan_limit: 1000,
        };
        let result = run_facet_query(&[shard], &query, Duration::from_secs(5)).await;
        assert!(result.buckets.is_empty());
    }
}
