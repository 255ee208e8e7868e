//! Fan-out search coordinator (spec §4.10).

use std::sync::Arc;
use std::time::Duration;

use memoryd_storage::{Filter, Shard, ShardRouter};

use crate::merge::{apply_rerank, merge_top_k, ReRankFn, ScoredRecord};

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub embedding: Vec<f32>,
    pub k: usize,
    pub filter: Filter,
    pub threshold: f32,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub results: Vec<ScoredRecord>,
    pub partial: bool,
    pub shards_queried: Vec<u32>,
    pub shards_failed: Vec<u32>,
}

/// Owns every shard in the deployment plus the router that decides
/// which ones a given query touches.
pub struct QueryCoordinator {
    shards: Vec<Arc<Shard>>,
    router: Arc<ShardRouter>,
    rerank: Option<ReRankFn>,
}

impl QueryCoordinator {
    pub fn new(shards: Vec<Arc<Shard>>, router: Arc<ShardRouter>) -> Self {
        Self { shards, router, rerank: None }
    }

    pub fn with_rerank(mut self, rerank: ReRankFn) -> Self {
        self.rerank = Some(rerank);
        self
    }

    /// `system_id: None` fans out to every shard; `Some(id)` targets
    /// the single shard it hashes to (spec §4.5/§4.10 step 1).
    pub async fn search_all_systems(&self, query: &SearchQuery, system_id: Option<&str>, total_deadline: Duration) -> SearchResult {
        let shard_ids = self.router.route(system_id);
        let shard_deadline = total_deadline.mul_f64(0.8);

        let mut handles = Vec::with_capacity(shard_ids.len());
        for &shard_id in &shard_ids {
            let shard = self.shards[shard_id as usize].clone();
            let query = query.clone();
            handles.push((shard_id, tokio::spawn(run_shard_search(shard, query, shard_deadline))));
        }

        let mut candidates = Vec::new();
        let mut shards_queried = Vec::new();
        let mut shards_failed = Vec::new();
        for (shard_id, handle) in handles {
            match handle.await {
                Ok(Some(shard_results)) => {
                    shards_queried.push(shard_id);
                    candidates.extend(shard_results);
                }
                Ok(None) => {
                    tracing::warn!(shard_id, "shard search exceeded per-shard deadline");
                    shards_failed.push(shard_id);
                }
                Err(join_err) => {
                    tracing::error!(shard_id, "shard search task panicked: {join_err}");
                    shards_failed.push(shard_id);
                }
            }
        }

        let results = apply_rerank(candidates, query.k, self.rerank.as_ref());
        SearchResult { results, partial: !shards_failed.is_empty(), shards_queried, shards_failed }
    }
}

async fn run_shard_search(shard: Arc<Shard>, query: SearchQuery, deadline: Duration) -> Option<Vec<ScoredRecord>> {
    let task = tokio::task::spawn_blocking(move || {
        let (matches, _degraded) = shard.search(&query.embedding, query.k, &query.filter, query.threshold);
        matches
            .into_iter()
            .map(|(record_id, score)| {
                let timestamp_unix_ms = shard
                    .hot
                    .get(&record_id)
                    .or_else(|| shard.warm.get(&record_id))
                    .map(|record| record.timestamp_unix_ms)
                    .unwrap_or(0);
                ScoredRecord { record_id, score, timestamp_unix_ms }
            })
            .collect::<Vec<_>>()
    });

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(results)) => Some(results),
        Ok(Err(_join_err)) => None,
        Err(_elapsed) => None,
    }
}
