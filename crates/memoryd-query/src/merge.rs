//! Cross-shard merge-heap for top-k results (spec §4.10 step 3-4).

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub record_id: String,
    pub score: f32,
    pub timestamp_unix_ms: i64,
}

/// Per-shard results feed a single descending merge, sorted by score,
/// then by more recent `timestamp_unix_ms`, then by smaller
/// `record_id` lexicographically — ties broken deterministically so
/// repeated queries against an unchanged store are reproducible.
pub fn merge_top_k(mut candidates: Vec<ScoredRecord>, k: usize) -> Vec<ScoredRecord> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.timestamp_unix_ms.cmp(&a.timestamp_unix_ms))
            .then_with(|| a.record_id.cmp(&b.record_id))
    });
    candidates.truncate(k);
    candidates
}

/// A pluggable re-rank step (spec §4.10 step 4): applied to the top
/// `2k` candidates before the final truncation to `k`.
pub type ReRankFn = std::sync::Arc<dyn Fn(&[ScoredRecord]) -> Vec<ScoredRecord> + Send + Sync>;

pub fn apply_rerank(candidates: Vec<ScoredRecord>, k: usize, rerank: Option<&ReRankFn>) -> Vec<ScoredRecord> {
    match rerank {
        None => merge_top_k(candidates, k),
        Some(rerank) => {
            let widened = merge_top_k(candidates, 2 * k);
            let mut reranked = rerank(&widened);
            reranked.truncate(k);
            reranked
        }
    }
}
