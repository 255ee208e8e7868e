use crate::cold::ColdStore;
use crate::dedup::Deduplicator;
use crate::hot::{HotStore, HotStoreError};
use crate::record::{Filter, Record};
use crate::warm::WarmStore;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShardStatus {
    pub shard_id: u32,
    pub hot_count: usize,
    pub warm_count: usize,
    pub cold_count: usize,
    pub dedup_index_size: usize,
    pub degraded: bool,
}

/// Everything one shard exclusively owns (spec §3 Ownership): its
/// Hot and Warm stores, Cold archive, and dedup index. The aging
/// scheduler is the only component that moves records between these
/// fields; ingestion and queries only ever touch one tier at a time.
pub struct Shard {
    pub shard_id: u32,
    pub hot: HotStore,
    pub warm: WarmStore,
    pub cold: ColdStore,
    pub dedup: Deduplicator,
}

impl Shard {
    pub fn new(shard_id: u32, embedding_dimension: usize) -> Self {
        Self {
            shard_id,
            hot: HotStore::new(embedding_dimension),
            warm: WarmStore::new(),
            cold: ColdStore::new(),
            dedup: Deduplicator::new(),
        }
    }

    pub fn insert_hot(&self, record: Record) -> Result<(), HotStoreError> {
        self.hot.insert(record)
    }

    pub fn delete(&self, record_id: &str) -> bool {
        self.hot.delete(record_id) || self.warm.delete(record_id)
    }

    /// Hot-first search, falling through to Warm only if more
    /// candidates are needed (spec §4.10 step 2).
    pub fn search(&self, query: &[f32], k: usize, filter: &Filter, threshold: f32) -> (Vec<(String, f32)>, bool) {
        let (mut results, degraded) = self.hot.search(query, k, filter, threshold);
        if results.len() < k {
            let remaining = k - results.len();
            let warm_results = self.warm.search(query, remaining, filter, threshold);
            results.extend(warm_results);
            results.sort_by(|(id_a, score_a), (id_b, score_b)| {
                score_b.partial_cmp(score_a).unwrap_or(std::cmp::Ordering::Equal).then_with(|| id_a.cmp(id_b))
            });
            results.truncate(k);
        }
        (results, degraded)
    }

    pub fn status(&self) -> ShardStatus {
        ShardStatus {
            shard_id: self.shard_id,
            hot_count: self.hot.len(),
            warm_count: self.warm.len(),
            cold_count: self.cold.len(),
            dedup_index_size: self.dedup.len(),
            degraded: self.hot.is_degraded(),
        }
    }
}
