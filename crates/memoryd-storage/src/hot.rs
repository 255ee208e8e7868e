use crate::indexer::VectorIndexer;
use crate::record::{Filter, Record, Tier};
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HotStoreError {
    #[error("record {0} already exists in hot store")]
    Duplicate(String),
}

/// One shard's in-memory, full-precision store (spec §4.2). Records
/// and their vector index are single-writer (ingestion worker or
/// aging pass); readers take a point-in-time clone via `scan`/`keys`.
pub struct HotStore {
    records: RwLock<HashMap<String, Record>>,
    indexer: VectorIndexer,
}

impl HotStore {
    pub fn new(embedding_dimension: usize) -> Self {
        Self { records: RwLock::new(HashMap::new()), indexer: VectorIndexer::new(embedding_dimension) }
    }

    pub fn insert(&self, record: Record) -> Result<(), HotStoreError> {
        let mut guard = self.records.write();
        if guard.contains_key(&record.record_id) {
            return Err(HotStoreError::Duplicate(record.record_id));
        }
        if let Some(embedding) = &record.embedding {
            self.indexer.insert(&record.record_id, embedding.clone());
        }
        guard.insert(record.record_id.clone(), record);
        Ok(())
    }

    /// Returns whether a record with `record_id` existed and was
    /// removed.
    pub fn delete(&self, record_id: &str) -> bool {
        let removed = self.records.write().remove(record_id).is_some();
        if removed {
            self.indexer.remove(record_id);
        }
        removed
    }

    pub fn get(&self, record_id: &str) -> Option<Record> {
        self.records.read().get(record_id).cloned()
    }

    pub fn search(&self, query: &[f32], k: usize, filter: &Filter, threshold: f32) -> (Vec<(String, f32)>, bool) {
        let records = self.records.read();
        let accept = |record_id: &str| records.get(record_id).map(|r| filter.matches(r)).unwrap_or(false);
        let results = self.indexer.search(query, k, threshold, accept);
        (results, self.indexer.is_degraded())
    }

    /// Used by the aging scheduler: a snapshot of matching records at
    /// the moment of the call (spec §4.6: aging reads a snapshot of
    /// Hot at the start of a batch).
    pub fn scan(&self, filter: &Filter, limit: usize) -> Vec<Record> {
        self.records
            .read()
            .values()
            .filter(|record| filter.matches(record))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_degraded(&self) -> bool {
        self.indexer.is_degraded()
    }
}

pub fn make_hot_record(
    record_id: impl Into<String>,
    system_id: impl Into<String>,
    content: impl Into<String>,
    embedding: Vec<f32>,
    timestamp_unix_ms: i64,
    content_hash: [u8; 32],
) -> Record {
    Record {
        record_id: record_id.into(),
        system_id: system_id.into(),
        content: Some(content.into()),
        summary: None,
        ultra_summary: None,
        embedding: Some(embedding),
        embedding_quantized: None,
        metadata: Default::default(),
        timestamp_unix_ms,
        content_hash,
        minhash_sig: None,
        tier: Tier::Hot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserting_same_id_twice_is_rejected() {
        let store = HotStore::new(2);
        let record = make_hot_record("r1", "sys-a", "hello", vec![1.0, 0.0], 0, [0u8; 32]);
        store.insert(record.clone()).unwrap();
        assert_eq!(store.insert(record), Err(HotStoreError::Duplicate("r1".to_string())));
    }

    #[test]
    fn delete_reports_existence() {
        let store = HotStore::new(2);
        store.insert(make_hot_record("r1", "sys-a", "hello", vec![1.0, 0.0], 0, [0u8; 32])).unwrap();
        assert!(store.delete("r1"));
        assert!(!store.delete("r1"));
    }

    #[test]
    fn search_respects_system_id_filter() {
        let store = HotStore::new(2);
        store.insert(make_hot_record("r1", "sys-a", "hello", vec![1.0, 0.0], 0, [0u8; 32])).unwrap();
        store.insert(make_hot_record("r2", "sys-b", "hello", vec![1.0, 0.0], 0, [0u8; 32])).unwrap();

        let filter = Filter { system_id: Some("sys-a".to_string()), ..Default::default() };
        let (results, degraded) = store.search(&[1.0, 0.0], 10, &filter, 0.0);
        assert!(!degraded);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "r1");
    }

    #[test]
    fn scan_returns_matching_snapshot() {
        let store = HotStore::new(2);
        store.insert(make_hot_record("r1", "sys-a", "hello", vec![1.0, 0.0], 0, [0u8; 32])).unwrap();
        let all = store.scan(&Filter::default(), 10);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].record_id, "r1");
    }
}
