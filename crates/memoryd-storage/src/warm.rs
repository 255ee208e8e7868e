use crate::quantize::dequantize;
use crate::record::{Filter, QuantizedVector, Record, Tier};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WarmStoreError {
    #[error("record {0} already exists in warm store")]
    Duplicate(String),
    #[error("io error persisting warm partition: {0}")]
    Io(#[from] io::Error),
    #[error("failed to decode warm partition: {0}")]
    Decode(#[from] bincode::Error),
}

/// On-disk representation of a Warm record (spec §6: `int8[384]` plus
/// a companion `float32` scale per row).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WarmFileRecord {
    record_id: String,
    system_id: String,
    summary: Option<String>,
    embedding: Vec<i8>,
    scale: f32,
    metadata: BTreeMap<String, String>,
    timestamp_unix_ms: i64,
    content_hash: [u8; 32],
    minhash_sig: Option<Vec<u64>>,
}

impl From<&Record> for WarmFileRecord {
    fn from(record: &Record) -> Self {
        let (embedding, scale) = match &record.embedding_quantized {
            Some(q) => (q.values.clone(), q.scale),
            None => (Vec::new(), 0.0),
        };
        Self {
            record_id: record.record_id.clone(),
            system_id: record.system_id.clone(),
            summary: record.summary.clone(),
            embedding,
            scale,
            metadata: record.metadata.clone(),
            timestamp_unix_ms: record.timestamp_unix_ms,
            content_hash: record.content_hash,
            minhash_sig: record.minhash_sig.clone(),
        }
    }
}

impl From<WarmFileRecord> for Record {
    fn from(file_record: WarmFileRecord) -> Self {
        let embedding_quantized = if file_record.embedding.is_empty() {
            None
        } else {
            Some(QuantizedVector { values: file_record.embedding, scale: file_record.scale })
        };
        Record {
            record_id: file_record.record_id,
            system_id: file_record.system_id,
            content: None,
            summary: file_record.summary,
            ultra_summary: None,
            embedding: None,
            embedding_quantized,
            metadata: file_record.metadata,
            timestamp_unix_ms: file_record.timestamp_unix_ms,
            content_hash: file_record.content_hash,
            minhash_sig: file_record.minhash_sig,
            tier: Tier::Warm,
        }
    }
}

pub fn day_partition_key(timestamp_unix_ms: i64) -> String {
    let datetime: DateTime<Utc> = DateTime::from_timestamp_millis(timestamp_unix_ms).unwrap_or_else(Utc::now);
    datetime.format("%Y-%m-%d").to_string()
}

/// Day-partitioned on-disk store of INT8-quantized vectors (spec
/// §4.3). Partitioning by `timestamp` day allows the aging scheduler
/// and operators to prune whole files once `warm_ttl` passes without
/// touching unrelated days.
pub struct WarmStore {
    base_path: Option<PathBuf>,
    partitions: RwLock<HashMap<String, HashMap<String, Record>>>,
}

impl WarmStore {
    pub fn new() -> Self {
        Self { base_path: None, partitions: RwLock::new(HashMap::new()) }
    }

    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: Some(base_path.into()), partitions: RwLock::new(HashMap::new()) }
    }

    pub fn insert(&self, record: Record) -> Result<(), WarmStoreError> {
        let day = day_partition_key(record.timestamp_unix_ms);
        let mut partitions = self.partitions.write();
        let partition = partitions.entry(day).or_default();
        if partition.contains_key(&record.record_id) {
            return Err(WarmStoreError::Duplicate(record.record_id));
        }
        partition.insert(record.record_id.clone(), record);
        Ok(())
    }

    pub fn delete(&self, record_id: &str) -> bool {
        let mut partitions = self.partitions.write();
        for partition in partitions.values_mut() {
            if partition.remove(record_id).is_some() {
                return true;
            }
        }
        false
    }

    pub fn contains(&self, record_id: &str) -> bool {
        self.partitions.read().values().any(|partition| partition.contains_key(record_id))
    }

    pub fn get(&self, record_id: &str) -> Option<Record> {
        self.partitions.read().values().find_map(|partition| partition.get(record_id).cloned())
    }

    /// Brute-force search with lazy dequantization (spec §4.3:
    /// "threshold comparisons apply after dequantization").
    pub fn search(&self, query: &[f32], k: usize, filter: &Filter, threshold: f32) -> Vec<(String, f32)> {
        let partitions = self.partitions.read();
        let mut out: Vec<(String, f32)> = partitions
            .values()
            .flat_map(|partition| partition.values())
            .filter(|record| filter.matches(record))
            .filter_map(|record| {
                let quantized = record.embedding_quantized.as_ref()?;
                let dequantized = dequantize(quantized);
                let similarity = cosine_similarity(query, &dequantized);
                if similarity >= threshold {
                    Some((record.record_id.clone(), similarity))
                } else {
                    None
                }
            })
            .collect();
        out.sort_by(|(id_a, score_a), (id_b, score_b)| {
            score_b.partial_cmp(score_a).unwrap_or(std::cmp::Ordering::Equal).then_with(|| id_a.cmp(id_b))
        });
        out.truncate(k);
        out
    }

    pub fn scan(&self, filter: &Filter, limit: usize) -> Vec<Record> {
        self.partitions
            .read()
            .values()
            .flat_map(|partition| partition.values())
            .filter(|record| filter.matches(record))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.partitions.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes a day partition to `{base}/{day}.dat`, closing the file
    /// before renaming it into place so readers never observe a
    /// partially-written partition.
    pub fn persist_day(&self, day: &str) -> Result<(), WarmStoreError> {
        let Some(base_path) = &self.base_path else { return Ok(()) };
        let partitions = self.partitions.read();
        let Some(partition) = partitions.get(day) else { return Ok(()) };

        std::fs::create_dir_all(base_path)?;
        let file_records: Vec<WarmFileRecord> = partition.values().map(WarmFileRecord::from).collect();
        let encoded = bincode::serialize(&file_records)?;

        let final_path = base_path.join(format!("{day}.dat"));
        let tmp_path = base_path.join(format!("{day}.dat.tmp"));
        std::fs::write(&tmp_path, encoded)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    pub fn load_day(&self, day: &str) -> Result<(), WarmStoreError> {
        let Some(base_path) = &self.base_path else { return Ok(()) };
        let path = day_file_path(base_path, day);
        if !path.exists() {
            return Ok(());
        }
        let bytes = std::fs::read(path)?;
        let file_records: Vec<WarmFileRecord> = bincode::deserialize(&bytes)?;
        let mut partitions = self.partitions.write();
        let partition = partitions.entry(day.to_string()).or_default();
        for file_record in file_records {
            let record: Record = file_record.into();
            partition.insert(record.record_id.clone(), record);
        }
        Ok(())
    }
}

impl Default for WarmStore {
    fn default() -> Self {
        Self::new()
    }
}

fn day_file_path(base_path: &Path, day: &str) -> PathBuf {
    base_path.join(format!("{day}.dat"))
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::quantize_int8;

    fn sample_record(record_id: &str, timestamp_unix_ms: i64, embedding: &[f32]) -> Record {
        Record {
            record_id: record_id.to_string(),
            system_id: "sys-a".to_string(),
            content: None,
            summary: Some("a summary".to_string()),
            ultra_summary: None,
            embedding: None,
            embedding_quantized: Some(quantize_int8(embedding)),
            metadata: Default::default(),
            timestamp_unix_ms,
            content_hash: [0u8; 32],
            minhash_sig: None,
            tier: Tier::Warm,
        }
    }

    #[test]
    fn records_are_partitioned_by_day() {
        let store = WarmStore::new();
        let day_one_ms = 0;
        let day_two_ms = 2 * 24 * 60 * 60 * 1000;
        store.insert(sample_record("r1", day_one_ms, &[1.0, 0.0])).unwrap();
        store.insert(sample_record("r2", day_two_ms, &[0.0, 1.0])).unwrap();
        assert_eq!(store.len(), 2);
        assert_ne!(day_partition_key(day_one_ms), day_partition_key(day_two_ms));
    }

    #[test]
    fn search_dequantizes_before_thresholding() {
        let store = WarmStore::new();
        store.insert(sample_record("r1", 0, &[1.0, 0.0])).unwrap();
        let results = store.search(&[1.0, 0.0], 5, &Filter::default(), 0.9);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "r1");
    }

    #[test]
    fn get_finds_a_record_in_any_partition() {
        let store = WarmStore::new();
        store.insert(sample_record("r1", 0, &[1.0, 0.0])).unwrap();
        assert_eq!(store.get("r1").unwrap().record_id, "r1");
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn persist_and_load_round_trips_a_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = WarmStore::with_base_path(dir.path());
        store.insert(sample_record("r1", 0, &[1.0, 0.0])).unwrap();
        let day = day_partition_key(0);
        store.persist_day(&day).unwrap();

        let reloaded = WarmStore::with_base_path(dir.path());
        reloaded.load_day(&day).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains("r1"));
    }

    #[test]
    fn duplicate_insert_within_same_day_is_rejected() {
        let store = WarmStore::new();
        store.insert(sample_record("r1", 0, &[1.0, 0.0])).unwrap();
        assert!(store.insert(sample_record("r1", 0, &[1.0, 0.0])).is_err());
    }
}
