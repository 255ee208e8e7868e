use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ColdStoreError {
    #[error("io error writing cold archive: {0}")]
    Io(#[from] io::Error),
    #[error("failed to decode cold archive: {0}")]
    Decode(#[from] bincode::Error),
}

/// A Cold-tier row: no vectors, no full content (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColdRow {
    pub record_id: String,
    pub system_id: String,
    pub ultra_summary: String,
    pub fingerprint: [u8; 16],
    pub timestamp_unix_ms: i64,
}

pub fn year_month_key(timestamp_unix_ms: i64, shard_id: u32) -> String {
    let datetime: DateTime<Utc> = DateTime::from_timestamp_millis(timestamp_unix_ms).unwrap_or_else(Utc::now);
    format!("{}-shard-{}", datetime.format("%Y-%m"), shard_id)
}

/// Append-only columnar archive, one logical file per `(year, month,
/// shard)` (spec §4.4). `append_batch` is the only mutator; files
/// become visible to `scan` only after being closed and renamed into
/// place, so concurrent readers never observe a partial write.
pub struct ColdStore {
    base_path: Option<PathBuf>,
    files: RwLock<HashMap<String, Vec<ColdRow>>>,
}

impl ColdStore {
    pub fn new() -> Self {
        Self { base_path: None, files: RwLock::new(HashMap::new()) }
    }

    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: Some(base_path.into()), files: RwLock::new(HashMap::new()) }
    }

    pub fn append_batch(&self, file_key: &str, rows: Vec<ColdRow>) -> Result<(), ColdStoreError> {
        {
            let mut files = self.files.write();
            files.entry(file_key.to_string()).or_default().extend(rows);
        }
        self.publish(file_key)
    }

    fn publish(&self, file_key: &str) -> Result<(), ColdStoreError> {
        let Some(base_path) = &self.base_path else { return Ok(()) };
        let files = self.files.read();
        let Some(rows) = files.get(file_key) else { return Ok(()) };

        std::fs::create_dir_all(base_path)?;
        let encoded = bincode::serialize(rows)?;
        let tmp_path = base_path.join(format!("{file_key}.dat.tmp"));
        let final_path = base_path.join(format!("{file_key}.dat"));
        std::fs::write(&tmp_path, encoded)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    pub fn scan(&self, predicate: impl Fn(&ColdRow) -> bool, limit: usize) -> Vec<ColdRow> {
        self.files
            .read()
            .values()
            .flatten()
            .filter(|row| predicate(row))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.files.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ColdStore {
    fn default() -> Self {
        Self::new()
    }
}
