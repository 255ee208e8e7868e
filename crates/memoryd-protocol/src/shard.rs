//! Wire types for shard RPC.
//!
//! A shard can be addressed in-process (the default single-node
//! deployment) or over TCP using these messages (a multi-node
//! deployment, one process per shard range). The two transports carry
//! the same request/response set so `memoryd-query`'s fan-out code
//! doesn't need to know which one it's talking to.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tier-agnostic wire form of a record. Field presence (`embedding`,
/// `content`) varies by which tier produced it; see `spec.md` §3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordWire {
    pub record_id: String,
    pub system_id: String,
    pub content: Option<String>,
    pub ultra_summary: Option<String>,
    pub summary: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub embedding_i8: Option<(Vec<i8>, f32)>,
    pub metadata: BTreeMap<String, String>,
    pub timestamp_unix_ms: i64,
    pub content_hash: [u8; 32],
    pub tier: TierWire,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TierWire {
    Hot,
    Warm,
    Cold,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterWire {
    pub system_id: Option<String>,
    pub metadata_equals: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShardRequest {
    Insert { record: RecordWire },
    Delete { record_id: String },
    Search { embedding: Vec<f32>, k: usize, filter: FilterWire, threshold: f32 },
    Scan { filter: FilterWire, limit: usize },
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShardResponse {
    InsertOk,
    Duplicate,
    DeleteOk { existed: bool },
    SearchOk { matches: Vec<(String, f32)>, degraded: bool },
    ScanOk { records: Vec<RecordWire> },
    StatusOk {
        shard_id: u32,
        hot_count: u64,
        warm_count: u64,
        cold_count: u64,
        degraded: bool,
    },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_wire_defaults_to_unfiltered() {
        let f = FilterWire::default();
        assert!(f.system_id.is_none());
        assert!(f.metadata_equals.is_empty());
    }
}
