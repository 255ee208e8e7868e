use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

/// A vector with its per-vector symmetric INT8 quantization scale
/// (spec §3: "8-bit signed ints + per-vector scale in Warm").
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedVector {
    pub values: Vec<i8>,
    pub scale: f32,
}

/// Canonical, tier-agnostic record identity (spec §3). Fields not
/// meaningful at a given tier are `None` there: `embedding` is full
/// precision only in Hot, quantized in Warm, absent in Cold;
/// `content`/`ultra_summary` narrow as a record ages.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub record_id: String,
    pub system_id: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub ultra_summary: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub embedding_quantized: Option<QuantizedVector>,
    pub metadata: BTreeMap<String, String>,
    pub timestamp_unix_ms: i64,
    pub content_hash: [u8; 32],
    pub minhash_sig: Option<Vec<u64>>,
    pub tier: Tier,
}

impl Record {
    pub fn content_hash_hex(&self) -> String {
        hex::encode(self.content_hash)
    }
}

/// AND of equality predicates over metadata plus an optional
/// `system_id` (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub system_id: Option<String>,
    pub metadata_equals: BTreeMap<String, String>,
}

impl Filter {
    pub fn matches(&self, record: &Record) -> bool {
        if let Some(system_id) = &self.system_id {
            if &record.system_id != system_id {
                return false;
            }
        }
        self.metadata_equals
            .iter()
            .all(|(key, value)| record.metadata.get(key) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        Record {
            record_id: "r1".into(),
            system_id: "sys-a".into(),
            content: Some("hello".into()),
            summary: None,
            ultra_summary: None,
            embedding: Some(vec![1.0, 0.0]),
            embedding_quantized: None,
            metadata: BTreeMap::from([("project_id".to_string(), "p1".to_string())]),
            timestamp_unix_ms: 0,
            content_hash: [0u8; 32],
            minhash_sig: None,
            tier: Tier::Hot,
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(Filter::default().matches(&sample_record()));
    }

    #[test]
    fn system_id_filter_rejects_mismatch() {
        let filter = Filter { system_id: Some("sys-b".into()), ..Default::default() };
        assert!(!filter.matches(&sample_record()));
    }

    #[test]
    fn metadata_filter_requires_all_keys_to_match() {
        let filter = Filter {
            metadata_equals: BTreeMap::from([("project_id".to_string(), "p1".to_string())]),
            ..Default::default()
        };
        assert!(filter.matches(&sample_record()));

        let filter = Filter {
            metadata_equals: BTreeMap::from([("project_id".to_string(), "other".to_string())]),
            ..Default::default()
        };
        assert!(!filter.matches(&sample_record()));
    }
}
