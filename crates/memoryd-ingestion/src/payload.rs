use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The decoded form of one `records/{filename}` object referenced by a
/// manifest. `content_hash` is deliberately not trusted from the
/// payload itself — it is always recomputed from `content` so a
/// tampered or stale hash can never desynchronize from the bytes it is
/// supposed to identify.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordPayload {
    pub record_id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub timestamp_unix_ms: i64,
}

pub fn content_hash(content: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.finalize().into()
}
