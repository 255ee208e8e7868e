use crate::minhash::estimated_jaccard;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

const BAND_SIZE: usize = 8;
const NEAR_DUPLICATE_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BandKey {
    band: usize,
    hash: u64,
}

/// Per-shard exact + near-duplicate detector (spec §4.8). Exact dedup
/// is a `content_hash` set; near-duplicate detection buckets MinHash
/// signatures into LSH bands of `BAND_SIZE` hashes apiece so candidate
/// lookup stays O(bands) instead of O(n), then confirms with an
/// estimated-Jaccard check tuned for ~0.8 similarity.
pub struct Deduplicator {
    inner: RwLock<Inner>,
}

struct Inner {
    exact: HashSet<[u8; 32]>,
    bands: HashMap<BandKey, Vec<String>>,
    signatures: HashMap<String, Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DedupOutcome {
    /// Exact content_hash already present; caller should skip the
    /// upload entirely.
    ExactDuplicate,
    /// Not an exact duplicate, but close enough to an existing record
    /// to be linked instead of stored as a new semantic item.
    NearDuplicate { of_record_id: String },
    New,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Deduplicator {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner { exact: HashSet::new(), bands: HashMap::new(), signatures: HashMap::new() }) }
    }

    /// Checks and (if not an exact duplicate) registers `content_hash`
    /// and `minhash_sig` under `record_id` in one pass, since the
    /// ingestion path always wants to act on the result and update the
    /// index atomically.
    pub fn check_and_register(&self, record_id: &str, content_hash: [u8; 32], minhash_sig: &[u64]) -> DedupOutcome {
        let mut guard = self.inner.write();
        if guard.exact.contains(&content_hash) {
            return DedupOutcome::ExactDuplicate;
        }

        let mut best: Option<(String, f64)> = None;
        for band in 0..(minhash_sig.len() / BAND_SIZE) {
            let key = band_key(band, &minhash_sig[band * BAND_SIZE..(band + 1) * BAND_SIZE]);
            if let Some(candidates) = guard.bands.get(&key) {
                for candidate in candidates {
                    if let Some(candidate_sig) = guard.signatures.get(candidate) {
                        let similarity = estimated_jaccard(minhash_sig, candidate_sig);
                        if similarity >= NEAR_DUPLICATE_THRESHOLD
                            && best.as_ref().map(|(_, s)| similarity > *s).unwrap_or(true)
                        {
                            best = Some((candidate.clone(), similarity));
                        }
                    }
                }
            }
        }

        guard.exact.insert(content_hash);
        guard.signatures.insert(record_id.to_string(), minhash_sig.to_vec());
        for band in 0..(minhash_sig.len() / BAND_SIZE) {
            let key = band_key(band, &minhash_sig[band * BAND_SIZE..(band + 1) * BAND_SIZE]);
            guard.bands.entry(key).or_default().push(record_id.to_string());
        }

        match best {
            Some((of_record_id, _)) => DedupOutcome::NearDuplicate { of_record_id },
            None => DedupOutcome::New,
        }
    }

    pub fn contains_exact(&self, content_hash: &[u8; 32]) -> bool {
        self.inner.read().exact.contains(content_hash)
    }

    pub fn len(&self) -> usize {
        self.inner.read().exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn band_key(band: usize, slice: &[u64]) -> BandKey {
    let mut hash = 0xcbf29ce484222325u64;
    for value in slice {
        hash ^= value;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    BandKey { band, hash }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minhash::minhash_signature;

    #[test]
    fn exact_duplicate_is_detected_on_second_insert() {
        let dedup = Deduplicator::new();
        let hash = [7u8; 32];
        let sig = minhash_signature("hello world");
        assert_eq!(dedup.check_and_register("r1", hash, &sig), DedupOutcome::New);
        assert_eq!(dedup.check_and_register("r2", hash, &sig), DedupOutcome::ExactDuplicate);
    }

    #[test]
    fn near_duplicate_text_links_to_earlier_record() {
        let dedup = Deduplicator::new();
        let sig_a = minhash_signature("the quick brown fox jumps over the lazy dog");
        let sig_b = minhash_signature("the quick brown fox jumps over the lazy cat");
        dedup.check_and_register("r1", [1u8; 32], &sig_a);
        let outcome = dedup.check_and_register("r2", [2u8; 32], &sig_b);
        assert_eq!(outcome, DedupOutcome::NearDuplicate { of_record_id: "r1".to_string() });
    }

    #[test]
    fn unrelated_text_is_new() {
        let dedup = Deduplicator::new();
        let sig_a = minhash_signature("the quick brown fox jumps over the lazy dog");
        let sig_b = minhash_signature("quantum entanglement defies classical locality");
        dedup.check_and_register("r1", [1u8; 32], &sig_a);
        assert_eq!(dedup.check_and_register("r2", [2u8; 32], &sig_b), DedupOutcome::New);
    }
}
