use crate::cold::{year_month_key, ColdRow};
use crate::minhash::minhash_signature;
use crate::quantize::quantize_int8;
use crate::record::{Filter, Tier};
use crate::shard::Shard;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct AgingConfig {
    pub hot_ttl: Duration,
    pub warm_ttl: Duration,
    pub batch_size: usize,
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self { hot_ttl: Duration::from_secs(7 * 24 * 3600), warm_ttl: Duration::from_secs(90 * 24 * 3600), batch_size: DEFAULT_BATCH_SIZE }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AgingReport {
    pub hot_to_warm_migrated: usize,
    pub warm_to_cold_migrated: usize,
}

/// Ensures at most one aging pass runs per shard at a time (spec
/// §4.6 "Concurrency"). A failed `try_acquire` means another pass
/// already holds the lease.
#[derive(Default)]
pub struct AgingLease {
    held: AtomicBool,
}

pub struct AgingGuard<'a> {
    lease: &'a AgingLease,
}

impl Drop for AgingGuard<'_> {
    fn drop(&mut self) {
        self.lease.held.store(false, Ordering::Release);
    }
}

impl AgingLease {
    pub fn try_acquire(&self) -> Option<AgingGuard<'_>> {
        if self.held.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            Some(AgingGuard { lease: self })
        } else {
            None
        }
    }
}

/// Three-sentence extractive summary: the input's first three
/// sentence-terminated spans (spec §4.6 Hot->Warm transform).
pub fn extractive_summary(content: &str, sentence_count: usize) -> String {
    let sentences: Vec<&str> = content
        .split_terminator(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    sentences
        .into_iter()
        .take(sentence_count)
        .collect::<Vec<_>>()
        .join(". ")
        + if content.trim().is_empty() { "" } else { "." }
}

/// Collapses an already-summarized string to its first sentence
/// (spec §4.6 Warm->Cold transform).
pub fn single_sentence_summary(summary: &str) -> String {
    extractive_summary(summary, 1)
}

fn fingerprint_of(text: &str) -> [u8; 16] {
    let signature = minhash_signature(text);
    let mut fingerprint = [0u8; 16];
    for (chunk, word) in fingerprint.chunks_mut(8).zip(signature.iter().take(2)) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    fingerprint
}

fn now_unix_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

/// Runs one aging pass over `shard`: Hot->Warm for records older than
/// `hot_ttl`, then Warm->Cold for records older than `warm_ttl` (spec
/// §4.6). `cancel` is polled between batches only — an in-progress
/// batch always finishes (spec §4.6 Cancellation).
pub fn run_aging_pass(shard: &Arc<Shard>, config: &AgingConfig, lease: &AgingLease, cancel: &AtomicBool) -> Option<AgingReport> {
    let _guard = lease.try_acquire()?;
    let mut report = AgingReport::default();

    let now_ms = now_unix_ms();
    let hot_cutoff_ms = now_ms - config.hot_ttl.as_millis() as i64;

    loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let filter = Filter::default();
        let candidates: Vec<_> = shard
            .hot
            .scan(&filter, usize::MAX)
            .into_iter()
            .filter(|record| record.timestamp_unix_ms < hot_cutoff_ms)
            .take(config.batch_size)
            .collect();
        if candidates.is_empty() {
            break;
        }

        let transformed: Vec<_> = candidates
            .par_iter()
            .map(|record| {
                let mut warm_record = record.clone();
                warm_record.tier = Tier::Warm;
                if let Some(embedding) = &record.embedding {
                    warm_record.embedding_quantized = Some(quantize_int8(embedding));
                }
                warm_record.embedding = None;
                if let Some(content) = &record.content {
                    warm_record.summary = Some(extractive_summary(content, 3));
                }
                warm_record.content = None;
                warm_record
            })
            .collect();

        let mut migrated = Vec::new();
        for warm_record in transformed {
            match shard.warm.insert(warm_record.clone()) {
                Ok(()) => migrated.push(warm_record.record_id.clone()),
                // Already present in Warm from a prior pass whose Hot
                // delete didn't complete (spec §4.6 "(d) fails": the
                // case is resolved at the next pass by Warm presence).
                // Drop it from Hot instead of leaving it resident in
                // both tiers, which would also spin this loop forever.
                Err(crate::warm::WarmStoreError::Duplicate(_)) => migrated.push(warm_record.record_id.clone()),
                Err(err) => {
                    tracing::warn!(shard_id = shard.shard_id, record_id = %warm_record.record_id, "warm insert failed: {err}");
                }
            }
        }

        for record_id in &migrated {
            shard.hot.delete(record_id);
        }
        report.hot_to_warm_migrated += migrated.len();

        if candidates.len() < config.batch_size {
            break;
        }
    }

    let warm_cutoff_ms = now_ms - config.warm_ttl.as_millis() as i64;
    loop {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let candidates: Vec<_> = shard
            .warm
            .scan(&Filter::default(), usize::MAX)
            .into_iter()
            .filter(|record| record.timestamp_unix_ms < warm_cutoff_ms)
            .take(config.batch_size)
            .collect();
        if candidates.is_empty() {
            break;
        }

        let rows: Vec<ColdRow> = candidates
            .par_iter()
            .map(|record| {
                let summary = record.summary.clone().unwrap_or_default();
                ColdRow {
                    record_id: record.record_id.clone(),
                    system_id: record.system_id.clone(),
                    ultra_summary: single_sentence_summary(&summary),
                    fingerprint: fingerprint_of(&summary),
                    timestamp_unix_ms: record.timestamp_unix_ms,
                }
            })
            .collect();

        let file_key = year_month_key(now_ms, shard.shard_id);
        if shard.cold.append_batch(&file_key, rows).is_ok() {
            for record in &candidates {
                shard.warm.delete(&record.record_id);
            }
            report.warm_to_cold_migrated += candidates.len();
        } else {
            tracing::warn!(shard_id = shard.shard_id, "cold append failed, leaving batch in warm");
        }

        if candidates.len() < config.batch_size {
            break;
        }
    }

    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hot::make_hot_record;

    #[test]
    fn three_sentence_summary_keeps_first_three() {
        let text = "One. Two. Three. Four.";
        assert_eq!(extractive_summary(text, 3), "One. Two. Three.");
    }

    #[test]
    fn single_sentence_summary_keeps_only_first() {
        assert_eq!(single_sentence_summary("One. Two. Three."), "One.");
    }

    #[test]
    fn lease_rejects_concurrent_acquire() {
        let lease = AgingLease::default();
        let guard = lease.try_acquire().unwrap();
        assert!(lease.try_acquire().is_none());
        drop(guard);
        assert!(lease.try_acquire().is_some());
    }

    #[test]
    fn hot_to_warm_migration_moves_old_records() {
        let shard = Arc::new(Shard::new(0, 2));
        let old_ms = now_unix_ms() - Duration::from_secs(30 * 24 * 3600).as_millis() as i64;
        shard.insert_hot(make_hot_record("r1", "sys-a", "Old content. More words.", vec![1.0, 0.0], old_ms, [1u8; 32])).unwrap();
        shard.insert_hot(make_hot_record("r2", "sys-a", "Fresh content.", vec![0.0, 1.0], now_unix_ms(), [2u8; 32])).unwrap();

        let lease = AgingLease::default();
        let cancel = AtomicBool::new(false);
        let report = run_aging_pass(&shard, &AgingConfig::default(), &lease, &cancel).unwrap();

        assert_eq!(report.hot_to_warm_migrated, 1);
        assert_eq!(shard.hot.len(), 1);
        assert_eq!(shard.warm.len(), 1);
        assert!(shard.warm.contains("r1"));
    }

    #[test]
    fn warm_duplicate_from_a_prior_pass_still_clears_hot() {
        let shard = Arc::new(Shard::new(0, 2));
        let old_ms = now_unix_ms() - Duration::from_secs(30 * 24 * 3600).as_millis() as i64;
        shard.insert_hot(make_hot_record("r1", "sys-a", "Old content.", vec![1.0, 0.0], old_ms, [1u8; 32])).unwrap();

        // Simulates a prior aging pass that inserted into Warm but
        // crashed before deleting the Hot copy.
        let mut already_warm = make_hot_record("r1", "sys-a", "Old content.", vec![1.0, 0.0], old_ms, [1u8; 32]);
        already_warm.tier = Tier::Warm;
        already_warm.embedding = None;
        already_warm.embedding_quantized = Some(quantize_int8(&[1.0, 0.0]));
        shard.warm.insert(already_warm).unwrap();

        let lease = AgingLease::default();
        let cancel = AtomicBool::new(false);
        let report = run_aging_pass(&shard, &AgingConfig::default(), &lease, &cancel).unwrap();

        assert_eq!(report.hot_to_warm_migrated, 1);
        assert!(shard.hot.get("r1").is_none());
        assert_eq!(shard.warm.len(), 1);
    }

    #[test]
    fn cancellation_before_first_batch_does_nothing() {
        let shard = Arc::new(Shard::new(0, 2));
        let old_ms = now_unix_ms() - Duration::from_secs(30 * 24 * 3600).as_millis() as i64;
        shard.insert_hot(make_hot_record("r1", "sys-a", "Old content.", vec![1.0, 0.0], old_ms, [1u8; 32])).unwrap();

        let lease = AgingLease::default();
        let cancel = AtomicBool::new(true);
        let report = run_aging_pass(&shard, &AgingConfig::default(), &lease, &cancel).unwrap();

        assert_eq!(report.hot_to_warm_migrated, 0);
        assert_eq!(shard.hot.len(), 1);
    }
}
