//! Worker pool loop: discover, claim, enqueue under backpressure,
//! process, retry-or-dead-letter (spec §4.7, §5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::backoff::BackoffPolicy;
use crate::claim::{ClaimOutcome, ClaimTable};
use crate::discovery::{discover_manifests, parse_manifest_key};
use crate::pipeline::Pipeline;
use crate::queue::UploadQueue;
use crate::ratelimit::RateLimiter;
use memoryd_objectstore::ObjectStore;

/// Per-manifest retry count, held for the lifetime of the worker pool.
/// An entry is removed on success or once it is dead-lettered.
#[derive(Default)]
pub struct AttemptTracker {
    attempts: Mutex<HashMap<String, u32>>,
}

impl AttemptTracker {
    pub fn record_failure(&self, key: &str) -> u32 {
        let mut guard = self.attempts.lock();
        let entry = guard.entry(key.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn clear(&self, key: &str) {
        self.attempts.lock().remove(key);
    }

    pub fn attempts_for(&self, key: &str) -> u32 {
        self.attempts.lock().get(key).copied().unwrap_or(0)
    }
}

/// Discovers manifests under `systems/`, claims each one not already
/// held by another worker, and enqueues it. Stops early the moment the
/// queue reports full — that is the pause signal (spec §5).
pub async fn discover_and_enqueue(
    object_store: &dyn ObjectStore,
    queue: &UploadQueue,
    claim_table: &ClaimTable,
    worker_id: &str,
) -> Result<usize, crate::error::IngestError> {
    let manifests = discover_manifests(object_store, "systems/").await?;
    let now = Instant::now();
    let mut pushed = 0;
    for key in manifests {
        match claim_table.try_claim(&key, worker_id, now) {
            ClaimOutcome::AlreadyClaimed { .. } => continue,
            ClaimOutcome::Claimed | ClaimOutcome::Stolen { .. } => {
                if queue.try_push(key) {
                    pushed += 1;
                } else {
                    break;
                }
            }
        }
    }
    Ok(pushed)
}

/// Pops and handles exactly one queued manifest. Returns `true` if an
/// item was available (regardless of outcome), `false` if the queue
/// was empty.
pub async fn process_next(
    pipeline: &Pipeline,
    queue: &UploadQueue,
    claim_table: &ClaimTable,
    rate_limiter: &RateLimiter,
    backoff: &BackoffPolicy,
    attempts: &AttemptTracker,
) -> bool {
    let Some(manifest_key) = queue.pop() else {
        return false;
    };

    let system_id = parse_manifest_key(&manifest_key).map(|(system_id, _)| system_id).unwrap_or_default();

    if !rate_limiter.try_acquire(&system_id, Instant::now()) {
        // Not this worker's turn for this tenant yet; leave the claim
        // held and try again on a later pass.
        queue.try_push(manifest_key);
        return true;
    }

    match pipeline.process_upload(&manifest_key).await {
        Ok(_outcome) => {
            attempts.clear(&manifest_key);
            claim_table.release(&manifest_key);
        }
        Err(err) if err.is_retryable() => {
            let attempt = attempts.record_failure(&manifest_key);
            if backoff.should_dead_letter(attempt) {
                tracing::error!(manifest_key = %manifest_key, attempt, "dead-lettering upload: {err}");
                attempts.clear(&manifest_key);
                claim_table.release(&manifest_key);
            } else {
                let delay = backoff.delay_for(attempt);
                tracing::warn!(manifest_key = %manifest_key, attempt, delay_ms = delay.as_millis() as u64, "retrying upload: {err}");
                tokio::time::sleep(delay).await;
                queue.try_push(manifest_key);
            }
        }
        Err(err) => {
            tracing::error!(manifest_key = %manifest_key, "dead-lettering upload: {err}");
            attempts.clear(&manifest_key);
            claim_table.release(&manifest_key);
        }
    }
    true
}

/// Drives discovery and processing until `cancel` flips true. The item
/// in flight when that happens is allowed to finish; no new item
/// starts (spec §5 graceful shutdown).
pub async fn run_worker_loop(
    pipeline: Arc<Pipeline>,
    object_store: Arc<dyn ObjectStore>,
    queue: Arc<UploadQueue>,
    claim_table: Arc<ClaimTable>,
    rate_limiter: Arc<RateLimiter>,
    backoff: BackoffPolicy,
    attempts: Arc<AttemptTracker>,
    worker_id: String,
    poll_interval: Duration,
    cancel: Arc<AtomicBool>,
) {
    while !cancel.load(Ordering::Relaxed) {
        if let Err(err) = discover_and_enqueue(object_store.as_ref(), &queue, &claim_table, &worker_id).await {
            tracing::warn!(worker_id = %worker_id, "discovery pass failed: {err}");
        }
        let handled = process_next(&pipeline, &queue, &claim_table, &rate_limiter, &backoff, &attempts).await;
        if !handled {
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoryd_analytics::AnalyticsEngine;
    use memoryd_encoder::DeterministicEmbedder;
    use memoryd_graph::KnowledgeGraph;
    use memoryd_objectstore::FilesystemStore;
    use memoryd_storage::{Shard, ShardRouter};

    async fn seed(store: &FilesystemStore, upload_id: &str) {
        let manifest = serde_json::json!({
            "upload_id": upload_id,
            "uploaded_at": "2026-01-01T00:00:00Z",
            "count": 1,
            "checksum": "a".repeat(64),
            "files": ["a.json"],
        });
        let prefix = format!("systems/s1/2026-01-01/{upload_id}/");
        store.put(&format!("{prefix}manifest.json"), manifest.to_string().into_bytes()).await.unwrap();
        let payload = serde_json::json!({"record_id": "a", "content": "hello world", "metadata": {}, "timestamp_unix_ms": 0});
        store.put(&format!("{prefix}records/a.json"), payload.to_string().into_bytes()).await.unwrap();
    }

    fn pipeline(store: Arc<dyn ObjectStore>) -> Pipeline {
        Pipeline {
            object_store: store,
            embedder: Arc::new(DeterministicEmbedder::new(16)),
            shards: vec![Arc::new(Shard::new(0, 16))],
            shard_router: Arc::new(ShardRouter::new(1)),
            graph: Arc::new(KnowledgeGraph::new()),
            analytics: Arc::new(AnalyticsEngine::default()),
        }
    }

    #[tokio::test]
    async fn discovery_claims_and_enqueues_new_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());
        seed(&store, "up1").await;

        let queue = UploadQueue::with_capacity(4);
        let claims = ClaimTable::new(Duration::from_secs(300));
        let pushed = discover_and_enqueue(&store, &queue, &claims, "w1").await.unwrap();

        assert_eq!(pushed, 1);
        assert_eq!(claims.len(), 1);
    }

    #[tokio::test]
    async fn second_worker_does_not_reclaim_an_active_upload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path());
        seed(&store, "up1").await;

        let queue = UploadQueue::with_capacity(4);
        let claims = ClaimTable::new(Duration::from_secs(300));
        discover_and_enqueue(&store, &queue, &claims, "w1").await.unwrap();
        let pushed_again = discover_and_enqueue(&store, &queue, &claims, "w2").await.unwrap();

        assert_eq!(pushed_again, 0);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn end_to_end_process_next_inserts_and_releases_claim() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FilesystemStore::new(dir.path()));
        seed(&store, "up1").await;

        let queue = Arc::new(UploadQueue::with_capacity(4));
        let claims = Arc::new(ClaimTable::new(Duration::from_secs(300)));
        discover_and_enqueue(store.as_ref(), &queue, &claims, "w1").await.unwrap();

        let pipeline = pipeline(store.clone());
        let rate_limiter = RateLimiter::new(1000.0);
        let backoff = BackoffPolicy::default();
        let attempts = AttemptTracker::default();

        let handled = process_next(&pipeline, &queue, &claims, &rate_limiter, &backoff, &attempts).await;
        assert!(handled);
        assert_eq!(pipeline.shards[0].hot.len(), 1);
        assert!(claims.is_empty());
    }
}
