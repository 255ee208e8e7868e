use arc_swap::ArcSwap;
use hnsw_rs::prelude::*;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Below this cardinality, brute-force dot product beats the
/// overhead of building and querying an HNSW graph (spec §4.2).
const BRUTE_FORCE_THRESHOLD: usize = 1_000;
const REBUILD_FRACTION: f64 = 0.10;
const REBUILD_INTERVAL: Duration = Duration::from_secs(3600);
const FILTER_WIDENING_FACTOR: usize = 4;

struct HnswSnapshot {
    hnsw: Hnsw<'static, f32, DistCosine>,
    id_mapping: Vec<String>,
    built_at: Instant,
}

/// Per-shard HNSW lifecycle manager (spec §4.9): batched rebuilds
/// published via an RCU swap so in-flight readers keep using the old
/// graph until they naturally complete, and a brute-force path that
/// both serves low-cardinality shards and backstops a `Degraded`
/// shard whose index has been found inconsistent.
pub struct VectorIndexer {
    dimension: usize,
    vectors: RwLock<HashMap<String, Vec<f32>>>,
    tombstones: RwLock<HashSet<String>>,
    snapshot: ArcSwap<Option<HnswSnapshot>>,
    inserts_since_build: AtomicUsize,
    degraded: AtomicBool,
}

impl VectorIndexer {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: RwLock::new(HashMap::new()),
            tombstones: RwLock::new(HashSet::new()),
            snapshot: ArcSwap::new(Arc::new(None)),
            inserts_since_build: AtomicUsize::new(0),
            degraded: AtomicBool::new(false),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn cardinality(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn insert(&self, record_id: &str, vector: Vec<f32>) {
        debug_assert_eq!(vector.len(), self.dimension);
        self.vectors.write().insert(record_id.to_string(), vector);
        self.tombstones.write().remove(record_id);
        self.inserts_since_build.fetch_add(1, Ordering::Relaxed);
        self.maybe_rebuild();
    }

    pub fn remove(&self, record_id: &str) {
        self.vectors.write().remove(record_id);
        self.tombstones.write().insert(record_id.to_string());
    }

    fn maybe_rebuild(&self) {
        let cardinality = self.cardinality().max(1);
        let inserts = self.inserts_since_build.load(Ordering::Relaxed);
        let stale_interval = self
            .snapshot
            .load()
            .as_ref()
            .as_ref()
            .map(|snap| snap.built_at.elapsed() >= REBUILD_INTERVAL)
            .unwrap_or(true);
        let stale_fraction = inserts as f64 / cardinality as f64 >= REBUILD_FRACTION;

        if cardinality >= BRUTE_FORCE_THRESHOLD && (stale_fraction || stale_interval) {
            self.rebuild();
        }
    }

    pub fn rebuild(&self) {
        let vectors = self.vectors.read();
        if vectors.is_empty() {
            self.snapshot.store(Arc::new(None));
            self.inserts_since_build.store(0, Ordering::Relaxed);
            return;
        }

        let mut hnsw = Hnsw::<f32, DistCosine>::new(16, vectors.len(), 16, 200, DistCosine {});
        let mut id_mapping = Vec::with_capacity(vectors.len());
        let data: Vec<(&Vec<f32>, usize)> = vectors
            .iter()
            .map(|(record_id, vector)| {
                id_mapping.push(record_id.clone());
                (vector, id_mapping.len() - 1)
            })
            .collect();
        hnsw.parallel_insert(&data);
        drop(vectors);

        self.snapshot.store(Arc::new(Some(HnswSnapshot { hnsw, id_mapping, built_at: Instant::now() })));
        self.inserts_since_build.store(0, Ordering::Relaxed);
        self.degraded.store(false, Ordering::Relaxed);
        tracing::info!(cardinality = self.cardinality(), "rebuilt vector index");
    }

    /// Returns up to `k` `(record_id, cosine_similarity)` pairs at or
    /// above `threshold`, sorted descending, ties broken by smaller
    /// `record_id` (spec §4.2). `accept` filters by metadata/system_id
    /// post-ANN with a 4x widening factor, matching the spec's refetch
    /// contract.
    pub fn search(&self, query: &[f32], k: usize, threshold: f32, accept: impl Fn(&str) -> bool) -> Vec<(String, f32)> {
        let cardinality = self.cardinality();
        if cardinality < BRUTE_FORCE_THRESHOLD || self.is_degraded() {
            return self.brute_force_search(query, k, threshold, accept);
        }

        let snapshot_guard = self.snapshot.load();
        let snapshot = match snapshot_guard.as_ref() {
            Some(snap) => snap,
            None => return self.brute_force_search(query, k, threshold, accept),
        };

        let widened_k = (k * FILTER_WIDENING_FACTOR).max(k);
        let raw = snapshot.hnsw.search(query, widened_k, 64);

        let tombstones = self.tombstones.read();
        let mut out = Vec::new();
        let mut corrupted = false;
        for neighbor in raw {
            let record_id = match snapshot.id_mapping.get(neighbor.d_id) {
                Some(id) => id,
                None => {
                    corrupted = true;
                    continue;
                }
            };
            if tombstones.contains(record_id) || !accept(record_id) {
                continue;
            }
            let similarity = 1.0 - neighbor.distance.min(2.0);
            if similarity >= threshold {
                out.push((record_id.clone(), similarity));
            }
        }

        if corrupted {
            tracing::error!("vector index id mapping inconsistent, marking shard degraded");
            self.degraded.store(true, Ordering::Relaxed);
            return self.brute_force_search(query, k, threshold, accept);
        }

        sort_and_truncate(&mut out, k);
        out
    }

    fn brute_force_search(&self, query: &[f32], k: usize, threshold: f32, accept: impl Fn(&str) -> bool) -> Vec<(String, f32)> {
        let vectors = self.vectors.read();
        let mut out: Vec<(String, f32)> = vectors
            .iter()
            .filter(|(record_id, _)| accept(record_id))
            .filter_map(|(record_id, vector)| {
                let similarity = cosine_similarity(query, vector);
                if similarity >= threshold {
                    Some((record_id.clone(), similarity))
                } else {
                    None
                }
            })
            .collect();
        sort_and_truncate(&mut out, k);
        out
    }
}

fn sort_and_truncate(results: &mut Vec<(String, f32)>, k: usize) {
    results.sort_by(|(id_a, score_a), (id_b, score_b)| {
        score_b.partial_cmp(score_a).unwrap_or(std::cmp::Ordering::Equal).then_with(|| id_a.cmp(id_b))
    });
    results.truncate(k);
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
