//! Everything a request handler or background task needs, built once
//! at startup and shared behind `Arc` (mirrors `sutra-grid-master`'s
//! single cloneable service struct, generalized to this engine's
//! larger set of subsystems).

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use memoryd_analytics::AnalyticsEngine;
use memoryd_encoder::Embedder;
use memoryd_graph::KnowledgeGraph;
use memoryd_ingestion::{AttemptTracker, BackoffPolicy, ClaimTable, Pipeline, RateLimiter, UploadQueue};
use memoryd_objectstore::ObjectStore;
use memoryd_query::QueryCoordinator;
use memoryd_resilience::{AlertManager, BreakerRegistry};
use memoryd_storage::{AgingLease, Shard, ShardRouter};

use crate::config::Options;

pub struct AppState {
    pub options: Arc<Options>,
    pub object_store: Arc<dyn ObjectStore>,
    pub embedder: Arc<dyn Embedder>,
    pub shards: Vec<Arc<Shard>>,
    pub aging_leases: Vec<Arc<AgingLease>>,
    pub router: Arc<ShardRouter>,
    pub graph: Arc<KnowledgeGraph>,
    pub analytics: Arc<AnalyticsEngine>,
    pub coordinator: Arc<QueryCoordinator>,
    pub breakers: Arc<BreakerRegistry>,
    pub alerts: Arc<AlertManager>,
    pub pipeline: Arc<Pipeline>,
    pub queue: Arc<UploadQueue>,
    pub claim_table: Arc<ClaimTable>,
    pub rate_limiter: Arc<RateLimiter>,
    pub backoff: BackoffPolicy,
    pub attempts: Arc<AttemptTracker>,
    /// Flipped by the shutdown handler; worker loops and the HTTP
    /// layer both poll it (spec §5 graceful shutdown).
    pub shutdown: Arc<AtomicBool>,
}
