//! `memoryd`: the public-facing binary (spec §4.14). Boots every
//! subsystem, spawns ingestion workers and the aging scheduler as
//! background tasks, serves the JSON RPC surface over HTTP, and drains
//! on SIGTERM (spec §5 graceful shutdown) — the overall shape follows
//! `sutra-grid-master`'s single `main` that starts background
//! acceptors before blocking on the foreground server.

mod auth;
mod config;
mod http;
mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memoryd_analytics::AnalyticsEngine;
use memoryd_encoder::{DeterministicEmbedder, Embedder};
use memoryd_graph::KnowledgeGraph;
use memoryd_ingestion::{AttemptTracker, BackoffPolicy, ClaimTable, Pipeline, RateLimiter, UploadQueue};
use memoryd_objectstore::{FilesystemStore, ObjectStore};
use memoryd_query::QueryCoordinator;
use memoryd_resilience::{AlertManager, AlertRouter, BreakerConfig, BreakerRegistry, ReqwestWebhookSender};
use memoryd_storage::{AgingConfig, AgingLease, Shard, ShardRouter};

use config::Options;
use state::AppState;

const BACKPRESSURE_QUEUE_FACTOR: usize = 4;
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(200);
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(30);

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    let options = match Options::from_env() {
        Ok(options) => options,
        Err(err) => {
            tracing::error!("configuration error: {err}");
            return std::process::ExitCode::from(1);
        }
    };

    if options.embed_dim == 0 {
        tracing::error!("EMBED_DIM must be positive");
        return std::process::ExitCode::from(1);
    }

    let object_store: Arc<dyn ObjectStore> = Arc::new(FilesystemStore::new(&options.object_store_path));

    let state = match build_state(options, object_store).await {
        Ok(state) => state,
        Err(err) => {
            tracing::error!("fatal storage-adapter error at startup: {err}");
            return std::process::ExitCode::from(2);
        }
    };

    spawn_ingestion_workers(&state);
    spawn_aging_loop(&state);

    let app = http::build_router(state.clone());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], state.options.http_port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind {addr}: {err}");
            return std::process::ExitCode::from(2);
        }
    };
    tracing::info!("memoryd listening on {addr}");

    let shutdown = state.shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown_signal(shutdown));

    match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD + Duration::from_secs(5), server).await {
        Ok(Ok(())) => std::process::ExitCode::from(0),
        Ok(Err(err)) => {
            tracing::error!("server error: {err}");
            std::process::ExitCode::from(1)
        }
        Err(_elapsed) => {
            tracing::warn!("graceful shutdown window exceeded; forcing exit");
            std::process::ExitCode::from(130)
        }
    }
}

async fn build_state(options: Options, object_store: Arc<dyn ObjectStore>) -> anyhow::Result<Arc<AppState>> {
    let options = Arc::new(options);
    let embedder: Arc<dyn Embedder> = Arc::new(DeterministicEmbedder::new(options.embed_dim));

    let shards: Vec<Arc<Shard>> =
        (0..options.shard_count).map(|id| Arc::new(Shard::new(id, options.embed_dim))).collect();
    let aging_leases: Vec<Arc<AgingLease>> = (0..options.shard_count).map(|_| Arc::new(AgingLease::default())).collect();
    let router = Arc::new(ShardRouter::new(options.shard_count));
    let graph = Arc::new(KnowledgeGraph::new());
    let analytics = Arc::new(AnalyticsEngine::default());
    let coordinator = Arc::new(QueryCoordinator::new(shards.clone(), router.clone()));

    let breaker_config = BreakerConfig {
        failure_threshold: options.circuit_failure_threshold,
        success_threshold: options.circuit_success_threshold,
        open_duration: options.circuit_open_duration,
    };
    let breakers = Arc::new(BreakerRegistry::new(breaker_config));

    let alert_router = AlertRouter::new();
    let alert_sender = Arc::new(ReqwestWebhookSender::default());
    let alerts = Arc::new(AlertManager::new(alert_router, alert_sender, options.alert_dedup_window));

    let pipeline = Arc::new(Pipeline {
        object_store: object_store.clone(),
        embedder: embedder.clone(),
        shards: shards.clone(),
        shard_router: router.clone(),
        graph: graph.clone(),
        analytics: analytics.clone(),
    });

    let queue = Arc::new(UploadQueue::with_capacity(BACKPRESSURE_QUEUE_FACTOR * options.workers.max(1) as usize));
    let claim_table = Arc::new(ClaimTable::new(Duration::from_secs(300)));
    let rate_limiter = Arc::new(RateLimiter::new(options.rate_limit_per_system));
    let backoff = BackoffPolicy::default();
    let attempts = Arc::new(AttemptTracker::default());

    Ok(Arc::new(AppState {
        options,
        object_store,
        embedder,
        shards,
        aging_leases,
        router,
        graph,
        analytics,
        coordinator,
        breakers,
        alerts,
        pipeline,
        queue,
        claim_table,
        rate_limiter,
        backoff,
        attempts,
        shutdown: Arc::new(AtomicBool::new(false)),
    }))
}

fn spawn_ingestion_workers(state: &Arc<AppState>) {
    for worker_index in 0..state.options.workers.max(1) {
        let pipeline = state.pipeline.clone();
        let object_store = state.object_store.clone();
        let queue = state.queue.clone();
        let claim_table = state.claim_table.clone();
        let rate_limiter = state.rate_limiter.clone();
        let backoff = state.backoff.clone();
        let attempts = state.attempts.clone();
        let shutdown = state.shutdown.clone();
        let worker_id = format!("worker-{worker_index}");
        tokio::spawn(async move {
            memoryd_ingestion::run_worker_loop(
                pipeline,
                object_store,
                queue,
                claim_table,
                rate_limiter,
                backoff,
                attempts,
                worker_id,
                WORKER_POLL_INTERVAL,
                shutdown,
            )
            .await;
        });
    }
}

fn spawn_aging_loop(state: &Arc<AppState>) {
    let config = AgingConfig { hot_ttl: state.options.hot_ttl, warm_ttl: state.options.warm_ttl, ..AgingConfig::default() };
    let period = state.options.aging_period;
    for (shard, lease) in state.shards.iter().cloned().zip(state.aging_leases.iter().cloned()) {
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move {
            let cancel = AtomicBool::new(false);
            while !shutdown.load(Ordering::Relaxed) {
                if let Some(report) = memoryd_storage::run_aging_pass(&shard, &config, &lease, &cancel) {
                    if report.hot_to_warm_migrated > 0 || report.warm_to_cold_migrated > 0 {
                        tracing::info!(
                            shard_id = shard.shard_id,
                            hot_to_warm = report.hot_to_warm_migrated,
                            warm_to_cold = report.warm_to_cold_migrated,
                            "aging pass migrated records"
                        );
                    }
                }
                tokio::time::sleep(period).await;
            }
        });
    }
}

async fn wait_for_shutdown_signal(shutdown: Arc<AtomicBool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining in-flight work");
    shutdown.store(true, Ordering::Relaxed);
    tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;
}
