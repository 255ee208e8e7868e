//! JSON-over-HTTP RPC surface (spec §4.14). Routes mirror
//! `sutra-bulk-ingester`'s axum `Router` + `CorsLayer::permissive()`
//! pattern, generalized from one job-management resource to the
//! engine's full operation catalog.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tower_http::cors::CorsLayer;

use memoryd_query::{FacetQuery, SearchQuery};
use memoryd_resilience::{Alert, CallDecision, Severity};
use memoryd_storage::Filter;

use crate::auth::is_authenticated;
use crate::state::AppState;

const DEFAULT_DEADLINE: Duration = Duration::from_millis(500);
const MAX_QUERY_TEXT_CHARS: usize = 10_000;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/manifests", post(insert_upload_manifest))
        .route("/v1/search", post(search_all_systems))
        .route("/v1/facets", post(facet_query))
        .route("/v1/metrics/:system_id", get(get_system_metrics))
        .route("/v1/analytics/trend", get(analyze_trend))
        .route("/v1/analytics/anomalies", get(detect_anomalies))
        .route("/v1/analytics/correlate", get(correlate_systems))
        .route("/v1/graph/query", get(query_knowledge_graph))
        .route("/v1/graph/path", get(find_path))
        .route("/v1/graph/statistics", get(get_graph_statistics))
        .route("/v1/storage/status", get(get_storage_status))
        .route("/healthz", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": "memoryd" }))
}

fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let presented = headers.get("authorization").and_then(|v| v.to_str().ok());
    if is_authenticated(&state.options.auth_token, state.options.auth_enabled, presented) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

fn validate_system_id(system_id: &str) -> Result<(), StatusCode> {
    let valid = (1..=100).contains(&system_id.len())
        && system_id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
    if valid { Ok(()) } else { Err(StatusCode::BAD_REQUEST) }
}

// ---- insert_upload_manifest (admin ingress for tests) ----

#[derive(Debug, Deserialize)]
struct ManifestRecordInput {
    record_id: String,
    content: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    timestamp_unix_ms: i64,
}

#[derive(Debug, Deserialize)]
struct InsertManifestRequest {
    system_id: String,
    upload_id: String,
    uploaded_at: String,
    records: Vec<ManifestRecordInput>,
}

async fn insert_upload_manifest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<InsertManifestRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&state, &headers) {
        return status.into_response();
    }
    if validate_system_id(&request.system_id).is_err() {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let day = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let prefix = format!("systems/{}/{}/{}/", request.system_id, day, request.upload_id);

    let mut hasher = Sha256::new();
    let mut filenames = Vec::with_capacity(request.records.len());
    for record in &request.records {
        hasher.update(record.content.as_bytes());
        filenames.push(format!("{}.json", record.record_id));
    }
    let checksum = hex::encode(hasher.finalize());

    let manifest = json!({
        "upload_id": request.upload_id,
        "uploaded_at": request.uploaded_at,
        "count": request.records.len(),
        "checksum": checksum,
        "files": filenames,
    });

    let breaker = state.breakers.get_or_create("object-store");
    if breaker.before_call() == CallDecision::Rejected {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    if let Err(err) = state.object_store.put(&format!("{prefix}manifest.json"), manifest.to_string().into_bytes()).await {
        breaker.on_failure();
        tracing::error!("failed to write manifest: {err}");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    for record in &request.records {
        let payload = json!({
            "record_id": record.record_id,
            "content": record.content,
            "metadata": record.metadata,
            "timestamp_unix_ms": record.timestamp_unix_ms,
        });
        let key = format!("{prefix}records/{}.json", record.record_id);
        if let Err(err) = state.object_store.put(&key, payload.to_string().into_bytes()).await {
            breaker.on_failure();
            tracing::error!("failed to write record payload: {err}");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    }

    breaker.on_success();
    Json(json!({ "accepted": true, "upload_id": request.upload_id })).into_response()
}

// ---- search_all_systems ----

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query_text: Option<String>,
    query_embedding: Option<Vec<f32>>,
    #[serde(default = "default_k")]
    k: usize,
    system_id: Option<String>,
    #[serde(default)]
    metadata_equals: BTreeMap<String, String>,
    #[serde(default)]
    threshold: f32,
}

fn default_k() -> usize {
    10
}

#[derive(Debug, Serialize)]
struct SearchResponseBody {
    results: Vec<SearchResultItem>,
    partial: bool,
    shards_queried: Vec<u32>,
    shards_failed: Vec<u32>,
}

#[derive(Debug, Serialize)]
struct SearchResultItem {
    record_id: String,
    score: f32,
    timestamp_unix_ms: i64,
}

async fn search_all_systems(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SearchRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&state, &headers) {
        return status.into_response();
    }
    if !(1..=1000).contains(&request.k) || !(-1.0..=1.0).contains(&request.threshold) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    if let Some(system_id) = &request.system_id {
        if validate_system_id(system_id).is_err() {
            return StatusCode::BAD_REQUEST.into_response();
        }
    }

    let embedding = match (request.query_embedding, request.query_text) {
        (Some(embedding), _) => embedding,
        (None, Some(text)) => {
            if text.len() > MAX_QUERY_TEXT_CHARS {
                return StatusCode::BAD_REQUEST.into_response();
            }
            match state.embedder.embed(&text).await {
                Ok(embedding) => embedding,
                Err(err) => {
                    tracing::warn!("embed failed for query text: {err}");
                    return StatusCode::SERVICE_UNAVAILABLE.into_response();
                }
            }
        }
        (None, None) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let filter = Filter { system_id: request.system_id.clone(), metadata_equals: request.metadata_equals };
    let query = SearchQuery { embedding, k: request.k, filter, threshold: request.threshold };
    let result = state.coordinator.search_all_systems(&query, request.system_id.as_deref(), DEFAULT_DEADLINE).await;

    Json(SearchResponseBody {
        results: result
            .results
            .into_iter()
            .map(|r| SearchResultItem { record_id: r.record_id, score: r.score, timestamp_unix_ms: r.timestamp_unix_ms })
            .collect(),
        partial: result.partial,
        shards_queried: result.shards_queried,
        shards_failed: result.shards_failed,
    })
    .into_response()
}

// ---- facet aggregation (supplements the core catalog) ----

#[derive(Debug, Deserialize)]
struct FacetRequest {
    group_by: String,
    system_id: Option<String>,
    #[serde(default)]
    metadata_equals: BTreeMap<String, String>,
    sum_field: Option<String>,
    #[serde(default = "default_scan_limit")]
    scan_limit: usize,
}

fn default_scan_limit() -> usize {
    100_000
}

async fn facet_query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<FacetRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&state, &headers) {
        return status.into_response();
    }
    let filter = Filter { system_id: request.system_id, metadata_equals: request.metadata_equals };
    let query = FacetQuery { group_by: request.group_by, filter, sum_field: request.sum_field, scan_limit: request.scan_limit };
    let result = memoryd_query::run_facet_query(&state.shards, &query, DEFAULT_DEADLINE).await;
    Json(json!({
        "buckets": result.buckets,
        "partial": result.partial,
        "shards_queried": result.shards_queried,
        "shards_failed": result.shards_failed,
    }))
    .into_response()
}

// ---- analytics + graph read operations ----

#[derive(Debug, Deserialize)]
struct MetricNamesQuery {
    metric_names: Option<String>,
}

async fn get_system_metrics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    axum::extract::Path(system_id): axum::extract::Path<String>,
    Query(params): Query<MetricNamesQuery>,
) -> impl IntoResponse {
    if let Err(status) = require_auth(&state, &headers) {
        return status.into_response();
    }
    if validate_system_id(&system_id).is_err() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let metric_names: Vec<String> = params
        .metric_names
        .map(|csv| csv.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let snapshots: BTreeMap<String, Vec<(i64, f64)>> =
        metric_names.iter().map(|name| (name.clone(), state.analytics.snapshot(name, &system_id))).collect();
    Json(json!({ "system_id": system_id, "metrics": snapshots })).into_response()
}

fn default_window_seconds() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TrendQuery {
    metric_name: String,
    system_id: String,
    #[serde(default = "default_window_seconds")]
    window_seconds: u64,
}

async fn analyze_trend(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(params): Query<TrendQuery>) -> impl IntoResponse {
    if let Err(status) = require_auth(&state, &headers) {
        return status.into_response();
    }
    let window = Duration::from_secs(params.window_seconds);
    match state.analytics.trend(&params.metric_name, &params.system_id, window) {
        Some(trend) => Json(json!({ "trend": trend })).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct AnomalyQuery {
    metric_name: String,
    system_id: String,
    #[serde(default = "default_threshold_std")]
    threshold_std: f64,
    #[serde(default = "default_window_seconds")]
    window_seconds: u64,
}

fn default_threshold_std() -> f64 {
    2.5
}

async fn detect_anomalies(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(params): Query<AnomalyQuery>) -> impl IntoResponse {
    if let Err(status) = require_auth(&state, &headers) {
        return status.into_response();
    }
    let window = Duration::from_secs(params.window_seconds);
    let anomalies = state.analytics.detect_anomalies(&params.metric_name, &params.system_id, params.threshold_std, window);
    Json(json!({ "anomalies": anomalies })).into_response()
}

#[derive(Debug, Deserialize)]
struct CorrelateQuery {
    metric_name: String,
    #[serde(default = "default_window_seconds")]
    window_seconds: u64,
}

async fn correlate_systems(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(params): Query<CorrelateQuery>) -> impl IntoResponse {
    if let Err(status) = require_auth(&state, &headers) {
        return status.into_response();
    }
    let window = Duration::from_secs(params.window_seconds);
    let correlations = state.analytics.correlate_systems(&params.metric_name, window);
    Json(json!({ "correlations": correlations })).into_response()
}

#[derive(Debug, Deserialize)]
struct GraphQuery {
    entity_id: String,
    relation_type: Option<String>,
    #[serde(default = "default_graph_limit")]
    limit: usize,
}

fn default_graph_limit() -> usize {
    100
}

async fn query_knowledge_graph(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(params): Query<GraphQuery>) -> impl IntoResponse {
    if let Err(status) = require_auth(&state, &headers) {
        return status.into_response();
    }
    let edges = state.graph.neighbors(&params.entity_id, params.relation_type.as_deref(), params.limit);
    Json(json!({ "edges": edges })).into_response()
}

#[derive(Debug, Deserialize)]
struct PathQuery {
    source_id: String,
    target_id: String,
    #[serde(default = "default_max_hops")]
    max_hops: usize,
}

fn default_max_hops() -> usize {
    6
}

async fn find_path(State(state): State<Arc<AppState>>, headers: HeaderMap, Query(params): Query<PathQuery>) -> impl IntoResponse {
    if let Err(status) = require_auth(&state, &headers) {
        return status.into_response();
    }
    match state.graph.shortest_path(&params.source_id, &params.target_id, params.max_hops) {
        Some(path) => Json(json!({ "path": path })).into_response(),
        None => Json(json!({ "path": Value::Null })).into_response(),
    }
}

async fn get_graph_statistics(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(status) = require_auth(&state, &headers) {
        return status.into_response();
    }
    Json(json!({ "statistics": state.graph.statistics() })).into_response()
}

#[derive(Debug, Serialize)]
struct StorageStatusResponse {
    shards: Vec<memoryd_storage::ShardStatus>,
    breakers: Vec<(String, String)>,
}

async fn get_storage_status(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(status) = require_auth(&state, &headers) {
        return status.into_response();
    }
    let shards = state.shards.iter().map(|shard| shard.status()).collect();
    let breakers = state.breakers.snapshot_states().into_iter().map(|(name, state)| (name, format!("{state:?}"))).collect();

    if shards.iter().any(|s: &memoryd_storage::ShardStatus| s.degraded) {
        let alert = Alert {
            alert_id: uuid_like_id(),
            alert_type: "shard_degraded".to_string(),
            severity: Severity::Warning,
            message: "one or more shards report degraded search".to_string(),
            metadata: BTreeMap::new(),
            timestamp: chrono::Utc::now(),
        };
        state.alerts.submit(alert);
    }

    Json(StorageStatusResponse { shards, breakers }).into_response()
}

fn uuid_like_id() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("alert-{nanos:x}")
}
