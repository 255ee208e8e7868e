//! Pull-based ingestion (C7): workers poll the object store for
//! manifests under `systems/{system_id}/`, coordinate claims across
//! workers, dedup/embed/route/insert each referenced record, and
//! acknowledge the upload.

mod backoff;
mod claim;
mod discovery;
mod error;
mod manifest;
mod payload;
mod pipeline;
mod queue;
mod ratelimit;
mod worker;

pub use backoff::BackoffPolicy;
pub use claim::{ClaimOutcome, ClaimTable};
pub use discovery::{discover_manifests, parse_manifest_key};
pub use error::IngestError;
pub use manifest::{parse_and_validate, validate_content_hash, validate_filename, Manifest};
pub use payload::{content_hash, RecordPayload};
pub use pipeline::{IngestionOutcome, Pipeline};
pub use queue::UploadQueue;
pub use ratelimit::RateLimiter;
pub use worker::{discover_and_enqueue, process_next, run_worker_loop, AttemptTracker};
