//! Object-store adapter (C1): the sole boundary at which credentials
//! and endpoint configuration matter. Every other component reaches
//! the backing store only through the [`ObjectStore`] trait.

mod error;
mod filesystem;
mod s3;

pub use error::ObjectStoreError;
pub use filesystem::FilesystemStore;
pub use s3::S3Store;

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub size: u64,
    pub etag: String,
}

/// Uniform list/get/put/delete/head over an S3-compatible backend.
/// Implementations must be safe for concurrent use — callers hold no
/// lock around a store and may issue overlapping calls freely.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists keys under `prefix`. Returns a materialized `Vec` rather
    /// than a true lazy stream: callers (the ingestion discovery loop)
    /// already bound how much of a prefix they walk per poll, so the
    /// extra trait-object machinery a `Stream` would need isn't
    /// pulling its weight here.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError>;
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError>;
}
