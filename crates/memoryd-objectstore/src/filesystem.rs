use crate::{ObjectMeta, ObjectStore, ObjectStoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Local-filesystem backend. Used in dev and in every test in this
/// workspace that would otherwise need a real S3-compatible endpoint;
/// keys map to paths under `root` verbatim, so `list` is a directory
/// walk rather than an API call.
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let base = self.path_for(prefix);
        let mut out = Vec::new();
        walk(&self.root, &base, &mut out)
            .map_err(|e| ObjectStoreError::Retryable(e.to_string()))?;
        out.sort();
        Ok(out)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        tokio::fs::read(self.path_for(key))
            .await
            .map_err(|e| classify(&e))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectStoreError::Retryable(e.to_string()))?;
        }
        // Write-then-rename so readers never observe a partial object.
        let tmp = path.with_extension("tmp-upload");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| ObjectStoreError::Retryable(e.to_string()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ObjectStoreError::Retryable(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ObjectStoreError::Retryable(e.to_string())),
        }
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, ObjectStoreError> {
        let meta = tokio::fs::metadata(self.path_for(key))
            .await
            .map_err(|e| classify(&e))?;
        Ok(ObjectMeta {
            size: meta.len(),
            etag: format!("{:x}", meta.len()),
        })
    }
}

fn classify(e: &std::io::Error) -> ObjectStoreError {
    match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
            ObjectStoreError::Terminal(e.to_string())
        }
        _ => ObjectStoreError::Retryable(e.to_string()),
    }
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    if dir.is_file() {
        if let Ok(rel) = dir.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
        return Ok(());
    }
    let mut entries: Vec<_> = std::fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.path());
    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}
