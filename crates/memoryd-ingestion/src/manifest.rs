//! Upload manifest schema and validation (spec §6: object-store layout).
//! A manifest is the only untrusted input this crate parses directly;
//! every field is bounded and pattern-checked before anything else
//! touches it.

use serde::Deserialize;

use crate::error::IngestError;

const MAX_COUNT: u64 = 1_000_000;
const MAX_FILES: usize = 1_000_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub upload_id: String,
    pub uploaded_at: String,
    pub count: u64,
    pub checksum: String,
    pub files: Vec<String>,
}

/// Parses and validates a manifest in one step; a manifest that fails
/// validation never reaches the ingestion pipeline.
pub fn parse_and_validate(bytes: &[u8]) -> Result<Manifest, IngestError> {
    let manifest: Manifest = serde_json::from_slice(bytes)
        .map_err(|e| IngestError::Validation(format!("manifest is not valid JSON: {e}")))?;
    validate(&manifest)?;
    Ok(manifest)
}

fn validate(manifest: &Manifest) -> Result<(), IngestError> {
    if manifest.upload_id.is_empty() {
        return Err(IngestError::Validation("upload_id is empty".into()));
    }
    if chrono::DateTime::parse_from_rfc3339(&manifest.uploaded_at).is_err() {
        return Err(IngestError::Validation(format!("uploaded_at {} is not RFC3339", manifest.uploaded_at)));
    }
    if manifest.count > MAX_COUNT {
        return Err(IngestError::Validation(format!("count {} exceeds {MAX_COUNT}", manifest.count)));
    }
    if !is_hex64(&manifest.checksum) {
        return Err(IngestError::Validation(format!("checksum {} is not 64 hex chars", manifest.checksum)));
    }
    if manifest.files.len() > MAX_FILES {
        return Err(IngestError::Validation("too many files listed in manifest".into()));
    }
    for filename in &manifest.files {
        validate_filename(filename)?;
    }
    Ok(())
}

/// Rejects path traversal and absolute paths outright (spec §8
/// boundary behavior), then checks the remaining filename against the
/// allowed character set.
pub fn validate_filename(filename: &str) -> Result<(), IngestError> {
    if filename.contains("..") || filename.starts_with('/') {
        return Err(IngestError::Validation(format!("unsafe path in manifest: {filename}")));
    }
    let valid = !filename.is_empty()
        && filename.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !valid {
        return Err(IngestError::Validation(format!("filename {filename} contains disallowed characters")));
    }
    Ok(())
}

/// Validates a `content_hash` against the spec's `^[a-f0-9]{64}$` pattern.
pub fn validate_content_hash(hash: &str) -> Result<(), IngestError> {
    if is_hex64(hash) {
        Ok(())
    } else {
        Err(IngestError::Validation(format!("content_hash {hash} is not 64 lowercase hex chars")))
    }
}

fn is_hex64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(files: Vec<&str>) -> Vec<u8> {
        serde_json::json!({
            "upload_id": "up-1",
            "uploaded_at": "2026-01-01T00:00:00Z",
            "count": 3,
            "checksum": "a".repeat(64),
            "files": files,
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn well_formed_manifest_parses() {
        let manifest = parse_and_validate(&sample(vec!["a.bin", "b.bin"])).unwrap();
        assert_eq!(manifest.upload_id, "up-1");
        assert_eq!(manifest.files.len(), 2);
    }

    #[test]
    fn path_traversal_is_rejected() {
        let err = parse_and_validate(&sample(vec!["../etc/passwd"])).unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn absolute_path_is_rejected() {
        let err = parse_and_validate(&sample(vec!["/abs/path"])).unwrap_err();
        assert!(matches!(err, IngestError::Validation(_)));
    }

    #[test]
    fn bad_checksum_length_is_rejected() {
        let bytes = serde_json::json!({
            "upload_id": "up-1",
            "uploaded_at": "2026-01-01T00:00:00Z",
            "count": 1,
            "checksum": "deadbeef",
            "files": ["a.bin"],
        })
        .to_string()
        .into_bytes();
        assert!(parse_and_validate(&bytes).is_err());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let bytes = serde_json::json!({
            "upload_id": "up-1",
            "uploaded_at": "2026-01-01T00:00:00Z",
            "count": 1,
            "checksum": "a".repeat(64),
            "files": ["a.bin"],
            "extra_field": "not allowed",
        })
        .to_string()
        .into_bytes();
        assert!(parse_and_validate(&bytes).is_err());
    }

    #[test]
    fn content_hash_pattern_is_enforced() {
        assert!(validate_content_hash(&"a".repeat(64)).is_ok());
        assert!(validate_content_hash(&"A".repeat(64)).is_err());
        assert!(validate_content_hash("short").is_err());
    }
}
