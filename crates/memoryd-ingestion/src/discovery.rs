use crate::error::IngestError;
use memoryd_objectstore::ObjectStore;

/// Splits a discovered key into `(system_id, upload_prefix)`, e.g.
/// `systems/s1/2026-01-01/up1/manifest.json` ->
/// `("s1", "systems/s1/2026-01-01/up1/")`.
pub fn parse_manifest_key(key: &str) -> Option<(String, String)> {
    const SUFFIX: &str = "manifest.json";
    if !key.ends_with(SUFFIX) {
        return None;
    }
    let prefix = &key[..key.len() - SUFFIX.len()];
    let mut parts = prefix.trim_end_matches('/').split('/');
    if parts.next()? != "systems" {
        return None;
    }
    let system_id = parts.next()?.to_string();
    if system_id.is_empty() {
        return None;
    }
    Some((system_id, prefix.to_string()))
}

/// Lists every manifest object under `prefix` (normally `"systems/"`).
pub async fn discover_manifests(object_store: &dyn ObjectStore, prefix: &str) -> Result<Vec<String>, IngestError> {
    let keys = object_store.list(prefix).await?;
    Ok(keys.into_iter().filter(|k| k.ends_with("manifest.json")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_manifest_key() {
        let (system_id, prefix) = parse_manifest_key("systems/s1/2026-01-01/up1/manifest.json").unwrap();
        assert_eq!(system_id, "s1");
        assert_eq!(prefix, "systems/s1/2026-01-01/up1/");
    }

    #[test]
    fn rejects_keys_outside_the_systems_prefix() {
        assert!(parse_manifest_key("other/manifest.json").is_none());
        assert!(parse_manifest_key("systems/s1/2026-01-01/up1/records/r1.bin").is_none());
    }
}
