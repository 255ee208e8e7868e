use serde::Serialize;
use std::collections::BTreeMap;

/// `entity_id` is `type:natural_key` by convention (spec §3); the
/// graph itself treats it as an opaque string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub entity_id: String,
    pub entity_type: String,
    pub properties: BTreeMap<String, String>,
    pub source_system: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub relation_type: String,
    pub weight: f32,
    pub properties: BTreeMap<String, String>,
    pub source_system: String,
    pub created_at_unix_ms: i64,
}
