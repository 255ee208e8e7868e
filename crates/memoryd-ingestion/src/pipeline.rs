//! Per-upload processing (spec §4.7 steps 1-3): fetch, validate,
//! dedup, embed, route, insert, extract graph structure, acknowledge.

use std::collections::BTreeMap;
use std::sync::Arc;

use memoryd_analytics::AnalyticsEngine;
use memoryd_encoder::Embedder;
use memoryd_graph::{Edge, Entity, KnowledgeGraph};
use memoryd_objectstore::ObjectStore;
use memoryd_storage::{minhash_signature, DedupOutcome, HotStoreError, Record, Shard, ShardRouter, Tier};

use crate::discovery::parse_manifest_key;
use crate::error::IngestError;
use crate::manifest;
use crate::payload::{content_hash, RecordPayload};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestionOutcome {
    pub inserted: usize,
    pub exact_duplicates: usize,
    pub near_duplicates: usize,
}

/// Everything one upload's processing needs: the object store it was
/// discovered in, the encoder, every shard (indexed by shard id), the
/// router that maps a `system_id` to one of them, the knowledge graph,
/// and the analytics engine. Owned collectively by the facade and
/// shared across every worker.
pub struct Pipeline {
    pub object_store: Arc<dyn ObjectStore>,
    pub embedder: Arc<dyn Embedder>,
    pub shards: Vec<Arc<Shard>>,
    pub shard_router: Arc<ShardRouter>,
    pub graph: Arc<KnowledgeGraph>,
    pub analytics: Arc<AnalyticsEngine>,
}

impl Pipeline {
    pub async fn process_upload(&self, manifest_key: &str) -> Result<IngestionOutcome, IngestError> {
        let (system_id, prefix) = parse_manifest_key(manifest_key)
            .ok_or_else(|| IngestError::Validation(format!("unrecognized manifest key layout: {manifest_key}")))?;

        let manifest_bytes = self.object_store.get(manifest_key).await?;
        let manifest = manifest::parse_and_validate(&manifest_bytes)?;

        let shard_id = memoryd_storage::shard_for_system(&system_id, self.shard_router.shard_count());
        let shard = self
            .shards
            .get(shard_id as usize)
            .ok_or_else(|| IngestError::Terminal(format!("no shard registered for id {shard_id}")))?;

        let mut outcome = IngestionOutcome::default();
        for filename in &manifest.files {
            let record_key = format!("{prefix}records/{filename}");
            let payload_bytes = self.object_store.get(&record_key).await?;
            let payload: RecordPayload = serde_json::from_slice(&payload_bytes)
                .map_err(|e| IngestError::Validation(format!("record payload {record_key} is not valid JSON: {e}")))?;

            self.ingest_record(shard, &system_id, &payload, &mut outcome).await?;
        }

        self.object_store.delete(manifest_key).await?;
        for filename in &manifest.files {
            self.object_store.delete(&format!("{prefix}records/{filename}")).await?;
        }

        Ok(outcome)
    }

    async fn ingest_record(
        &self,
        shard: &Arc<Shard>,
        system_id: &str,
        payload: &RecordPayload,
        outcome: &mut IngestionOutcome,
    ) -> Result<(), IngestError> {
        let hash = content_hash(&payload.content);
        let minhash_sig = minhash_signature(&payload.content);

        match shard.dedup.check_and_register(&payload.record_id, hash, &minhash_sig) {
            DedupOutcome::ExactDuplicate => {
                outcome.exact_duplicates += 1;
                return Ok(());
            }
            DedupOutcome::NearDuplicate { of_record_id } => {
                outcome.near_duplicates += 1;
                self.graph.add_edge(Edge {
                    source_id: format!("record:{}", payload.record_id),
                    target_id: format!("record:{of_record_id}"),
                    relation_type: "is_near_duplicate_of".to_string(),
                    weight: 1.0,
                    properties: BTreeMap::new(),
                    source_system: system_id.to_string(),
                    created_at_unix_ms: payload.timestamp_unix_ms,
                });
                return Ok(());
            }
            DedupOutcome::New => {}
        }

        let embedding = self.embedder.embed(&payload.content).await?;
        let record = Record {
            record_id: payload.record_id.clone(),
            system_id: system_id.to_string(),
            content: Some(payload.content.clone()),
            summary: None,
            ultra_summary: None,
            embedding: Some(embedding),
            embedding_quantized: None,
            metadata: payload.metadata.clone(),
            timestamp_unix_ms: payload.timestamp_unix_ms,
            content_hash: hash,
            minhash_sig: Some(minhash_sig),
            tier: Tier::Hot,
        };

        match shard.insert_hot(record) {
            Ok(()) => {
                outcome.inserted += 1;
                self.analytics.record("ingested", system_id, payload.timestamp_unix_ms / 1000, 1.0);
                self.extract_graph(system_id, payload);
                Ok(())
            }
            Err(HotStoreError::Duplicate(_)) => {
                outcome.exact_duplicates += 1;
                Ok(())
            }
        }
    }

    /// Minimal entity/edge extraction: every record belongs to its
    /// `system_id` entity, and to its `user_id` metadata entity when
    /// present (spec §4.7 step 2: "feed entity+edge extraction into
    /// the graph").
    fn extract_graph(&self, system_id: &str, payload: &RecordPayload) {
        let system_entity_id = format!("system:{system_id}");
        self.graph.upsert_entity(Entity {
            entity_id: system_entity_id.clone(),
            entity_type: "system".to_string(),
            properties: BTreeMap::new(),
            source_system: system_id.to_string(),
        });

        if let Some(user_id) = payload.metadata.get("user_id") {
            let user_entity_id = format!("user:{user_id}");
            self.graph.upsert_entity(Entity {
                entity_id: user_entity_id.clone(),
                entity_type: "user".to_string(),
                properties: BTreeMap::new(),
                source_system: system_id.to_string(),
            });
            self.graph.add_edge(Edge {
                source_id: user_entity_id,
                target_id: system_entity_id,
                relation_type: "belongs_to".to_string(),
                weight: 1.0,
                properties: BTreeMap::new(),
                source_system: system_id.to_string(),
                created_at_unix_ms: payload.timestamp_unix_ms,
            });
        }
    }
}
