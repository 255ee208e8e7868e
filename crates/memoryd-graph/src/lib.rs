//! Knowledge graph (C12): adjacency lists keyed by `entity_id`, fed by
//! ingestion's entity/edge extraction and the deduplicator's
//! `is_near_duplicate_of` edges. Mutations take the single exclusive
//! write lock described in spec §4.12's invariants; reads take a
//! shared lock and never observe a half-applied mutation, matching
//! `sutra-storage`'s read-view-over-write-log split generalized here
//! to a plain `RwLock` since a full concept's worth of RCU machinery
//! isn't needed for graph-sized data.

mod entity;
mod path;

pub use entity::{Edge, Entity};

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Everything the graph holds, behind one lock.
struct Inner {
    entities: HashMap<String, Entity>,
    /// entity_id -> edges where that entity is either endpoint,
    /// pre-sorted by (relation_type, other_endpoint) for `neighbors`'s
    /// stable-ordering requirement.
    adjacency: HashMap<String, Vec<Edge>>,
    /// Count of distinct (source, target, relation_type) edges,
    /// tracked incrementally since the adjacency map stores each edge
    /// twice (once per endpoint) except self-loops.
    edge_count: usize,
}

impl Inner {
    fn new() -> Self {
        Self { entities: HashMap::new(), adjacency: HashMap::new(), edge_count: 0 }
    }
}

pub struct KnowledgeGraph {
    inner: RwLock<Inner>,
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStatistics {
    pub entity_count: usize,
    pub edge_count: usize,
    pub entities_per_type: BTreeMap<String, usize>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::new()) }
    }

    /// Idempotent: the entity's `source_system` never changes once
    /// set (earliest write wins); properties merge last-writer-wins
    /// key by key.
    pub fn upsert_entity(&self, entity: Entity) {
        let mut guard = self.inner.write();
        match guard.entities.get_mut(&entity.entity_id) {
            Some(existing) => {
                for (k, v) in entity.properties {
                    existing.properties.insert(k, v);
                }
            }
            None => {
                guard.entities.insert(entity.entity_id.clone(), entity);
            }
        }
    }

    pub fn get_entity(&self, entity_id: &str) -> Option<Entity> {
        self.inner.read().entities.get(entity_id).cloned()
    }

    /// Parallel edges of differing `relation_type` are independent
    /// rows; a repeat of `(source, target, relation_type)` updates the
    /// weight of the existing edge in place rather than appending.
    pub fn add_edge(&self, edge: Edge) {
        let mut guard = self.inner.write();

        let is_new = find_matching_mut(&mut guard.adjacency, &edge.source_id, &edge).is_none();
        if is_new {
            insert_sorted(guard.adjacency.entry(edge.source_id.clone()).or_default(), edge.clone());
        } else if let Some(existing) = find_matching_mut(&mut guard.adjacency, &edge.source_id, &edge) {
            existing.weight = edge.weight;
            existing.properties = edge.properties.clone();
        }

        if edge.source_id != edge.target_id {
            // Mirror so `neighbors` can treat the graph as undirected
            // without a second lookup; `relation_type`/`weight` carry
            // over, only the endpoint each list is keyed by differs.
            let mut mirrored = edge.clone();
            std::mem::swap(&mut mirrored.source_id, &mut mirrored.target_id);
            if find_matching_mut(&mut guard.adjacency, &mirrored.source_id, &mirrored).is_none() {
                insert_sorted(guard.adjacency.entry(mirrored.source_id.clone()).or_default(), mirrored);
            } else if let Some(existing) = find_matching_mut(&mut guard.adjacency, &mirrored.source_id, &mirrored) {
                existing.weight = mirrored.weight;
                existing.properties = mirrored.properties.clone();
            }
        }

        if is_new {
            guard.edge_count += 1;
        }
    }

    /// Outgoing and incoming edges combined (undirected view), ordered
    /// by `relation_type` ascending then `target_id` ascending.
    pub fn neighbors(
        &self,
        entity_id: &str,
        relation_type: Option<&str>,
        limit: usize,
    ) -> Vec<Edge> {
        let guard = self.inner.read();
        let Some(edges) = guard.adjacency.get(entity_id) else {
            return Vec::new();
        };
        edges
            .iter()
            .filter(|e| relation_type.map(|rt| rt == e.relation_type).unwrap_or(true))
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn shortest_path(
        &self,
        source_id: &str,
        target_id: &str,
        max_hops: usize,
    ) -> Option<Vec<String>> {
        let guard = self.inner.read();
        path::bidirectional_bfs(&guard.entities, &guard.adjacency, source_id, target_id, max_hops)
    }

    pub fn statistics(&self) -> GraphStatistics {
        let guard = self.inner.read();
        let mut entities_per_type = BTreeMap::new();
        for e in guard.entities.values() {
            *entities_per_type.entry(e.entity_type.clone()).or_insert(0) += 1;
        }
        GraphStatistics {
            entity_count: guard.entities.len(),
            edge_count: guard.edge_count,
            entities_per_type,
        }
    }
}

fn find_matching_mut<'a>(
    adjacency: &'a mut HashMap<String, Vec<Edge>>,
    source_id: &str,
    edge: &Edge,
) -> Option<&'a mut Edge> {
    adjacency
        .get_mut(source_id)?
        .iter_mut()
        .find(|e| e.target_id == edge.target_id && e.relation_type == edge.relation_type)
}

fn insert_sorted(edges: &mut Vec<Edge>, edge: Edge) {
    let pos = edges
        .binary_search_by(|e| {
            (e.relation_type.as_str(), e.target_id.as_str())
                .cmp(&(edge.relation_type.as_str(), edge.target_id.as_str()))
        })
        .unwrap_or_else(|p| p);
    edges.insert(pos, edge);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, kind: &str, source: &str) -> Entity {
        Entity {
            entity_id: id.to_string(),
            entity_type: kind.to_string(),
            properties: BTreeMap::new(),
            source_system: source.to_string(),
        }
    }

    fn edge(src: &str, tgt: &str, rel: &str) -> Edge {
        Edge {
            source_id: src.to_string(),
            target_id: tgt.to_string(),
            relation_type: rel.to_string(),
            weight: 1.0,
            properties: BTreeMap::new(),
            source_system: "s1".to_string(),
            created_at_unix_ms: 0,
        }
    }

    #[test]
    fn upsert_keeps_earliest_source_system() {
        let g = KnowledgeGraph::new();
        g.upsert_entity(entity("user:u1", "user", "s1"));
        g.upsert_entity(entity("user:u1", "user", "s2"));
        assert_eq!(g.get_entity("user:u1").unwrap().source_system, "s1");
    }

    #[test]
    fn properties_merge_last_writer_wins() {
        let g = KnowledgeGraph::new();
        let mut e1 = entity("user:u1", "user", "s1");
        e1.properties.insert("name".into(), "alice".into());
        g.upsert_entity(e1);

        let mut e2 = entity("user:u1", "user", "s1");
        e2.properties.insert("name".into(), "alicia".into());
        e2.properties.insert("city".into(), "nyc".into());
        g.upsert_entity(e2);

        let got = g.get_entity("user:u1").unwrap();
        assert_eq!(got.properties.get("name").unwrap(), "alicia");
        assert_eq!(got.properties.get("city").unwrap(), "nyc");
    }

    #[test]
    fn neighbors_are_stably_ordered() {
        let g = KnowledgeGraph::new();
        g.add_edge(edge("p1", "b", "worked_on"));
        g.add_edge(edge("p1", "a", "worked_on"));
        g.add_edge(edge("p1", "z", "contains"));
        let ns = g.neighbors("p1", None, 10);
        let order: Vec<_> = ns.iter().map(|e| (e.relation_type.as_str(), e.target_id.as_str())).collect();
        assert_eq!(order, vec![("contains", "z"), ("worked_on", "a"), ("worked_on", "b")]);
    }

    #[test]
    fn duplicate_edge_updates_weight_not_appends() {
        let g = KnowledgeGraph::new();
        g.add_edge(edge("a", "b", "knows"));
        let mut e2 = edge("a", "b", "knows");
        e2.weight = 5.0;
        g.add_edge(e2);
        let ns = g.neighbors("a", Some("knows"), 10);
        assert_eq!(ns.len(), 1);
        assert_eq!(ns[0].weight, 5.0);
    }

    #[test]
    fn shortest_path_source_equals_target() {
        let g = KnowledgeGraph::new();
        g.upsert_entity(entity("x", "t", "s1"));
        assert_eq!(g.shortest_path("x", "x", 5), Some(vec!["x".to_string()]));
    }

    #[test]
    fn shortest_path_zero_hops_unreachable_unless_equal() {
        let g = KnowledgeGraph::new();
        g.add_edge(edge("a", "b", "knows"));
        assert_eq!(g.shortest_path("a", "b", 0), None);
        assert_eq!(g.shortest_path("a", "a", 0), Some(vec!["a".to_string()]));
    }

    #[test]
    fn shortest_path_via_shared_neighbor() {
        let g = KnowledgeGraph::new();
        g.add_edge(edge("user:u1", "project:p1", "worked_on"));
        g.add_edge(edge("user:u2", "project:p1", "worked_on"));
        g.add_edge(edge("system:s1", "project:p1", "contains"));

        let path = g.shortest_path("user:u1", "user:u2", 3).unwrap();
        assert_eq!(path, vec!["user:u1", "project:p1", "user:u2"]);
    }

    #[test]
    fn unreachable_within_max_hops_returns_none() {
        let g = KnowledgeGraph::new();
        g.add_edge(edge("a", "b", "knows"));
        g.add_edge(edge("b", "c", "knows"));
        g.add_edge(edge("c", "d", "knows"));
        assert_eq!(g.shortest_path("a", "d", 2), None);
        assert!(g.shortest_path("a", "d", 3).is_some());
    }

    #[test]
    fn absent_endpoint_is_unreachable() {
        let g = KnowledgeGraph::new();
        g.upsert_entity(entity("a", "t", "s1"));
        assert_eq!(g.shortest_path("a", "missing", 5), None);
    }

    #[test]
    fn statistics_count_entities_and_edges_once() {
        let g = KnowledgeGraph::new();
        g.upsert_entity(entity("a", "user", "s1"));
        g.upsert_entity(entity("b", "user", "s1"));
        g.add_edge(edge("a", "b", "knows"));
        let stats = g.statistics();
        assert_eq!(stats.entity_count, 2);
        assert_eq!(stats.edge_count, 1);
        assert_eq!(stats.entities_per_type.get("user"), Some(&2));
    }
}
