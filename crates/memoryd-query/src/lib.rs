//! Fan-out query coordination: per-shard deadlines, merge-heap top-k,
//! re-ranking, and faceted aggregation over a set of storage shards.

mod coordinator;
mod facet;
mod merge;

pub use coordinator::{QueryCoordinator, SearchQuery, SearchResult};
pub use facet::{run_facet_query, FacetBucket, FacetQuery, FacetResult};
pub use merge::{apply_rerank, merge_top_k, ReRankFn, ScoredRecord};
