mod aging;
mod cold;
mod dedup;
mod hot;
mod indexer;
mod minhash;
mod quantize;
mod record;
mod router;
mod shard;
mod warm;

pub use aging::{extractive_summary, run_aging_pass, single_sentence_summary, AgingConfig, AgingLease, AgingReport};
pub use cold::{year_month_key, ColdRow, ColdStore, ColdStoreError};
pub use dedup::{DedupOutcome, Deduplicator};
pub use hot::{make_hot_record, HotStore, HotStoreError};
pub use indexer::VectorIndexer;
pub use minhash::{estimated_jaccard, minhash_signature};
pub use quantize::{dequantize, quantize_int8};
pub use record::{Filter, QuantizedVector, Record, Tier};
pub use router::{shard_for_system, ShardRouter};
pub use shard::{Shard, ShardStatus};
pub use warm::{day_partition_key, WarmStore, WarmStoreError};
