//! Shared wire format for the memory-aggregation engine.
//!
//! Two layers: a generic length-prefixed bincode frame (`frame`), and
//! the message sets carried inside those frames (`shard`). The public
//! RPC facade (`memoryd-facade`) speaks its own JSON-over-HTTP surface
//! and does not depend on this crate; this crate is the internal
//! boundary between the query coordinator and shard storage.

mod frame;
mod shard;

pub use frame::{recv_message, send_message, FrameError, MAX_FRAME_BYTES};
pub use shard::{FilterWire, RecordWire, ShardRequest, ShardResponse, TierWire};
