//! # Persistence
//!
//! Binary formats for the graph index, the vector index and the word
//! embedding cache, plus the JSON LLM side table. Every file lives under the
//! store's activations directory and is written atomically.
//!
//! The graph and vector indexes are bincode bodies framed by a magic header,
//! a version byte and an xxh64 checksum. The embedding cache is a fixed
//! little-endian layout read in place through bytemuck.
//!
//! Decoding fails fast: a bad header, a checksum mismatch or a truncated
//! file is an `InvalidFormat` error, and the fix is to rebuild the
//! file with a sync, never to recover part of it.

pub mod codec;
pub mod embedding_cache;
pub mod graph_index;
pub mod llm_cache;
pub mod vector_index;

use chrono::{DateTime, Utc};

use crate::Result;

pub use embedding_cache::{EmbeddingIndex, VectorView};
pub use graph_index::GraphIndex;
pub use llm_cache::{LlmCache, LlmCacheEntry, RefreshStats};
pub use vector_index::VectorIndex;

/// Soft budget for loading the graph index (~10k documents).
pub(crate) const LOAD_BUDGET_MS: u128 = 50;

/// Soft budget for rebuilding the graph from the document store.
pub(crate) const REBUILD_BUDGET_MS: u128 = 1000;

pub(crate) fn millis_to_datetime(ms: i64, what: &'static str) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| codec::invalid(what, format!("timestamp {ms} out of range")))
}
