//! Per-Neurona embedding vectors with a build timestamp.
//!
//! Framed by [`codec`](super::codec) as `"ENGRAM_VECS"`, a version byte and a
//! bincode body:
//!
//! ```text
//! built_at   i64 unix ms
//! source     u64 fingerprint of the embedding cache the vectors came from
//! dimension  u32
//! vectors    {id: [f32; dimension]}   ids ascending
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::codec::{decode, encode, invalid, write_atomic};
use super::embedding_cache::EmbeddingIndex;
use super::millis_to_datetime;
use crate::model::NeuronaSet;
use crate::retrieval::vector::embed_text;
use crate::{Error, Result};

pub const MAGIC: &[u8; 11] = b"ENGRAM_VECS";
pub const VERSION: u8 = 2;

const WHAT: &str = "vector index";

/// On-disk body. `M` is borrowed when writing and owned when reading.
#[derive(Debug, Serialize, Deserialize)]
struct VectorBody<M> {
    built_at: i64,
    source: u64,
    dimension: u32,
    vectors: M,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    pub built_at: DateTime<Utc>,
    dimension: usize,
    source: u64,
    vectors: BTreeMap<String, Vec<f32>>,
}

impl VectorIndex {
    pub fn new(dimension: usize, built_at: DateTime<Utc>) -> Self {
        Self { built_at, dimension, source: 0, vectors: BTreeMap::new() }
    }

    /// Tag the index with the fingerprint of the embeddings it was built from.
    pub fn with_source(mut self, source: u64) -> Self {
        self.source = source;
        self
    }

    /// Embed every Neurona's searchable text. Neuronas with no in-vocabulary
    /// token get no vector.
    pub fn build(neuronas: &NeuronaSet, embeddings: &EmbeddingIndex) -> Self {
        let mut index = Self::new(embeddings.dimension(), Utc::now()).with_source(embeddings.fingerprint());
        for (id, neurona) in neuronas {
            if let Some(v) = embed_text(&neurona.searchable_text(), embeddings) {
                index.vectors.insert(id.clone(), v);
            }
        }
        info!(
            embedded = index.len(),
            total = neuronas.len(),
            dimension = index.dimension,
            "built vector index"
        );
        index
    }

    pub fn insert(&mut self, id: impl Into<String>, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::Validation(format!(
                "vector has dimension {}, index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        self.vectors.insert(id.into(), vector);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.vectors.get(id).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.vectors.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn source(&self) -> u64 {
        self.source
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Stale iff built before the newest source modification.
    /// Compared in whole milliseconds, the resolution stored on disk.
    pub fn is_stale(&self, newest: Option<DateTime<Utc>>) -> bool {
        newest.is_some_and(|n| self.built_at.timestamp_millis() < n.timestamp_millis())
    }

    /// Usable as-is: fresh, and built from exactly these embeddings.
    pub fn is_current(&self, newest: Option<DateTime<Utc>>, embeddings: &EmbeddingIndex) -> bool {
        !self.is_stale(newest)
            && self.dimension == embeddings.dimension()
            && self.source == embeddings.fingerprint()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = VectorBody {
            built_at: self.built_at.timestamp_millis(),
            source: self.source,
            dimension: u32::try_from(self.dimension)
                .map_err(|_| Error::Validation(format!("dimension {} too large", self.dimension)))?,
            vectors: &self.vectors,
        };
        encode(MAGIC, VERSION, &body, WHAT)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let body: VectorBody<BTreeMap<String, Vec<f32>>> = decode(data, MAGIC, VERSION, WHAT)?;
        let dimension = body.dimension as usize;
        if let Some((id, v)) = body.vectors.iter().find(|(_, v)| v.len() != dimension) {
            return Err(invalid(WHAT, format!("'{id}' has dimension {}, expected {dimension}", v.len())));
        }
        Ok(Self {
            built_at: millis_to_datetime(body.built_at, WHAT)?,
            dimension,
            source: body.source,
            vectors: body.vectors,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_bytes()?)?;
        debug!(path = %path.display(), vectors = self.len(), "saved vector index");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let index = Self::from_bytes(&data)?;
        debug!(path = %path.display(), vectors = index.len(), built_at = %index.built_at, "loaded vector index");
        Ok(index)
    }
}
