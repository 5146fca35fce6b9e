//! # Retrieval
//!
//! Five query modes over one Neurona set:
//!
//! | Mode | Ranking |
//! |------|---------|
//! | `filter` | EQL / natural-language predicate, ordered by id |
//! | `text` | BM25 |
//! | `vector` | cosine similarity of averaged word embeddings |
//! | `hybrid` | weighted sum of normalized BM25 and cosine |
//! | `activation` | text (or hybrid) stimulus spread over graph edges |
//!
//! A [`FilterSet`] is applied before ranking in every mode. Results are
//! always complete and bounded by `limit`; any failure aborts the query.

pub mod activation;
pub mod bm25;
pub mod filter;
pub mod hybrid;
pub mod vector;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::graph::Graph;
use crate::model::{NeuronaSet, NeuronaType};
use crate::persist::{EmbeddingIndex, VectorIndex};
use crate::{Error, Result, eql};

pub use activation::{Activation, ActivationParams, activate};
pub use bm25::{Bm25Index, Bm25Params};
pub use filter::{ConnectionFilter, FieldFilter, FieldOp, FilterField, FilterSet, TagFilter, TypeFilter};
pub use hybrid::{FusedScore, FusionWeights, fuse};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    #[default]
    Filter,
    Text,
    Vector,
    Hybrid,
    Activation,
}

impl QueryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryMode::Filter => "filter",
            QueryMode::Text => "text",
            QueryMode::Vector => "vector",
            QueryMode::Hybrid => "hybrid",
            QueryMode::Activation => "activation",
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "filter" => Ok(QueryMode::Filter),
            "text" | "bm25" => Ok(QueryMode::Text),
            "vector" => Ok(QueryMode::Vector),
            "hybrid" => Ok(QueryMode::Hybrid),
            "activation" => Ok(QueryMode::Activation),
            _ => Err(Error::UnknownType { kind: "query mode", value: s.to_string() }),
        }
    }
}

/// One query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub mode: QueryMode,
    pub query: String,
    /// Falls back to the configured default.
    pub limit: Option<usize>,
    #[serde(default)]
    pub filters: FilterSet,
}

impl QueryRequest {
    pub fn new(mode: QueryMode, query: impl Into<String>) -> Self {
        Self { mode, query: query.into(), limit: None, filters: FilterSet::default() }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }
}

/// Mode-specific part of a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HitDetail {
    Filter,
    Text { bm25: f32 },
    Vector { similarity: f32 },
    Hybrid { text: f32, vector: f32 },
    Activation { stimulus: f32, propagated: f32 },
}

/// One result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    pub id: String,
    #[serde(rename = "type")]
    pub neurona_type: NeuronaType,
    pub title: String,
    /// Absent in filter mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(flatten)]
    pub detail: HitDetail,
}

/// Sort by score descending, then id ascending.
pub(crate) fn rank(rows: &mut [(String, f32)]) {
    rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

/// Borrowed view of everything a query needs.
pub struct RetrievalEngine<'a> {
    neuronas: &'a NeuronaSet,
    graph: &'a Graph,
    vectors: Option<&'a VectorIndex>,
    embeddings: Option<&'a EmbeddingIndex>,
    config: &'a RetrievalConfig,
}

impl<'a> RetrievalEngine<'a> {
    pub fn new(neuronas: &'a NeuronaSet, graph: &'a Graph, config: &'a RetrievalConfig) -> Self {
        Self { neuronas, graph, vectors: None, embeddings: None, config }
    }

    /// Enable vector and hybrid modes.
    pub fn with_vectors(mut self, vectors: &'a VectorIndex, embeddings: &'a EmbeddingIndex) -> Self {
        self.vectors = Some(vectors);
        self.embeddings = Some(embeddings);
        self
    }

    pub fn run(&self, req: &QueryRequest) -> Result<Vec<QueryHit>> {
        let limit = req.limit.unwrap_or(self.config.limit);
        let mut hits = match req.mode {
            QueryMode::Filter => self.run_filter(req)?,
            QueryMode::Text => self.run_text(req),
            QueryMode::Vector => self.run_vector(req)?,
            QueryMode::Hybrid => self.run_hybrid(req)?,
            QueryMode::Activation => self.run_activation(req)?,
        };
        hits.truncate(limit);
        debug!(mode = %req.mode, query = %req.query, hits = hits.len(), limit, "query complete");
        Ok(hits)
    }

    fn hit(&self, id: &str, score: Option<f32>, detail: HitDetail) -> Option<QueryHit> {
        let n = self.neuronas.get(id)?;
        Some(QueryHit {
            id: n.id.clone(),
            neurona_type: n.neurona_type,
            title: n.title.clone(),
            score,
            detail,
        })
    }

    fn admitted(&self, id: &str, filters: &FilterSet) -> bool {
        self.neuronas.get(id).is_some_and(|n| filters.matches(n))
    }

    fn run_filter(&self, req: &QueryRequest) -> Result<Vec<QueryHit>> {
        let predicate = if req.query.trim().is_empty() {
            None
        } else {
            match eql::compile(&req.query)? {
                Some(ast) => Some(ast),
                None => {
                    debug!(query = %req.query, "no recognizable condition, empty result");
                    return Ok(Vec::new());
                }
            }
        };
        Ok(self
            .neuronas
            .values()
            .filter(|n| req.filters.matches(n))
            .filter(|n| predicate.as_ref().is_none_or(|ast| filter::evaluate(ast, n)))
            .filter_map(|n| self.hit(&n.id, None, HitDetail::Filter))
            .collect())
    }

    fn bm25(&self, req: &QueryRequest) -> Vec<(String, f32)> {
        let params = Bm25Params { k1: self.config.bm25_k1, b: self.config.bm25_b };
        // idf is computed over the full corpus; filters only remove rows.
        let index = Bm25Index::build(self.neuronas.values(), params);
        let mut scores = index.search(&req.query);
        scores.retain(|(id, _)| self.admitted(id, &req.filters));
        scores
    }

    fn indexes(&self) -> Result<(&'a VectorIndex, &'a EmbeddingIndex)> {
        match (self.vectors, self.embeddings) {
            (Some(v), Some(e)) => Ok((v, e)),
            _ => Err(Error::IndexUnavailable(
                "vector index or embedding cache missing; run sync with an embedding cache".into(),
            )),
        }
    }

    fn cosine(&self, req: &QueryRequest) -> Result<Vec<(String, f32)>> {
        let (vectors, embeddings) = self.indexes()?;
        let Some(query_vec) = vector::embed_text(&req.query, embeddings) else {
            debug!(query = %req.query, "no query token in vocabulary");
            return Ok(Vec::new());
        };
        let mut scores = vector::search(&query_vec, vectors);
        scores.retain(|(id, _)| self.admitted(id, &req.filters));
        Ok(scores)
    }

    fn run_text(&self, req: &QueryRequest) -> Vec<QueryHit> {
        self.bm25(req)
            .into_iter()
            .filter_map(|(id, s)| self.hit(&id, Some(s), HitDetail::Text { bm25: s }))
            .collect()
    }

    fn run_vector(&self, req: &QueryRequest) -> Result<Vec<QueryHit>> {
        Ok(self
            .cosine(req)?
            .into_iter()
            .filter_map(|(id, s)| self.hit(&id, Some(s), HitDetail::Vector { similarity: s }))
            .collect())
    }

    fn fused(&self, req: &QueryRequest) -> Result<Vec<FusedScore>> {
        let cosine = self.cosine(req)?;
        let weights = FusionWeights { text: self.config.text_weight, vector: self.config.vector_weight };
        Ok(fuse(&self.bm25(req), &cosine, weights))
    }

    fn run_hybrid(&self, req: &QueryRequest) -> Result<Vec<QueryHit>> {
        Ok(self
            .fused(req)?
            .into_iter()
            .filter_map(|f| {
                self.hit(&f.id, Some(f.fused), HitDetail::Hybrid { text: f.text, vector: f.vector })
            })
            .collect())
    }

    fn run_activation(&self, req: &QueryRequest) -> Result<Vec<QueryHit>> {
        let stimuli: Vec<(String, f32)> = if self.indexes().is_ok() {
            self.fused(req)?.into_iter().map(|f| (f.id, f.fused)).collect()
        } else {
            hybrid::normalize_max(&self.bm25(req))
        };
        let params = ActivationParams {
            depth: self.config.activation_depth,
            decay: self.config.activation_decay,
        };
        Ok(activate(self.graph, &stimuli, params)
            .into_iter()
            .filter(|a| self.admitted(&a.id, &req.filters))
            .filter_map(|a| {
                let detail = HitDetail::Activation { stimulus: a.stimulus, propagated: a.propagated };
                self.hit(&a.id, Some(a.score()), detail)
            })
            .collect())
    }
}
