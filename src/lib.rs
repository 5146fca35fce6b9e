//! # engram: Local-First Knowledge Graph Engine
//!
//! Typed, tagged Neuronas joined by typed weighted connections, with five
//! retrieval modes and dependency tracing over the link graph.
//!
//! ## Design Principles
//!
//! 1. **Store-agnostic**: `NeuronaStore` is the only contract with whatever
//!    holds the documents
//! 2. **Typed edges, erased graph**: filters read each Neurona's typed
//!    connections; traversal and activation read the type-erased `Graph`
//! 3. **Parser owns nothing**: EQL → AST is a pure function
//! 4. **All or nothing**: a query returns a complete result set or an error
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use engram::{Config, Cortex, MemoryStore, Neurona, NeuronaType, ConnectionType};
//! use engram::retrieval::{QueryMode, QueryRequest};
//!
//! # fn example() -> engram::Result<()> {
//! let store = MemoryStore::new();
//! store.create(Neurona::new("req.auth", "Login", NeuronaType::Requirement))?;
//! store.create(Neurona::new("test.auth", "Login test", NeuronaType::TestCase))?;
//! store.link("test.auth", "req.auth", ConnectionType::Validates, 90)?;
//!
//! let cortex = Cortex::from_store(&store, Config::default())?;
//! let hits = cortex.query(&QueryRequest::new(QueryMode::Filter, "type:test_case"))?;
//! assert_eq!(hits[0].id, "test.auth");
//! # Ok(())
//! # }
//! ```
//!
//! ## Persisted Files
//!
//! | File | Module | Rebuilt when |
//! |------|--------|--------------|
//! | graph index | `persist::graph_index` | missing or older than the newest Neurona |
//! | vector index | `persist::vector_index` | missing or older than the newest Neurona |
//! | embedding cache | `persist::embedding_cache` | built once from GloVe text |
//! | LLM cache | `persist::llm_cache` | refreshed on every sync |
//!
//! There is no locking between processes: two commands against the same
//! store may race on these files.

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod eql;
pub mod graph;
pub mod model;
pub mod persist;
pub mod retrieval;
pub mod storage;
pub mod sync;

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

// ============================================================================
// Re-exports
// ============================================================================

pub use config::Config;
pub use graph::{
    Graph, ImpactOptions, ImpactReport, TraceDirection, TraceFormat, TraceNode, TraceOptions,
};
pub use model::{
    Connection, ConnectionType, Context, LlmMetadata, Neurona, NeuronaSet, NeuronaType, Value,
};
pub use persist::{EmbeddingIndex, GraphIndex, VectorIndex};
pub use retrieval::{QueryHit, QueryMode, QueryRequest, RetrievalEngine};
pub use storage::{MemoryStore, NeuronaStore};
pub use sync::{SyncOptions, SyncReport, sync};

// ============================================================================
// Top-level handle
// ============================================================================

/// Everything one invocation needs, loaded once and dropped together.
#[derive(Debug, Clone)]
pub struct Cortex {
    neuronas: NeuronaSet,
    graph: Graph,
    vectors: Option<VectorIndex>,
    embeddings: Option<EmbeddingIndex>,
    config: Config,
}

/// Store overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub total: usize,
    pub by_type: BTreeMap<NeuronaType, usize>,
    pub graph_nodes: usize,
    pub graph_edges: usize,
    /// Neuronas with no connection in either direction, by id.
    pub orphans: Vec<String>,
    pub vectors: Option<usize>,
    pub embedding_words: Option<usize>,
}

impl Cortex {
    /// Build everything in memory from `store`; nothing is read from or
    /// written to disk.
    pub fn from_store(store: &impl NeuronaStore, config: Config) -> Result<Self> {
        config.validate()?;
        let neuronas = store.load_all()?;
        let graph = rebuild_graph(&neuronas);
        Ok(Self { neuronas, graph, vectors: None, embeddings: None, config })
    }

    /// Load from `store`, reusing the persisted indexes under `root` when
    /// they are fresh. Stale or missing indexes are rebuilt in memory only;
    /// `sync` is what writes them back. A corrupt index file is an error.
    pub fn open(store: &impl NeuronaStore, root: &Path, config: Config) -> Result<Self> {
        config.validate()?;
        let neuronas = store.load_all()?;
        let newest = store.newest_modification()?;
        let paths = &config.paths;

        let graph_path = paths.graph_index(root);
        let graph = if graph_path.exists() {
            let index = GraphIndex::load(&graph_path)?;
            if index.is_stale(newest) {
                debug!(built_at = %index.built_at, "graph index stale");
                rebuild_graph(&neuronas)
            } else {
                index.graph
            }
        } else {
            debug!(path = %graph_path.display(), "no graph index");
            rebuild_graph(&neuronas)
        };

        let cache_path = paths.embedding_cache(root);
        let embeddings = if cache_path.exists() {
            Some(EmbeddingIndex::load(&cache_path)?)
        } else {
            None
        };

        let vector_path = paths.vector_index(root);
        let vectors = match &embeddings {
            Some(emb) => {
                let persisted = if vector_path.exists() {
                    Some(VectorIndex::load(&vector_path)?)
                } else {
                    None
                };
                match persisted {
                    Some(v) if v.is_current(newest, emb) => Some(v),
                    _ => {
                        debug!("vector index missing, stale or built from other embeddings, recomputing in memory");
                        Some(VectorIndex::build(&neuronas, emb))
                    }
                }
            }
            None => None,
        };

        Ok(Self { neuronas, graph, vectors, embeddings, config })
    }

    /// Run [`sync()`] and open over the refreshed files.
    pub fn sync(
        store: &impl NeuronaStore,
        root: &Path,
        config: Config,
        opts: SyncOptions,
    ) -> Result<(Self, SyncReport)> {
        let report = sync::sync(store, root, &config, opts)?;
        let cortex = Self::open(store, root, config)?;
        Ok((cortex, report))
    }

    /// Attach an embedding table and compute vectors for every Neurona.
    pub fn with_embeddings(mut self, embeddings: EmbeddingIndex) -> Self {
        self.vectors = Some(VectorIndex::build(&self.neuronas, &embeddings));
        self.embeddings = Some(embeddings);
        self
    }

    pub fn engine(&self) -> RetrievalEngine<'_> {
        let engine = RetrievalEngine::new(&self.neuronas, &self.graph, &self.config.retrieval);
        match (&self.vectors, &self.embeddings) {
            (Some(v), Some(e)) => engine.with_vectors(v, e),
            _ => engine,
        }
    }

    pub fn query(&self, req: &QueryRequest) -> Result<Vec<QueryHit>> {
        self.engine().run(req)
    }

    pub fn trace(&self, root: &str, opts: &TraceOptions) -> Result<Vec<TraceNode>> {
        graph::trace(&self.graph, &self.neuronas, root, opts)
    }

    pub fn impact(&self, root: &str, opts: &ImpactOptions) -> Result<ImpactReport> {
        graph::impact(&self.graph, &self.neuronas, root, opts)
    }

    /// Trace options with the configured default depth.
    pub fn trace_options(&self, direction: TraceDirection) -> TraceOptions {
        TraceOptions { direction, max_depth: self.config.trace.max_depth, ..Default::default() }
    }

    pub fn status(&self) -> Status {
        let mut by_type = BTreeMap::new();
        for n in self.neuronas.values() {
            *by_type.entry(n.neurona_type).or_insert(0) += 1;
        }
        Status {
            total: self.neuronas.len(),
            by_type,
            graph_nodes: self.graph.node_count(),
            graph_edges: self.graph.edge_count(),
            orphans: self.graph.orphans(&self.neuronas),
            vectors: self.vectors.as_ref().map(VectorIndex::len),
            embedding_words: self.embeddings.as_ref().map(EmbeddingIndex::len),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Neurona> {
        self.neuronas.get(id)
    }

    pub fn neuronas(&self) -> &NeuronaSet {
        &self.neuronas
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Flatten connections into a fresh graph, warning past the soft budget.
pub(crate) fn rebuild_graph(neuronas: &NeuronaSet) -> Graph {
    let start = Instant::now();
    let graph = Graph::from_neuronas(neuronas.values());
    let elapsed_ms = start.elapsed().as_millis();
    if elapsed_ms > persist::REBUILD_BUDGET_MS {
        warn!(elapsed_ms, budget_ms = persist::REBUILD_BUDGET_MS, "graph rebuild over budget");
    }
    info!(
        neuronas = neuronas.len(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        elapsed_ms,
        "rebuilt graph"
    );
    graph
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("EQL syntax error at position {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Unknown {kind}: '{value}'")]
    UnknownType { kind: &'static str, value: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Invalid {what}: {message}. Delete the file and run sync to rebuild it")]
    InvalidFormat { what: &'static str, message: String },

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
