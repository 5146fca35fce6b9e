//! Index maintenance.
//!
//! `sync` brings every persisted file under the activations directory up to
//! date with the store. A file is rewritten only when it is missing,
//! unreadable, or older than the newest Neurona, unless `force` is set. The
//! vector index is also rewritten when the embedding cache it was built from
//! has changed.
//! The LLM cache is refreshed on every run.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::persist::{EmbeddingIndex, GraphIndex, LlmCache, RefreshStats, VectorIndex};
use crate::storage::NeuronaStore;
use crate::{Error, Result, rebuild_graph};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Rewrite indexes even when they look fresh.
    pub force: bool,
}

/// What a sync did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub neuronas: usize,
    pub graph_rebuilt: bool,
    /// `None` when there is no embedding cache to build vectors from.
    pub vectors_rebuilt: Option<bool>,
    pub llm_cache: RefreshStats,
    pub elapsed_ms: u128,
}

pub fn sync(store: &impl NeuronaStore, root: &Path, config: &Config, opts: SyncOptions) -> Result<SyncReport> {
    config.validate()?;
    let start = Instant::now();
    let paths = &config.paths;
    let neuronas = store.load_all()?;
    let newest = store.newest_modification()?;

    let graph_path = paths.graph_index(root);
    let graph_fresh = !opts.force && reusable(GraphIndex::load(&graph_path), &graph_path, |idx| !idx.is_stale(newest))?;
    if !graph_fresh {
        GraphIndex::new(rebuild_graph(&neuronas), Utc::now()).save(&graph_path)?;
    }

    let cache_path = paths.embedding_cache(root);
    let vectors_rebuilt = if cache_path.exists() {
        let embeddings = EmbeddingIndex::load(&cache_path)?;
        let vector_path = paths.vector_index(root);
        let fresh = !opts.force
            && reusable(VectorIndex::load(&vector_path), &vector_path, |idx| idx.is_current(newest, &embeddings))?;
        if !fresh {
            VectorIndex::build(&neuronas, &embeddings).save(&vector_path)?;
        }
        Some(!fresh)
    } else {
        None
    };

    let llm_path = paths.llm_cache(root);
    let mut llm = match LlmCache::load(&llm_path) {
        Ok(cache) => cache,
        Err(Error::Json(e)) => {
            warn!(path = %llm_path.display(), error = %e, "unreadable llm cache, starting over");
            LlmCache::default()
        }
        Err(e) => return Err(e),
    };
    let llm_cache = llm.refresh(&neuronas);
    llm.save(&llm_path)?;

    let report = SyncReport {
        neuronas: neuronas.len(),
        graph_rebuilt: !graph_fresh,
        vectors_rebuilt,
        llm_cache,
        elapsed_ms: start.elapsed().as_millis(),
    };
    info!(
        neuronas = report.neuronas,
        graph_rebuilt = report.graph_rebuilt,
        vectors_rebuilt = ?report.vectors_rebuilt,
        llm_updated = llm_cache.updated,
        llm_removed = llm_cache.removed,
        elapsed_ms = report.elapsed_ms,
        "sync complete"
    );
    Ok(report)
}

/// Decide whether a persisted file can stay. Missing or corrupt files are
/// rebuilt; any other load error is returned.
fn reusable<T>(loaded: Result<T>, path: &Path, fresh: impl FnOnce(&T) -> bool) -> Result<bool> {
    match loaded {
        Ok(index) => Ok(fresh(&index)),
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(Error::InvalidFormat { what, message }) => {
            warn!(path = %path.display(), what, %message, "replacing unreadable index");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Convert a GloVe text file into the binary embedding cache under `root`.
pub fn build_embedding_cache(glove_path: &Path, root: &Path, config: &Config) -> Result<EmbeddingIndex> {
    let start = Instant::now();
    let text = std::fs::read_to_string(glove_path)?;
    let index = EmbeddingIndex::from_glove_text(&text)?;
    let path = config.paths.embedding_cache(root);
    index.save(&path)?;
    debug!(path = %path.display(), elapsed_ms = start.elapsed().as_millis(), "wrote embedding cache");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Neurona, NeuronaType};
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;

    fn store() -> MemoryStore {
        MemoryStore::with_neuronas([
            Neurona::new("a", "Alpha", NeuronaType::Concept),
            Neurona::new("b", "Beta", NeuronaType::Concept),
        ])
        .unwrap()
    }

    #[test]
    fn test_second_sync_reuses_graph() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let s = store();
        let first = sync(&s, dir.path(), &config, SyncOptions::default()).unwrap();
        assert!(first.graph_rebuilt);
        assert_eq!(first.vectors_rebuilt, None);
        assert_eq!(first.llm_cache.updated, 2);

        let second = sync(&s, dir.path(), &config, SyncOptions::default()).unwrap();
        assert!(!second.graph_rebuilt);
        assert_eq!(second.llm_cache, RefreshStats::default());

        let forced = sync(&s, dir.path(), &config, SyncOptions { force: true }).unwrap();
        assert!(forced.graph_rebuilt);
    }

    #[test]
    fn test_corrupt_graph_index_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let path = config.paths.graph_index(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"garbage").unwrap();

        let report = sync(&store(), dir.path(), &config, SyncOptions::default()).unwrap();
        assert!(report.graph_rebuilt);
        assert!(GraphIndex::load(&path).is_ok());
    }

    #[test]
    fn test_build_embedding_cache_from_glove() {
        let dir = tempfile::tempdir().unwrap();
        let glove = dir.path().join("glove.txt");
        std::fs::write(&glove, "alpha 1.0 0.0\nbeta 0.0 1.0\n").unwrap();
        let config = Config::default();
        let index = build_embedding_cache(&glove, dir.path(), &config).unwrap();
        assert_eq!((index.len(), index.dimension()), (2, 2));

        let s = store();
        let report = sync(&s, dir.path(), &config, SyncOptions::default()).unwrap();
        assert_eq!(report.vectors_rebuilt, Some(true));
        let report = sync(&s, dir.path(), &config, SyncOptions::default()).unwrap();
        assert_eq!(report.vectors_rebuilt, Some(false));
    }
}
