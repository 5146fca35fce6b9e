//! Engine configuration.
//!
//! Loaded from a JSON file. Every field has a default, so a partial file
//! (or `{}`) is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retrieval: RetrievalConfig,
    pub trace: TraceConfig,
    pub paths: PathsConfig,
}

impl Config {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Reject settings that would make ranking meaningless.
    pub fn validate(&self) -> Result<()> {
        self.retrieval.validate()?;
        if self.paths.activations_dir.as_os_str().is_empty() {
            return Err(Error::Config("paths.activations_dir must not be empty".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Retrieval
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum rows returned when the request does not say.
    pub limit: usize,
    pub text_weight: f32,
    pub vector_weight: f32,
    pub bm25_k1: f32,
    pub bm25_b: f32,
    /// Propagation hops for activation mode.
    pub activation_depth: usize,
    /// Multiplier applied per hop, in [0, 1].
    pub activation_decay: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            text_weight: 0.6,
            vector_weight: 0.4,
            bm25_k1: 1.2,
            bm25_b: 0.75,
            activation_depth: 2,
            activation_decay: 0.7,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(Error::Config("retrieval.limit must be > 0".into()));
        }
        if !(self.text_weight >= 0.0 && self.vector_weight >= 0.0) {
            return Err(Error::Config(format!(
                "retrieval weights must be non-negative, got text={} vector={}",
                self.text_weight, self.vector_weight
            )));
        }
        if !(0.0..=1.0).contains(&self.activation_decay) {
            return Err(Error::Config(format!(
                "retrieval.activation_decay must be in [0, 1], got {}",
                self.activation_decay
            )));
        }
        if !(self.bm25_k1 >= 0.0) || !(0.0..=1.0).contains(&self.bm25_b) {
            return Err(Error::Config("retrieval.bm25_k1 must be >= 0 and bm25_b in [0, 1]".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Trace
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub max_depth: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self { max_depth: 3 }
    }
}

// ============================================================================
// Paths
// ============================================================================

/// File names of the persisted indexes, relative to the store root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub activations_dir: PathBuf,
    pub graph_index: String,
    pub vector_index: String,
    pub embedding_cache: String,
    pub llm_cache: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            activations_dir: PathBuf::from(".activations"),
            graph_index: "graph.idx".into(),
            vector_index: "vectors.idx".into(),
            embedding_cache: "glove_cache.bin".into(),
            llm_cache: "cache.json".into(),
        }
    }
}

impl PathsConfig {
    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(&self.activations_dir)
    }

    pub fn graph_index(&self, root: &Path) -> PathBuf {
        self.dir(root).join(&self.graph_index)
    }

    pub fn vector_index(&self, root: &Path) -> PathBuf {
        self.dir(root).join(&self.vector_index)
    }

    pub fn embedding_cache(&self, root: &Path) -> PathBuf {
        self.dir(root).join(&self.embedding_cache)
    }

    pub fn llm_cache(&self, root: &Path) -> PathBuf {
        self.dir(root).join(&self.llm_cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.text_weight, 0.6);
        assert_eq!(config.retrieval.activation_decay, 0.7);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"retrieval": {{"limit": 5}}}}"#).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.retrieval.limit, 5);
        assert_eq!(config.retrieval.bm25_k1, 1.2);
        assert_eq!(config.trace.max_depth, 3);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut config = Config::default();
        config.retrieval.activation_decay = 1.5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.retrieval.text_weight = -0.1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retrieval.limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(Config::load(file.path()), Err(Error::Json(_))));
    }

    #[test]
    fn test_index_paths_live_under_activations() {
        let paths = PathsConfig::default();
        let root = Path::new("/kb");
        assert_eq!(paths.graph_index(root), PathBuf::from("/kb/.activations/graph.idx"));
    }
}
