//! End-to-end tests for the persisted binary formats.
//!
//! Every file is written to a temp directory through the public save/load
//! API, then read back or deliberately damaged.

use chrono::DateTime;
use engram::persist::{graph_index, vector_index};
use engram::{
    ConnectionType, EmbeddingIndex, Error, Graph, GraphIndex, Neurona, NeuronaType, VectorIndex,
};
use engram::model::neurona_set;
use pretty_assertions::assert_eq;

fn sample_graph() -> Graph {
    let set = neurona_set([
        Neurona::new("req.auth", "Auth", NeuronaType::Requirement),
        Neurona::new("test.auth", "Auth test", NeuronaType::TestCase)
            .with_connection("req.auth", ConnectionType::Validates, 90),
        Neurona::new("issue.db", "DB", NeuronaType::Issue)
            .with_connection("req.auth", ConnectionType::Blocks, 100)
            .with_connection("test.auth", ConnectionType::Related, 5),
    ]);
    Graph::from_neuronas(set.values())
}

fn glove() -> EmbeddingIndex {
    EmbeddingIndex::from_glove_text(
        "the 0.418 0.24968 -0.41242\n\
         login 1.0 0.0 0.0\n\
         database -0.5 0.25 1e-3\n\
         zebra NaN -0.0 3.4028235e38\n",
    )
    .unwrap()
}

// ============================================================================
// 1. Graph index
// ============================================================================

#[test]
fn test_graph_index_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.idx");
    let built_at = DateTime::from_timestamp_millis(1_700_000_123_456).unwrap();

    GraphIndex::new(sample_graph(), built_at).save(&path).unwrap();
    let loaded = GraphIndex::load(&path).unwrap();

    assert_eq!(loaded.built_at, built_at);
    assert_eq!(loaded.graph.edges(), sample_graph().edges());
    assert_eq!(loaded.graph.incoming("req.auth").len(), 2);
}

#[test]
fn test_graph_index_rejects_bad_magic_and_truncation() {
    let bytes = GraphIndex::new(sample_graph(), DateTime::UNIX_EPOCH).to_bytes().unwrap();
    assert!(bytes.starts_with(graph_index::MAGIC));

    let mut bad = bytes.clone();
    bad[0] = b'X';
    assert!(matches!(GraphIndex::from_bytes(&bad), Err(Error::InvalidFormat { .. })));

    let mut version = bytes.clone();
    version[graph_index::MAGIC.len()] = graph_index::VERSION + 1;
    assert!(matches!(GraphIndex::from_bytes(&version), Err(Error::InvalidFormat { .. })));

    for cut in [0, 5, bytes.len() / 2, bytes.len() - 1] {
        let err = GraphIndex::from_bytes(&bytes[..cut]).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat { what: "graph index", .. }), "cut at {cut}");
    }
}

#[test]
fn test_graph_index_rejects_flipped_body_byte() {
    let mut bytes = GraphIndex::new(sample_graph(), DateTime::UNIX_EPOCH).to_bytes().unwrap();
    let mid = graph_index::MAGIC.len() + 1 + (bytes.len() - graph_index::MAGIC.len() - 9) / 2;
    bytes[mid] ^= 0x40;
    let err = GraphIndex::from_bytes(&bytes).unwrap_err();
    assert!(err.to_string().contains("checksum"), "{err}");
}

// ============================================================================
// 2. Embedding cache
// ============================================================================

#[test]
fn test_embedding_cache_is_bit_identical_after_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("glove_cache.bin");
    let original = glove();
    original.save(&path).unwrap();
    let loaded = EmbeddingIndex::load(&path).unwrap();

    assert_eq!(loaded.dimension(), 3);
    assert_eq!(loaded.len(), 4);
    for word in original.words() {
        let a: Vec<u32> = original.get(word).unwrap().iter().map(f32::to_bits).collect();
        let b: Vec<u32> = loaded.get(word).unwrap().iter().map(f32::to_bits).collect();
        assert_eq!(a, b, "{word}");
    }
    assert!(loaded.get("zebra").unwrap().get(0).unwrap().is_nan());
    assert!(loaded.get("aardvark").is_none());
}

#[test]
fn test_truncated_embedding_cache_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("glove_cache.bin");
    let full = glove().as_bytes().to_vec();
    std::fs::write(&path, &full[..full.len() - 4]).unwrap();

    let err = EmbeddingIndex::load(&path).unwrap_err();
    assert!(matches!(err, Error::InvalidFormat { what: "embedding cache", .. }));
    assert!(err.to_string().contains("rebuild"));
}

#[test]
fn test_embedding_cache_rejects_ragged_glove() {
    let err = EmbeddingIndex::from_glove_text("a 1.0 2.0\nb 1.0\n").unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

// ============================================================================
// 3. Vector index
// ============================================================================

#[test]
fn test_vector_index_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.idx");
    let set = neurona_set([
        Neurona::new("a", "login database", NeuronaType::Concept),
        Neurona::new("b", "nothing known", NeuronaType::Concept),
    ]);
    let index = VectorIndex::build(&set, &glove());
    assert_eq!(index.len(), 1);
    index.save(&path).unwrap();

    let loaded = VectorIndex::load(&path).unwrap();
    assert_eq!((loaded.len(), loaded.dimension()), (1, 3));
    assert_eq!(loaded.built_at.timestamp_millis(), index.built_at.timestamp_millis());
    assert_eq!(loaded.get("a").unwrap(), &[0.25, 0.125, 0.0005][..]);

    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(vector_index::MAGIC));
}

#[test]
fn test_vector_index_staleness() {
    let built = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let index = VectorIndex::new(3, built);
    assert!(!index.is_stale(None));
    assert!(!index.is_stale(Some(built)));
    assert!(index.is_stale(Some(built + chrono::Duration::seconds(1))));
}
