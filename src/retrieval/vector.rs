//! Embedding-based similarity.

use crate::persist::{EmbeddingIndex, VectorIndex};

use super::bm25::tokenize;

/// Cosine similarity; 0 for mismatched, empty or zero vectors.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON { 0.0 } else { dot / denom }
}

/// Mean of the embeddings of `text`'s tokens. Out-of-vocabulary tokens are
/// skipped; `None` if no token is known.
pub fn embed_text(text: &str, embeddings: &EmbeddingIndex) -> Option<Vec<f32>> {
    let mut sum = vec![0.0f32; embeddings.dimension()];
    let mut known = 0usize;
    for token in tokenize(text) {
        if let Some(view) = embeddings.get(&token) {
            for (acc, x) in sum.iter_mut().zip(view.iter()) {
                *acc += x;
            }
            known += 1;
        }
    }
    if known == 0 {
        return None;
    }
    let n = known as f32;
    sum.iter_mut().for_each(|x| *x /= n);
    Some(sum)
}

/// Cosine similarity of `query` against every stored vector, highest first,
/// ties by id. Non-positive similarities are dropped.
pub fn search(query: &[f32], index: &VectorIndex) -> Vec<(String, f32)> {
    let mut scored: Vec<(String, f32)> = index
        .iter()
        .filter_map(|(id, v)| {
            let sim = cosine_similarity(query, v);
            (sim > 0.0).then(|| (id.to_string(), sim))
        })
        .collect();
    super::rank(&mut scored);
    scored
}
