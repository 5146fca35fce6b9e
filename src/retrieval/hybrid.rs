//! Weighted fusion of lexical and vector scores.
//!
//! Normalization: BM25 scores are divided by the best BM25 score in the
//! candidate set, so they land in (0, 1]; cosine similarities are clamped to
//! [0, 1]. Then `fused = w_text·text + w_vector·vector`, where a document
//! missing from one list contributes 0 for it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub text: f32,
    pub vector: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { text: 0.6, vector: 0.4 }
    }
}

/// One fused row with its normalized components.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedScore {
    pub id: String,
    pub fused: f32,
    pub text: f32,
    pub vector: f32,
}

/// Divide by the maximum so the best hit scores 1.
pub fn normalize_max(scores: &[(String, f32)]) -> Vec<(String, f32)> {
    let max = scores.iter().map(|(_, s)| *s).fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }
    scores.iter().map(|(id, s)| (id.clone(), s / max)).collect()
}

pub fn clamp_unit(scores: &[(String, f32)]) -> Vec<(String, f32)> {
    scores.iter().map(|(id, s)| (id.clone(), s.clamp(0.0, 1.0))).collect()
}

/// Fuse raw BM25 and cosine rankings. Rows with a fused score of 0 are
/// dropped; the rest are ordered by fused score, then id.
pub fn fuse(bm25: &[(String, f32)], cosine: &[(String, f32)], weights: FusionWeights) -> Vec<FusedScore> {
    let mut parts: BTreeMap<&str, (f32, f32)> = BTreeMap::new();
    let text = normalize_max(bm25);
    let vector = clamp_unit(cosine);
    for (id, s) in &text {
        parts.entry(id.as_str()).or_default().0 = *s;
    }
    for (id, s) in &vector {
        parts.entry(id.as_str()).or_default().1 = *s;
    }

    let mut out: Vec<FusedScore> = parts
        .into_iter()
        .map(|(id, (t, v))| FusedScore {
            id: id.to_string(),
            fused: weights.text * t + weights.vector * v,
            text: t,
            vector: v,
        })
        .filter(|row| row.fused > 0.0)
        .collect();
    out.sort_by(|a, b| b.fused.total_cmp(&a.fused).then_with(|| a.id.cmp(&b.id)));
    out
}
