//! Okapi BM25 over title, tags and body.
//!
//! ```text
//! idf(t)    = ln((N - df + 0.5) / (df + 0.5) + 1)
//! score(d)  = Σ idf(t) · tf·(k1 + 1) / (tf + k1·(1 - b + b·|d|/avgdl))
//! ```

use hashbrown::HashMap;

use crate::model::Neurona;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Lowercase and split on anything that is not alphanumeric or `_`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone)]
struct Doc {
    id: String,
    len: f32,
    tf: HashMap<String, u32>,
}

/// Term statistics for one corpus.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    params: Bm25Params,
    docs: Vec<Doc>,
    df: HashMap<String, u32>,
    avgdl: f32,
}

impl Bm25Index {
    pub fn build<'a>(neuronas: impl IntoIterator<Item = &'a Neurona>, params: Bm25Params) -> Self {
        let mut docs = Vec::new();
        let mut df: HashMap<String, u32> = HashMap::new();
        let mut total_len = 0usize;

        for neurona in neuronas {
            let tokens = tokenize(&neurona.searchable_text());
            total_len += tokens.len();
            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens.iter() {
                *tf.entry_ref(token.as_str()).or_default() += 1;
            }
            for term in tf.keys() {
                *df.entry_ref(term.as_str()).or_default() += 1;
            }
            docs.push(Doc { id: neurona.id.clone(), len: tokens.len() as f32, tf });
        }

        let avgdl = if docs.is_empty() { 0.0 } else { total_len as f32 / docs.len() as f32 };
        Self { params, docs, df, avgdl }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.docs.len() as f32;
        let df = self.df.get(term).copied().unwrap_or(0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Scores for every document with at least one query term, highest
    /// first, ties by id ascending. Repeated query terms count once.
    pub fn search(&self, query: &str) -> Vec<(String, f32)> {
        let mut terms = tokenize(query);
        terms.sort_unstable();
        terms.dedup();
        let idfs: Vec<(&str, f32)> = terms
            .iter()
            .filter(|t| self.df.contains_key(t.as_str()))
            .map(|t| (t.as_str(), self.idf(t)))
            .collect();
        if idfs.is_empty() {
            return Vec::new();
        }

        let Bm25Params { k1, b } = self.params;
        let mut scored: Vec<(String, f32)> = self
            .docs
            .iter()
            .filter_map(|doc| {
                let norm = if self.avgdl > 0.0 { doc.len / self.avgdl } else { 0.0 };
                let score: f32 = idfs
                    .iter()
                    .filter_map(|(term, idf)| {
                        let tf = *doc.tf.get(*term)? as f32;
                        Some(idf * tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * norm)))
                    })
                    .sum();
                (score > 0.0).then(|| (doc.id.clone(), score))
            })
            .collect();
        super::rank(&mut scored);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NeuronaType;

    fn corpus() -> Vec<Neurona> {
        vec![
            Neurona::new("a", "Auth token refresh", NeuronaType::Concept).with_body("refresh the auth token"),
            Neurona::new("b", "Database schema", NeuronaType::Concept).with_body("tables and indexes"),
            Neurona::new("c", "Auth overview", NeuronaType::Concept).with_body("login, sessions"),
        ]
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Auth-flow: token_refresh v2!"), vec!["auth", "flow", "token_refresh", "v2"]);
    }

    #[test]
    fn test_term_frequency_ranks_higher() {
        let docs = corpus();
        let index = Bm25Index::build(&docs, Bm25Params::default());
        let hits = index.search("auth");
        let ids: Vec<_> = hits.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn test_no_match_is_empty() {
        let docs = corpus();
        let index = Bm25Index::build(&docs, Bm25Params::default());
        assert!(index.search("kubernetes").is_empty());
        assert!(index.search("").is_empty());
    }

    #[test]
    fn test_ties_break_by_id() {
        let docs = vec![
            Neurona::new("z", "same words", NeuronaType::Concept),
            Neurona::new("m", "same words", NeuronaType::Concept),
        ];
        let index = Bm25Index::build(&docs, Bm25Params::default());
        let ids: Vec<_> = index.search("same").into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["m", "z"]);
    }

    #[test]
    fn test_idf_is_positive_for_common_terms() {
        let docs = vec![
            Neurona::new("a", "common", NeuronaType::Concept),
            Neurona::new("b", "common", NeuronaType::Concept),
        ];
        let index = Bm25Index::build(&docs, Bm25Params::default());
        assert!(index.idf("common") > 0.0);
    }
}
