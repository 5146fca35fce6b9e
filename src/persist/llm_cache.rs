//! LLM side table: per-Neurona summary and token count, stored as JSON.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::codec::write_atomic;
use crate::model::{Neurona, NeuronaSet};
use crate::Result;

/// Characters of body text used when no short title is set.
const SUMMARY_CHARS: usize = 160;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmCacheEntry {
    pub summary: String,
    pub token_count: u32,
}

impl LlmCacheEntry {
    pub fn for_neurona(neurona: &Neurona) -> Self {
        let meta = neurona.llm_metadata.as_ref();
        let summary = meta
            .and_then(|m| m.short_title.clone())
            .unwrap_or_else(|| summarize(&neurona.body, &neurona.title));
        let token_count = meta
            .and_then(|m| m.token_count)
            .unwrap_or_else(|| estimate_tokens(&neurona.title, &neurona.body));
        Self { summary, token_count }
    }
}

/// Body prefix cut at a word boundary, or the title for an empty body.
fn summarize(body: &str, title: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return title.to_string();
    }
    if body.chars().count() <= SUMMARY_CHARS {
        return body.to_string();
    }
    let cut: String = body.chars().take(SUMMARY_CHARS).collect();
    let trimmed = cut.rsplit_once(char::is_whitespace).map_or(cut.as_str(), |(head, _)| head);
    format!("{}…", trimmed.trim_end())
}

fn estimate_tokens(title: &str, body: &str) -> u32 {
    let words = title.split_whitespace().count() + body.split_whitespace().count();
    u32::try_from(words).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LlmCache {
    entries: BTreeMap<String, LlmCacheEntry>,
}

/// What a refresh changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStats {
    pub updated: usize,
    pub removed: usize,
}

impl LlmCache {
    /// A missing file is an empty cache.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &json)
    }

    pub fn get(&self, id: &str) -> Option<&LlmCacheEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Recompute entries that differ and drop ids no longer present.
    pub fn refresh(&mut self, neuronas: &NeuronaSet) -> RefreshStats {
        let before = self.entries.len();
        self.entries.retain(|id, _| neuronas.contains_key(id));
        let mut stats = RefreshStats { removed: before - self.entries.len(), updated: 0 };

        for (id, neurona) in neuronas {
            let entry = LlmCacheEntry::for_neurona(neurona);
            if self.entries.get(id) != Some(&entry) {
                self.entries.insert(id.clone(), entry);
                stats.updated += 1;
            }
        }
        debug!(updated = stats.updated, removed = stats.removed, "refreshed llm cache");
        stats
    }
}
