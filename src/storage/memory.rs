//! In-memory document store.
//!
//! The reference implementation of `NeuronaStore`. One `NeuronaSet` behind
//! a `RwLock`; clones share the same data.
//!
//! ## Limitations
//!
//! - **Per-call locking**: `link` writes both endpoints under one lock, but
//!   separate calls are not grouped into any transaction.
//! - **No persistence**: contents vanish with the last clone.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::model::{Connection, ConnectionType, Neurona, NeuronaSet};
use crate::{Error, Result};
use super::NeuronaStore;

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<NeuronaSet>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every Neurona, failing on the first duplicate id.
    pub fn with_neuronas(neuronas: impl IntoIterator<Item = Neurona>) -> Result<Self> {
        let store = Self::new();
        for n in neuronas {
            store.create(n)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    // ========================================================================
    // Mutation points
    // ========================================================================

    /// Add a new Neurona. A missing `updated` timestamp is set to now.
    pub fn create(&self, mut neurona: Neurona) -> Result<()> {
        validate(&neurona)?;
        let mut set = self.inner.write();
        if set.contains_key(&neurona.id) {
            return Err(Error::ConstraintViolation(format!("Neurona '{}' already exists", neurona.id)));
        }
        if neurona.updated.is_none() {
            neurona.updated = Some(Utc::now());
        }
        debug!(id = %neurona.id, ty = %neurona.neurona_type, "created neurona");
        set.insert(neurona.id.clone(), neurona);
        Ok(())
    }

    /// Replace an existing Neurona. A missing `updated` timestamp is set to
    /// now.
    pub fn update(&self, mut neurona: Neurona) -> Result<()> {
        validate(&neurona)?;
        let mut set = self.inner.write();
        let slot = set
            .get_mut(&neurona.id)
            .ok_or_else(|| Error::NotFound(format!("Neurona '{}'", neurona.id)))?;
        if neurona.updated.is_none() {
            neurona.updated = Some(Utc::now());
        }
        *slot = neurona;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Neurona> {
        self.inner.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Result<Neurona> {
        self.inner
            .write()
            .remove(id)
            .ok_or_else(|| Error::NotFound(format!("Neurona '{id}'")))
    }

    /// Connect `source → target` and write the inverse edge on `target`.
    ///
    /// Self-inverse types (`related`, `relates_to`, `opposes`) write the same
    /// type back. Re-linking an existing pair updates its weight instead of
    /// adding a parallel edge. Both endpoints get a fresh `updated` stamp.
    pub fn link(&self, source: &str, target: &str, ty: ConnectionType, weight: u8) -> Result<()> {
        self.link_at(source, target, ty, weight, Utc::now())
    }

    /// `link` with an explicit modification time.
    pub fn link_at(
        &self,
        source: &str,
        target: &str,
        ty: ConnectionType,
        weight: u8,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut set = self.inner.write();
        for id in [source, target] {
            if !set.contains_key(id) {
                return Err(Error::NotFound(format!("Neurona '{id}'")));
            }
        }

        if let Some(n) = set.get_mut(source) {
            upsert(n, Connection::new(target, ty, weight), at);
        }
        if let Some(inverse) = ty.inverse() {
            if let Some(n) = set.get_mut(target) {
                upsert(n, Connection::new(source, inverse, weight), at);
            }
        }
        debug!(source, target, ty = %ty, "linked");
        Ok(())
    }
}

fn upsert(neurona: &mut Neurona, conn: Connection, at: DateTime<Utc>) {
    match neurona
        .connections
        .iter_mut()
        .find(|c| c.target_id == conn.target_id && c.connection_type == conn.connection_type)
    {
        Some(existing) => existing.weight = conn.weight,
        None => neurona.connections.push(conn),
    }
    neurona.updated = Some(at);
}

fn validate(neurona: &Neurona) -> Result<()> {
    if neurona.id.trim().is_empty() {
        return Err(Error::Validation("Neurona id must not be empty".into()));
    }
    if let Some(meta) = &neurona.llm_metadata {
        meta.validate()?;
    }
    Ok(())
}

// ============================================================================
// NeuronaStore impl
// ============================================================================

impl NeuronaStore for MemoryStore {
    fn scan(&self) -> Result<Vec<Neurona>> {
        Ok(self.inner.read().values().cloned().collect())
    }

    fn newest_modification(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.inner.read().values().filter_map(|n| n.updated).max())
    }

    fn load_all(&self) -> Result<NeuronaSet> {
        Ok(self.inner.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LlmMetadata, NeuronaType};
    use pretty_assertions::assert_eq;

    fn store() -> MemoryStore {
        MemoryStore::with_neuronas([
            Neurona::new("req", "Req", NeuronaType::Requirement),
            Neurona::new("test", "Test", NeuronaType::TestCase),
        ])
        .unwrap()
    }

    #[test]
    fn test_create_rejects_duplicates() {
        let s = store();
        let err = s.create(Neurona::new("req", "Again", NeuronaType::Concept)).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_create_stamps_updated() {
        let s = store();
        assert!(s.get("req").unwrap().updated.is_some());
    }

    #[test]
    fn test_update_requires_existing() {
        let s = store();
        let err = s.update(Neurona::new("ghost", "G", NeuronaType::Concept)).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        s.update(Neurona::new("req", "Renamed", NeuronaType::Requirement)).unwrap();
        assert_eq!(s.get("req").unwrap().title, "Renamed");
    }

    #[test]
    fn test_link_writes_inverse() {
        let s = store();
        s.link("test", "req", ConnectionType::Validates, 90).unwrap();
        assert_eq!(
            s.get("test").unwrap().connections,
            vec![Connection::new("req", ConnectionType::Validates, 90)]
        );
        assert_eq!(
            s.get("req").unwrap().connections,
            vec![Connection::new("test", ConnectionType::ValidatedBy, 90)]
        );
    }

    #[test]
    fn test_self_inverse_link_and_relink() {
        let s = store();
        s.link("test", "req", ConnectionType::Related, 10).unwrap();
        s.link("test", "req", ConnectionType::Related, 60).unwrap();
        let req = s.get("req").unwrap();
        assert_eq!(req.connections, vec![Connection::new("test", ConnectionType::Related, 60)]);
        assert_eq!(s.get("test").unwrap().connections.len(), 1);
    }

    #[test]
    fn test_link_unknown_endpoint() {
        let s = store();
        assert!(matches!(
            s.link("test", "nope", ConnectionType::Tests, 50),
            Err(Error::NotFound(_))
        ));
        assert!(s.get("test").unwrap().connections.is_empty());
    }

    #[test]
    fn test_invalid_density_rejected() {
        let s = MemoryStore::new();
        let n = Neurona::new("a", "A", NeuronaType::Concept)
            .with_llm_metadata(LlmMetadata { density: 0, ..Default::default() });
        assert!(matches!(s.create(n), Err(Error::Validation(_))));
    }

    #[test]
    fn test_newest_modification() {
        let s = MemoryStore::new();
        assert_eq!(s.newest_modification().unwrap(), None);
        let t = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        s.create(Neurona::new("a", "A", NeuronaType::Concept).with_updated(t)).unwrap();
        assert_eq!(s.newest_modification().unwrap(), Some(t));
        s.create(Neurona::new("b", "B", NeuronaType::Concept).with_updated(t + chrono::Duration::hours(1))).unwrap();
        assert_eq!(s.newest_modification().unwrap(), Some(t + chrono::Duration::hours(1)));
    }
}
