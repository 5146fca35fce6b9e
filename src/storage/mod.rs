//! # Document Store Trait
//!
//! The contract between the engine and whatever holds the Neuronas. The
//! engine only ever scans; it makes no assumption about on-disk encoding.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory, for tests and embedding |

pub mod memory;

use chrono::{DateTime, Utc};

use crate::model::{Neurona, NeuronaSet, neurona_set};
use crate::Result;

pub use memory::MemoryStore;

/// Source of Neuronas.
pub trait NeuronaStore {
    /// Every Neurona, in no particular order.
    fn scan(&self) -> Result<Vec<Neurona>>;

    /// Latest `updated` timestamp across the store, used to decide whether
    /// persisted indexes are stale. `None` if nothing carries a timestamp.
    fn newest_modification(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.scan()?.iter().filter_map(|n| n.updated).max())
    }

    /// Scan into an id-ordered set.
    fn load_all(&self) -> Result<NeuronaSet> {
        Ok(neurona_set(self.scan()?))
    }
}
