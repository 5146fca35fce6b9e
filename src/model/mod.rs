//! # Knowledge Graph Model
//!
//! Plain data that crosses every boundary: store ↔ graph ↔ query ↔ caller.
//!
//! Design rule: no I/O, no index state, no ranking here. A `Neurona` owns its
//! typed `Connection` list; the type-erased topology lives in `crate::graph`.

pub mod connection;
pub mod neurona;
pub mod value;

use std::collections::BTreeMap;

pub use connection::{Connection, ConnectionType};
pub use neurona::{Context, LlmMetadata, Neurona, NeuronaType};
pub use value::Value;

/// The full Neurona set of one invocation, keyed (and therefore ordered) by id.
pub type NeuronaSet = BTreeMap<String, Neurona>;

/// Collect Neuronas into a `NeuronaSet`. Later duplicates replace earlier ones.
pub fn neurona_set(neuronas: impl IntoIterator<Item = Neurona>) -> NeuronaSet {
    neuronas.into_iter().map(|n| (n.id.clone(), n)).collect()
}
