//! # Graph Store
//!
//! Type-erased `(from, to, weight)` topology derived from every Neurona's
//! connection list. Connection types are deliberately dropped here: traversal
//! and activation only need topology and weight, while filtering reads the
//! typed `Connection` list on the Neurona itself.
//!
//! ## Limitations
//!
//! - **No dedup**: two connections of different types between the same pair
//!   produce two parallel edges.
//! - **Implicit nodes**: a node exists only once an edge touches it. Isolated
//!   Neuronas are reported by [`Graph::orphans`], never stored.

pub mod impact;
pub mod traversal;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::model::{Neurona, NeuronaSet};

pub use impact::{impact, ImpactOptions, ImpactReport, Recommendation, RecommendedAction};
pub use traversal::{trace, Flow, TraceDirection, TraceFormat, TraceNode, TraceOptions};

/// One adjacency entry: the node at the other end and the edge weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub node: String,
    pub weight: u8,
}

type EdgeList = SmallVec<[Edge; 4]>;

#[derive(Debug, Clone, Default)]
struct Adjacency {
    outgoing: EdgeList,
    incoming: EdgeList,
}

/// Directed weighted graph keyed by Neurona id.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: HashMap<String, Adjacency>,
    edge_count: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten every Neurona's connections, in id order, into one graph.
    pub fn from_neuronas<'a>(neuronas: impl IntoIterator<Item = &'a Neurona>) -> Self {
        let mut graph = Graph::new();
        for neurona in neuronas {
            for conn in &neurona.connections {
                graph.add_edge(&neurona.id, &conn.target_id, conn.weight);
            }
        }
        graph
    }

    /// Append `from → to`, creating either endpoint if absent.
    pub fn add_edge(&mut self, from: &str, to: &str, weight: u8) {
        self.nodes
            .entry_ref(from)
            .or_default()
            .outgoing
            .push(Edge { node: to.to_string(), weight });
        self.nodes
            .entry_ref(to)
            .or_default()
            .incoming
            .push(Edge { node: from.to_string(), weight });
        self.edge_count += 1;
    }

    /// Outgoing edges of `id`; empty if the node is unknown.
    pub fn adjacent(&self, id: &str) -> &[Edge] {
        self.nodes.get(id).map(|a| a.outgoing.as_slice()).unwrap_or_default()
    }

    /// Incoming edges of `id`; empty if the node is unknown.
    pub fn incoming(&self, id: &str) -> &[Edge] {
        self.nodes.get(id).map(|a| a.incoming.as_slice()).unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Node ids sorted ascending.
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Every edge as `(from, to, weight)`, sources in id order and each
    /// source's edges in insertion order. For a graph built by
    /// `from_neuronas` over a `NeuronaSet`, replaying this sequence through
    /// `add_edge` reproduces identical adjacency lists.
    pub fn edges(&self) -> Vec<(&str, &str, u8)> {
        let mut out = Vec::with_capacity(self.edge_count);
        for id in self.node_ids() {
            for edge in self.adjacent(id) {
                out.push((id, edge.node.as_str(), edge.weight));
            }
        }
        out
    }

    /// Neurona ids with no edge in either direction, sorted by id.
    pub fn orphans(&self, neuronas: &NeuronaSet) -> Vec<String> {
        neuronas
            .keys()
            .filter(|id| !self.contains(id))
            .cloned()
            .collect()
    }
}
