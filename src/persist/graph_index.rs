//! Persisted graph adjacency.
//!
//! Framed by [`codec`](super::codec) as `"ENGRAM_GRAPH"`, a version byte and a
//! bincode body:
//!
//! ```text
//! built_at  i64 unix ms
//! nodes     [id]                      ids ascending
//! edges     [(from u32, to u32, weight u8)]   indexes into `nodes`
//! ```
//!
//! Edges are stored in `Graph::edges` order, so loading replays them into
//! identical adjacency lists.

use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::codec::{decode, encode, invalid, write_atomic};
use super::{millis_to_datetime, LOAD_BUDGET_MS};
use crate::graph::Graph;
use crate::{Error, Result};

pub const MAGIC: &[u8; 12] = b"ENGRAM_GRAPH";
pub const VERSION: u8 = 2;

const WHAT: &str = "graph index";

/// On-disk body. `S` is `&str` when writing and `String` when reading.
#[derive(Debug, Serialize, Deserialize)]
struct GraphBody<S> {
    built_at: i64,
    nodes: Vec<S>,
    edges: Vec<(u32, u32, u8)>,
}

/// A graph plus the time it was built.
#[derive(Debug, Clone)]
pub struct GraphIndex {
    pub graph: Graph,
    pub built_at: DateTime<Utc>,
}

impl GraphIndex {
    pub fn new(graph: Graph, built_at: DateTime<Utc>) -> Self {
        Self { graph, built_at }
    }

    /// Stale iff built before `newest` source modification.
    /// Compared in whole milliseconds, the resolution stored on disk.
    pub fn is_stale(&self, newest: Option<DateTime<Utc>>) -> bool {
        newest.is_some_and(|n| self.built_at.timestamp_millis() < n.timestamp_millis())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let nodes = self.graph.node_ids();
        let position = |id: &str| -> Result<u32> {
            nodes
                .binary_search(&id)
                .map_err(|_| Error::Validation(format!("edge endpoint '{id}' is not a graph node")))
                .and_then(|i| u32::try_from(i).map_err(|_| Error::Validation("node table too large".into())))
        };
        let edges = self
            .graph
            .edges()
            .into_iter()
            .map(|(from, to, weight)| Ok((position(from)?, position(to)?, weight)))
            .collect::<Result<Vec<_>>>()?;

        let body = GraphBody { built_at: self.built_at.timestamp_millis(), nodes, edges };
        encode(MAGIC, VERSION, &body, WHAT)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let body: GraphBody<String> = decode(data, MAGIC, VERSION, WHAT)?;
        let built_at = millis_to_datetime(body.built_at, WHAT)?;

        let mut graph = Graph::new();
        for (from, to, weight) in body.edges {
            let (Some(from_id), Some(to_id)) = (body.nodes.get(from as usize), body.nodes.get(to as usize)) else {
                return Err(invalid(WHAT, format!("edge endpoint out of range ({from}, {to})")));
            };
            graph.add_edge(from_id, to_id, weight);
        }

        if graph.node_count() != body.nodes.len() {
            return Err(invalid(WHAT, format!(
                "node table lists {} ids but edges touch {}",
                body.nodes.len(),
                graph.node_count()
            )));
        }
        Ok(Self { graph, built_at })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &self.to_bytes()?)?;
        debug!(
            path = %path.display(),
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "saved graph index"
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let start = Instant::now();
        let data = std::fs::read(path)?;
        let index = Self::from_bytes(&data)?;
        let elapsed_ms = start.elapsed().as_millis();
        if elapsed_ms > LOAD_BUDGET_MS {
            warn!(elapsed_ms, budget_ms = LOAD_BUDGET_MS, "graph index load over budget");
        }
        debug!(path = %path.display(), nodes = index.graph.node_count(), elapsed_ms, "loaded graph index");
        Ok(index)
    }
}
