//! Dependency tracing over the type-erased graph.
//!
//! Downstream walks outgoing edges breadth-first; upstream walks incoming
//! edges depth-first. Either way each node appears once, at its minimum hop
//! count from the root, cycles terminate, and nothing beyond `max_depth` is
//! reported. The root itself is never part of the result.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Graph;
use super::impact::Recommendation;
use crate::model::{ConnectionType, NeuronaSet};
use crate::{Error, Result};

/// Requested traversal direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceDirection {
    Up,
    #[default]
    Down,
    Both,
}

impl TraceDirection {
    fn includes(self, flow: Flow) -> bool {
        matches!(
            (self, flow),
            (TraceDirection::Both, _)
                | (TraceDirection::Up, Flow::Upstream)
                | (TraceDirection::Down, Flow::Downstream)
        )
    }
}

impl FromStr for TraceDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "upstream" => Ok(TraceDirection::Up),
            "down" | "downstream" => Ok(TraceDirection::Down),
            "both" => Ok(TraceDirection::Both),
            _ => Err(Error::UnknownType { kind: "trace direction", value: s.to_string() }),
        }
    }
}

/// Direction in which a particular row was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Upstream,
    Downstream,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Flow::Upstream => "upstream",
            Flow::Downstream => "downstream",
        })
    }
}

/// Row ordering requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceFormat {
    /// Discovery order: each node follows the node it was reached from.
    #[default]
    Tree,
    /// Sorted by level, then id.
    List,
}

impl FromStr for TraceFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tree" => Ok(TraceFormat::Tree),
            "list" => Ok(TraceFormat::List),
            _ => Err(Error::UnknownType { kind: "trace format", value: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceOptions {
    pub direction: TraceDirection,
    pub max_depth: usize,
    pub format: TraceFormat,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            direction: TraceDirection::Down,
            max_depth: 3,
            format: TraceFormat::Tree,
        }
    }
}

/// One discovered node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceNode {
    pub id: String,
    pub level: usize,
    pub direction: Flow,
    /// The node this one was reached from.
    pub parent: String,
    /// Semantic type of the edge that led here, read from the source
    /// Neurona's connection list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<ConnectionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

/// Trace from `root` in the requested direction(s).
///
/// Fails with `NotFound` if `root` is not a known Neurona. A Neurona with no
/// edges yields an empty trace.
pub fn trace(
    graph: &Graph,
    neuronas: &NeuronaSet,
    root: &str,
    opts: &TraceOptions,
) -> Result<Vec<TraceNode>> {
    if !neuronas.contains_key(root) {
        return Err(Error::NotFound(format!("Neurona '{root}'")));
    }

    let mut rows = Vec::new();
    if opts.direction.includes(Flow::Upstream) {
        let mut up = upstream(graph, neuronas, root, opts.max_depth);
        order(&mut up, opts.format);
        rows.extend(up);
    }
    if opts.direction.includes(Flow::Downstream) {
        let mut down = downstream(graph, neuronas, root, opts.max_depth);
        order(&mut down, opts.format);
        rows.extend(down);
    }

    debug!(root, direction = ?opts.direction, found = rows.len(), "trace complete");
    Ok(rows)
}

fn order(rows: &mut [TraceNode], format: TraceFormat) {
    if format == TraceFormat::List {
        rows.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.id.cmp(&b.id)));
    }
}

/// Breadth-first over outgoing edges.
fn downstream(graph: &Graph, neuronas: &NeuronaSet, root: &str, max_depth: usize) -> Vec<TraceNode> {
    let mut rows = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(root);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(root, 0)]);

    while let Some((id, level)) = queue.pop_front() {
        if level >= max_depth {
            continue;
        }
        for edge in graph.adjacent(id) {
            let next = edge.node.as_str();
            if !visited.insert(next) {
                continue;
            }
            rows.push(TraceNode {
                id: next.to_string(),
                level: level + 1,
                direction: Flow::Downstream,
                parent: id.to_string(),
                connection_type: edge_type(neuronas, id, next),
                recommendation: None,
            });
            queue.push_back((next, level + 1));
        }
    }
    rows
}

/// Depth-first over incoming edges, emitting rows in pre-order.
///
/// A depth-first walk can reach a node along a long path before a short one,
/// so the first pass records the best level per node and re-enters a node
/// whenever a shallower path turns up. The second pass emits each node once,
/// from a parent one level above it.
fn upstream(graph: &Graph, neuronas: &NeuronaSet, root: &str, max_depth: usize) -> Vec<TraceNode> {
    let mut best: HashMap<&str, usize> = HashMap::new();
    best.insert(root, 0);
    relax_up(graph, root, 0, max_depth, &mut best);

    let mut rows = Vec::new();
    let mut emitted: HashSet<&str> = HashSet::new();
    emitted.insert(root);
    emit_up(graph, neuronas, root, 0, &best, &mut emitted, &mut rows);
    rows
}

fn relax_up<'g>(
    graph: &'g Graph,
    id: &'g str,
    level: usize,
    max_depth: usize,
    best: &mut HashMap<&'g str, usize>,
) {
    if level >= max_depth {
        return;
    }
    for edge in graph.incoming(id) {
        let prev = edge.node.as_str();
        if best.get(prev).is_some_and(|&known| known <= level + 1) {
            continue;
        }
        best.insert(prev, level + 1);
        relax_up(graph, prev, level + 1, max_depth, best);
    }
}

fn emit_up<'g>(
    graph: &'g Graph,
    neuronas: &NeuronaSet,
    id: &'g str,
    level: usize,
    best: &HashMap<&'g str, usize>,
    emitted: &mut HashSet<&'g str>,
    rows: &mut Vec<TraceNode>,
) {
    for edge in graph.incoming(id) {
        let prev = edge.node.as_str();
        if best.get(prev) != Some(&(level + 1)) || !emitted.insert(prev) {
            continue;
        }
        rows.push(TraceNode {
            id: prev.to_string(),
            level: level + 1,
            direction: Flow::Upstream,
            parent: id.to_string(),
            connection_type: edge_type(neuronas, prev, id),
            recommendation: None,
        });
        emit_up(graph, neuronas, prev, level + 1, best, emitted, rows);
    }
}

fn edge_type(neuronas: &NeuronaSet, from: &str, to: &str) -> Option<ConnectionType> {
    neuronas
        .get(from)
        .and_then(|n| n.connection_to(to))
        .map(|c| c.connection_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Neurona, NeuronaType, neurona_set};
    use pretty_assertions::assert_eq;

    fn chain() -> (Graph, NeuronaSet) {
        let set = neurona_set([
            Neurona::new("a", "A", NeuronaType::Requirement).with_connection("b", ConnectionType::Child, 80),
            Neurona::new("b", "B", NeuronaType::Feature).with_connection("c", ConnectionType::Child, 80),
            Neurona::new("c", "C", NeuronaType::Feature).with_connection("d", ConnectionType::Child, 80),
            Neurona::new("d", "D", NeuronaType::Feature),
        ]);
        (Graph::from_neuronas(set.values()), set)
    }

    fn ids(rows: &[TraceNode]) -> Vec<(&str, usize)> {
        rows.iter().map(|r| (r.id.as_str(), r.level)).collect()
    }

    #[test]
    fn test_downstream_levels() {
        let (g, set) = chain();
        let rows = trace(&g, &set, "a", &TraceOptions { max_depth: 10, ..Default::default() }).unwrap();
        assert_eq!(ids(&rows), vec![("b", 1), ("c", 2), ("d", 3)]);
        assert_eq!(rows[0].connection_type, Some(ConnectionType::Child));
        assert_eq!(rows[1].parent, "b");
    }

    #[test]
    fn test_max_depth_stops_traversal() {
        let (g, set) = chain();
        let rows = trace(&g, &set, "a", &TraceOptions { max_depth: 2, ..Default::default() }).unwrap();
        assert_eq!(ids(&rows), vec![("b", 1), ("c", 2)]);
    }

    #[test]
    fn test_upstream_walks_incoming() {
        let (g, set) = chain();
        let opts = TraceOptions { direction: TraceDirection::Up, max_depth: 5, ..Default::default() };
        let rows = trace(&g, &set, "d", &opts).unwrap();
        assert_eq!(ids(&rows), vec![("c", 1), ("b", 2), ("a", 3)]);
        assert!(rows.iter().all(|r| r.direction == Flow::Upstream));
    }

    #[test]
    fn test_upstream_levels_are_shortest_paths() {
        // x -> r, y -> r, y -> x, z -> y. The walk meets y through x first.
        let set = neurona_set([
            Neurona::new("r", "R", NeuronaType::Requirement),
            Neurona::new("x", "X", NeuronaType::TestCase).with_connection("r", ConnectionType::Validates, 50),
            Neurona::new("y", "Y", NeuronaType::TestCase)
                .with_connection("r", ConnectionType::Validates, 50)
                .with_connection("x", ConnectionType::Related, 10),
            Neurona::new("z", "Z", NeuronaType::TestCase).with_connection("y", ConnectionType::Related, 10),
        ]);
        let g = Graph::from_neuronas(set.values());
        let opts = TraceOptions { direction: TraceDirection::Up, max_depth: 2, ..Default::default() };
        let rows = trace(&g, &set, "r", &opts).unwrap();
        assert_eq!(ids(&rows), vec![("x", 1), ("y", 1), ("z", 2)]);
        assert_eq!(rows[1].parent, "r");
        assert_eq!(rows[2].parent, "y");
        assert_eq!(rows[1].connection_type, Some(ConnectionType::Validates));
    }

    #[test]
    fn test_cycle_is_visited_once() {
        let set = neurona_set([
            Neurona::new("A", "A", NeuronaType::Concept).with_connection("B", ConnectionType::Related, 50),
            Neurona::new("B", "B", NeuronaType::Concept).with_connection("A", ConnectionType::Related, 50),
        ]);
        let g = Graph::from_neuronas(set.values());
        let opts = TraceOptions { direction: TraceDirection::Both, max_depth: 100, ..Default::default() };
        let rows = trace(&g, &set, "A", &opts).unwrap();
        let down: Vec<_> = rows.iter().filter(|r| r.direction == Flow::Downstream).collect();
        let up: Vec<_> = rows.iter().filter(|r| r.direction == Flow::Upstream).collect();
        assert_eq!(down.len(), 1);
        assert_eq!(down[0].id, "B");
        assert_eq!(up.len(), 1);
        assert_eq!(up[0].id, "B");
    }

    #[test]
    fn test_unknown_root_is_not_found() {
        let (g, set) = chain();
        let err = trace(&g, &set, "zzz", &TraceOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_isolated_root_has_empty_trace() {
        let set = neurona_set([Neurona::new("solo", "Solo", NeuronaType::Lesson)]);
        let g = Graph::from_neuronas(set.values());
        let rows = trace(&g, &set, "solo", &TraceOptions::default()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_list_format_sorts_by_level_then_id() {
        let set = neurona_set([
            Neurona::new("root", "R", NeuronaType::Concept)
                .with_connection("z", ConnectionType::Child, 50)
                .with_connection("m", ConnectionType::Child, 50),
            Neurona::new("z", "Z", NeuronaType::Concept).with_connection("a", ConnectionType::Child, 50),
            Neurona::new("m", "M", NeuronaType::Concept),
            Neurona::new("a", "A", NeuronaType::Concept),
        ]);
        let g = Graph::from_neuronas(set.values());
        let tree = trace(&g, &set, "root", &TraceOptions { max_depth: 5, ..Default::default() }).unwrap();
        assert_eq!(ids(&tree), vec![("z", 1), ("m", 1), ("a", 2)]);
        let list = trace(&g, &set, "root", &TraceOptions {
            max_depth: 5,
            format: TraceFormat::List,
            ..Default::default()
        }).unwrap();
        assert_eq!(ids(&list), vec![("m", 1), ("z", 1), ("a", 2)]);
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("up".parse::<TraceDirection>().unwrap(), TraceDirection::Up);
        assert_eq!("both".parse::<TraceDirection>().unwrap(), TraceDirection::Both);
        assert!("sideways".parse::<TraceDirection>().is_err());
    }
}
