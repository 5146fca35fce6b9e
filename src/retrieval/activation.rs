//! Spreading activation over graph edges.
//!
//! Each seed runs its own breadth-first walk along outgoing edges, keeping a
//! visited set so a node is reached at most once per seed. A node first
//! reached at hop `h` receives `stimulus · decay^h`. Edge weights do not
//! scale the signal. A node's final score is its own stimulus plus every
//! contribution it received.

use std::collections::{BTreeMap, VecDeque};

use hashbrown::HashSet;

use crate::graph::Graph;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationParams {
    pub depth: usize,
    pub decay: f32,
}

impl Default for ActivationParams {
    fn default() -> Self {
        Self { depth: 2, decay: 0.7 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Activation {
    pub id: String,
    pub stimulus: f32,
    pub propagated: f32,
}

impl Activation {
    pub fn score(&self) -> f32 {
        self.stimulus + self.propagated
    }
}

/// Propagate `stimuli` through `graph`. Nodes whose stimulus and received
/// signal are both zero are omitted. Sorted by score, then id.
pub fn activate(graph: &Graph, stimuli: &[(String, f32)], params: ActivationParams) -> Vec<Activation> {
    let mut acc: BTreeMap<String, (f32, f32)> = BTreeMap::new();
    for (id, s) in stimuli {
        acc.entry(id.clone()).or_default().0 += s;
    }

    for (seed, stimulus) in stimuli {
        if *stimulus <= 0.0 {
            continue;
        }
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(seed.as_str());
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(seed.as_str(), 0)]);
        while let Some((id, hop)) = queue.pop_front() {
            if hop >= params.depth {
                continue;
            }
            for edge in graph.adjacent(id) {
                let next = edge.node.as_str();
                if !visited.insert(next) {
                    continue;
                }
                let signal = stimulus * params.decay.powi(hop as i32 + 1);
                acc.entry(next.to_string()).or_default().1 += signal;
                queue.push_back((next, hop + 1));
            }
        }
    }

    let mut out: Vec<Activation> = acc
        .into_iter()
        .filter(|(_, (s, p))| *s > 0.0 || *p > 0.0)
        .map(|(id, (stimulus, propagated))| Activation { id, stimulus, propagated })
        .collect();
    out.sort_by(|a, b| b.score().total_cmp(&a.score()).then_with(|| a.id.cmp(&b.id)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn chain() -> Graph {
        let mut g = Graph::new();
        g.add_edge("a", "b", 10);
        g.add_edge("b", "c", 90);
        g
    }

    fn seed(id: &str, s: f32) -> Vec<(String, f32)> {
        vec![(id.to_string(), s)]
    }

    #[test]
    fn test_zero_decay_keeps_local_stimulus_only() {
        let out = activate(&chain(), &seed("a", 0.8), ActivationParams { depth: 3, decay: 0.0 });
        assert_eq!(out, vec![Activation { id: "a".into(), stimulus: 0.8, propagated: 0.0 }]);
    }

    #[test]
    fn test_unit_decay_passes_full_stimulus() {
        let out = activate(&chain(), &seed("a", 0.8), ActivationParams { depth: 1, decay: 1.0 });
        let b = out.iter().find(|r| r.id == "b").unwrap();
        assert_eq!(b.propagated, 0.8);
        assert!(out.iter().all(|r| r.id != "c"));
    }

    #[test]
    fn test_decay_compounds_per_hop() {
        let out = activate(&chain(), &seed("a", 1.0), ActivationParams { depth: 2, decay: 0.5 });
        let c = out.iter().find(|r| r.id == "c").unwrap();
        assert!((c.propagated - 0.25).abs() < 1e-6);
        assert_eq!(out[0].id, "a");
    }

    #[test]
    fn test_contributions_sum_across_seeds() {
        let stimuli = vec![("a".to_string(), 1.0), ("b".to_string(), 0.5)];
        let out = activate(&chain(), &stimuli, ActivationParams { depth: 1, decay: 1.0 });
        let b = out.iter().find(|r| r.id == "b").unwrap();
        assert_eq!((b.stimulus, b.propagated), (0.5, 1.0));
        assert_eq!(b.score(), 1.5);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut g = Graph::new();
        g.add_edge("a", "b", 1);
        g.add_edge("b", "a", 1);
        let out = activate(&g, &seed("a", 1.0), ActivationParams { depth: 10, decay: 1.0 });
        assert_eq!(out.len(), 2);
        assert_eq!(out.iter().find(|r| r.id == "a").unwrap().propagated, 0.0);
    }
}
