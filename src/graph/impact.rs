//! Change-impact analysis: a trace with per-node recommendations.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Graph;
use super::traversal::{Flow, TraceDirection, TraceFormat, TraceNode, TraceOptions, trace};
use crate::model::{NeuronaSet, NeuronaType};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    RunTest,
    Review,
    Investigate,
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecommendedAction::RunTest => "run_test",
            RecommendedAction::Review => "review",
            RecommendedAction::Investigate => "investigate",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: RecommendedAction,
    /// 1 is most urgent.
    pub priority: u8,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpactOptions {
    pub direction: TraceDirection,
    pub max_depth: usize,
    pub format: TraceFormat,
}

impl Default for ImpactOptions {
    fn default() -> Self {
        Self {
            direction: TraceDirection::Both,
            max_depth: 3,
            format: TraceFormat::Tree,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub root: String,
    pub affected: Vec<TraceNode>,
}

impl ImpactReport {
    /// Rows carrying a recommendation, most urgent first, then by id.
    pub fn recommended(&self) -> Vec<&TraceNode> {
        let mut rows: Vec<&TraceNode> =
            self.affected.iter().filter(|r| r.recommendation.is_some()).collect();
        rows.sort_by(|a, b| {
            let pa = a.recommendation.as_ref().map_or(u8::MAX, |r| r.priority);
            let pb = b.recommendation.as_ref().map_or(u8::MAX, |r| r.priority);
            pa.cmp(&pb).then_with(|| a.id.cmp(&b.id))
        });
        rows
    }
}

/// Trace from `root` and attach a recommendation to every discovered node
/// whose `(type, flow)` pair has one.
///
/// A node whose recommendation cannot be built (e.g. an edge pointing at an
/// unknown id) keeps `recommendation: None`; the report itself still succeeds.
pub fn impact(
    graph: &Graph,
    neuronas: &NeuronaSet,
    root: &str,
    opts: &ImpactOptions,
) -> Result<ImpactReport> {
    let trace_opts = TraceOptions {
        direction: opts.direction,
        max_depth: opts.max_depth,
        format: opts.format,
    };
    let mut affected = trace(graph, neuronas, root, &trace_opts)?;

    for row in &mut affected {
        row.recommendation = match recommend(neuronas, &row.id, row.direction) {
            Ok(rec) => rec,
            Err(e) => {
                warn!(node = %row.id, error = %e, "dropping recommendation");
                None
            }
        };
    }

    debug!(
        root,
        affected = affected.len(),
        recommended = affected.iter().filter(|r| r.recommendation.is_some()).count(),
        "impact analysis complete"
    );
    Ok(ImpactReport { root: root.to_string(), affected })
}

fn recommend(neuronas: &NeuronaSet, id: &str, flow: Flow) -> Result<Option<Recommendation>> {
    let neurona = neuronas
        .get(id)
        .ok_or_else(|| Error::NotFound(format!("Neurona '{id}'")))?;

    let rec = match (neurona.neurona_type, flow) {
        (NeuronaType::TestCase, Flow::Upstream) => Some(Recommendation {
            action: RecommendedAction::RunTest,
            priority: 1,
            reason: format!("test '{}' covers the changed node", neurona.title),
        }),
        (NeuronaType::Requirement, Flow::Downstream) => Some(Recommendation {
            action: RecommendedAction::Review,
            priority: 2,
            reason: format!("requirement '{}' depends on the changed node", neurona.title),
        }),
        (NeuronaType::Issue, Flow::Downstream) => Some(Recommendation {
            action: RecommendedAction::Investigate,
            priority: 3,
            reason: format!("issue '{}' may be affected", neurona.title),
        }),
        _ => None,
    };
    Ok(rec)
}
