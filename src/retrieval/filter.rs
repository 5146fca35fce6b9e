//! Predicate evaluation against a Neurona's static fields.
//!
//! Two entry points: [`evaluate`] runs a compiled EQL/NL [`QueryAst`], and
//! [`FilterSet`] is the structured pre-filter applied before every retrieval
//! mode.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::eql::ast::{Condition, LinkCondition, LogicOp, Operator, QueryAst};
use crate::model::{ConnectionType, Neurona, NeuronaType, Value};

// ============================================================================
// AST evaluation
// ============================================================================

pub fn evaluate(ast: &QueryAst, neurona: &Neurona) -> bool {
    match ast {
        QueryAst::Condition(c) => eval_condition(c, neurona),
        QueryAst::Link(l) => eval_link(l, neurona),
        QueryAst::Logical { left, op: LogicOp::And, right } => {
            evaluate(left, neurona) && evaluate(right, neurona)
        }
        QueryAst::Logical { left, op: LogicOp::Or, right } => {
            evaluate(left, neurona) || evaluate(right, neurona)
        }
        QueryAst::Not(inner) => !evaluate(inner, neurona),
        QueryAst::Group(inner) => evaluate(inner, neurona),
    }
}

fn eval_link(link: &LinkCondition, neurona: &Neurona) -> bool {
    neurona
        .connections
        .iter()
        .any(|c| c.connection_type == link.link_type && c.target_id == link.link_target)
}

fn eval_condition(cond: &Condition, neurona: &Neurona) -> bool {
    match cond.field.as_str() {
        "tag" | "tags" => eval_tags(cond, neurona),
        "type" => apply(cond.operator, &Value::from(neurona.neurona_type.as_str()), &cond.value),
        "id" => apply(cond.operator, &Value::from(neurona.id.as_str()), &cond.value),
        "title" => apply(cond.operator, &Value::from(neurona.title.as_str()), &cond.value),
        "body" => apply(cond.operator, &Value::from(neurona.body.as_str()), &cond.value),
        field => {
            let key = field.strip_prefix("context.").unwrap_or(field);
            match neurona.context.get(key) {
                Some(actual) => apply(cond.operator, &actual, &cond.value),
                None => missing(cond.operator),
            }
        }
    }
}

/// Tags are multi-valued: positive operators need one matching tag,
/// negative operators need none.
fn eval_tags(cond: &Condition, neurona: &Neurona) -> bool {
    let positive = match cond.operator {
        Operator::Neq => Operator::Eq,
        Operator::NotContains => Operator::Contains,
        op => op,
    };
    let any = neurona
        .tags
        .iter()
        .any(|t| apply(positive, &Value::from(t.as_str()), &cond.value));
    if positive == cond.operator { any } else { !any }
}

/// An absent field satisfies only the negative operators.
fn missing(op: Operator) -> bool {
    matches!(op, Operator::Neq | Operator::NotContains)
}

fn apply(op: Operator, actual: &Value, expected: &Value) -> bool {
    let ord = || compare(actual, expected);
    match op {
        Operator::Eq => ord() == Some(Ordering::Equal),
        Operator::Neq => ord() != Some(Ordering::Equal),
        Operator::Gt => ord() == Some(Ordering::Greater),
        Operator::Lt => ord() == Some(Ordering::Less),
        Operator::Gte => matches!(ord(), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lte => matches!(ord(), Some(Ordering::Less | Ordering::Equal)),
        Operator::Contains => actual.contains(expected),
        Operator::NotContains => !actual.contains(expected),
    }
}

/// Like `Value::compare`, but a textual field compared with a typed literal
/// (`title:eq:42`) falls back to comparing text.
fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    actual.compare(expected).or_else(|| match (actual, expected) {
        (Value::String(_), _) | (_, Value::String(_)) => {
            Some(actual.to_string().to_lowercase().cmp(&expected.to_string().to_lowercase()))
        }
        _ => None,
    })
}

// ============================================================================
// Structured filters
// ============================================================================

/// Include/exclude by type. An empty include set admits every type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFilter {
    pub include: BTreeSet<NeuronaType>,
    pub exclude: BTreeSet<NeuronaType>,
}

impl TypeFilter {
    pub fn matches(&self, neurona: &Neurona) -> bool {
        (self.include.is_empty() || self.include.contains(&neurona.neurona_type))
            && !self.exclude.contains(&neurona.neurona_type)
    }
}

/// Include (any tag) / exclude (no tag), case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    pub include: BTreeSet<String>,
    pub exclude: BTreeSet<String>,
}

impl TagFilter {
    pub fn matches(&self, neurona: &Neurona) -> bool {
        (self.include.is_empty() || self.include.iter().any(|t| neurona.has_tag(t)))
            && !self.exclude.iter().any(|t| neurona.has_tag(t))
    }
}

/// Matches on the node's own connection list.
///
/// `operator` is accepted for both AND and OR, and in both cases a node
/// matches when at least one edge satisfies every specified field. A
/// stricter "all edges" reading of AND is not implemented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionFilter {
    pub connection_type: Option<ConnectionType>,
    pub target_id: Option<String>,
    pub operator: LogicOp,
}

impl ConnectionFilter {
    pub fn matches(&self, neurona: &Neurona) -> bool {
        neurona.connections.iter().any(|c| {
            self.connection_type.is_none_or(|t| t == c.connection_type)
                && self.target_id.as_deref().is_none_or(|t| t == c.target_id)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Id,
    Title,
    Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOp {
    Equal,
    NotEqual,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: FilterField,
    pub op: FieldOp,
    pub value: String,
}

impl FieldFilter {
    pub fn new(field: FilterField, op: FieldOp, value: impl Into<String>) -> Self {
        Self { field, op, value: value.into() }
    }

    pub fn matches(&self, neurona: &Neurona) -> bool {
        let actual = match self.field {
            FilterField::Id => neurona.id.as_str(),
            FilterField::Title => neurona.title.as_str(),
            FilterField::Type => neurona.neurona_type.as_str(),
        };
        match self.op {
            FieldOp::Equal => actual.eq_ignore_ascii_case(&self.value),
            FieldOp::NotEqual => !actual.eq_ignore_ascii_case(&self.value),
            FieldOp::Contains => actual.to_lowercase().contains(&self.value.to_lowercase()),
        }
    }
}

/// Conjunction of structured filters. The default set admits everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub types: TypeFilter,
    pub tags: TagFilter,
    pub connections: Vec<ConnectionFilter>,
    pub fields: Vec<FieldFilter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_type(mut self, ty: NeuronaType) -> Self {
        self.types.include.insert(ty);
        self
    }

    pub fn exclude_type(mut self, ty: NeuronaType) -> Self {
        self.types.exclude.insert(ty);
        self
    }

    pub fn include_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.include.insert(tag.into());
        self
    }

    pub fn exclude_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.exclude.insert(tag.into());
        self
    }

    pub fn with_connection(mut self, filter: ConnectionFilter) -> Self {
        self.connections.push(filter);
        self
    }

    pub fn with_field(mut self, filter: FieldFilter) -> Self {
        self.fields.push(filter);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, neurona: &Neurona) -> bool {
        self.types.matches(neurona)
            && self.tags.matches(neurona)
            && self.connections.iter().all(|f| f.matches(neurona))
            && self.fields.iter().all(|f| f.matches(neurona))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eql;
    use crate::model::Context;

    fn issue() -> Neurona {
        Neurona::new("issue.db", "Database outage", NeuronaType::Issue)
            .with_tags(["p1", "Infra"])
            .with_context(Context::Issue {
                status: Some("open".into()),
                priority: Some(1),
                assignee: None,
            })
            .with_connection("req.auth", ConnectionType::Blocks, 100)
    }

    fn check(query: &str) -> bool {
        evaluate(&eql::parse(query).unwrap(), &issue())
    }

    #[test]
    fn test_basic_fields() {
        assert!(check("type:issue"));
        assert!(!check("type:requirement"));
        assert!(check("id:issue.db"));
        assert!(check("title:contains:outage"));
        assert!(check("tag:infra"));
        assert!(check("tag:neq:security"));
        assert!(!check("tag:neq:p1"));
    }

    #[test]
    fn test_context_fields() {
        assert!(check("priority:1"));
        assert!(check("priority:lte:2"));
        assert!(!check("priority:gt:1"));
        assert!(check("context.status:open"));
        assert!(check("status:OPEN"));
    }

    #[test]
    fn test_missing_field_only_matches_negatives() {
        assert!(!check("assignee:bob"));
        assert!(check("assignee:neq:bob"));
        assert!(!check("framework:gt:1"));
    }

    #[test]
    fn test_logic_and_links() {
        assert!(check("link(blocks, req.auth) AND type:issue"));
        assert!(!check("link(validates, req.auth)"));
        assert!(check("type:feature OR tag:p1"));
        assert!(check("NOT type:feature"));
        assert!(!check("(type:issue OR type:bug) AND priority:2"));
    }

    #[test]
    fn test_structured_filters() {
        let n = issue();
        assert!(FilterSet::new().matches(&n));
        assert!(FilterSet::new().include_type(NeuronaType::Issue).matches(&n));
        assert!(!FilterSet::new().exclude_type(NeuronaType::Issue).matches(&n));
        assert!(FilterSet::new().include_tag("INFRA").include_tag("other").matches(&n));
        assert!(!FilterSet::new().exclude_tag("p1").matches(&n));
        assert!(FilterSet::new()
            .with_field(FieldFilter::new(FilterField::Title, FieldOp::Contains, "OUTAGE"))
            .matches(&n));
        assert!(!FilterSet::new()
            .with_field(FieldFilter::new(FilterField::Type, FieldOp::NotEqual, "issue"))
            .matches(&n));
    }

    #[test]
    fn test_connection_filter_and_equals_or() {
        let n = Neurona::new("t", "T", NeuronaType::TestCase)
            .with_connection("req.a", ConnectionType::Validates, 50)
            .with_connection("req.b", ConnectionType::Related, 50);
        for operator in [LogicOp::And, LogicOp::Or] {
            let by_type = ConnectionFilter {
                connection_type: Some(ConnectionType::Validates),
                target_id: None,
                operator,
            };
            assert!(by_type.matches(&n));
            let mismatched = ConnectionFilter {
                connection_type: Some(ConnectionType::Validates),
                target_id: Some("req.b".into()),
                operator,
            };
            assert!(!mismatched.matches(&n));
        }
    }
}
