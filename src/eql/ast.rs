//! EQL AST
//!
//! Pure data produced by the EQL parser and the natural-language translator.
//! Evaluation against a Neurona lives in `retrieval::filter`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{ConnectionType, Value};
use crate::{Error, Result};

/// Comparison operator in `field:op:value`. Defaults to `Eq`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    NotContains,
}

impl Operator {
    pub const ALL: [Operator; 8] = [
        Operator::Eq,
        Operator::Neq,
        Operator::Gt,
        Operator::Lt,
        Operator::Gte,
        Operator::Lte,
        Operator::Contains,
        Operator::NotContains,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
        }
    }

    /// The operator that accepts exactly the values this one rejects.
    pub fn negate(self) -> Operator {
        match self {
            Operator::Eq => Operator::Neq,
            Operator::Neq => Operator::Eq,
            Operator::Gt => Operator::Lte,
            Operator::Lte => Operator::Gt,
            Operator::Lt => Operator::Gte,
            Operator::Gte => Operator::Lt,
            Operator::Contains => Operator::NotContains,
            Operator::NotContains => Operator::Contains,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::UnknownType { kind: "operator", value: s.to_string() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOp {
    And,
    Or,
}

/// `field:op:value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self { field: field.into(), operator, value: value.into() }
    }
}

/// `link(type, target)`: the node has a connection of `link_type` to
/// `link_target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkCondition {
    pub link_type: ConnectionType,
    pub link_target: String,
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryAst {
    Condition(Condition),
    Link(LinkCondition),
    Logical {
        left: Box<QueryAst>,
        op: LogicOp,
        right: Box<QueryAst>,
    },
    Not(Box<QueryAst>),
    Group(Box<QueryAst>),
}

impl QueryAst {
    pub fn and(left: QueryAst, right: QueryAst) -> QueryAst {
        QueryAst::Logical { left: Box::new(left), op: LogicOp::And, right: Box::new(right) }
    }

    pub fn or(left: QueryAst, right: QueryAst) -> QueryAst {
        QueryAst::Logical { left: Box::new(left), op: LogicOp::Or, right: Box::new(right) }
    }

    /// Every field condition in source order.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let QueryAst::Condition(c) = node {
                out.push(c);
            }
        });
        out
    }

    /// Every link condition in source order.
    pub fn links(&self) -> Vec<&LinkCondition> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let QueryAst::Link(l) = node {
                out.push(l);
            }
        });
        out
    }

    /// Operator of the outermost logical node, looking through groups.
    pub fn logic_op(&self) -> Option<LogicOp> {
        match self {
            QueryAst::Logical { op, .. } => Some(*op),
            QueryAst::Group(inner) => inner.logic_op(),
            _ => None,
        }
    }

    fn walk<'a>(&'a self, f: &mut impl FnMut(&'a QueryAst)) {
        f(self);
        match self {
            QueryAst::Logical { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            QueryAst::Not(inner) | QueryAst::Group(inner) => inner.walk(f),
            QueryAst::Condition(_) | QueryAst::Link(_) => {}
        }
    }
}

/// Flat condition list joined by one operator, as produced by the
/// natural-language translator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryExpression {
    pub conditions: Vec<Condition>,
    pub logic_op: Option<LogicOp>,
}

impl QueryExpression {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Left-deep AST; `None` when there are no conditions.
    pub fn to_ast(&self) -> Option<QueryAst> {
        let op = self.logic_op.unwrap_or(LogicOp::And);
        self.conditions
            .iter()
            .cloned()
            .map(QueryAst::Condition)
            .reduce(|left, right| QueryAst::Logical {
                left: Box::new(left),
                op,
                right: Box::new(right),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_operator_negate_is_involution() {
        for op in Operator::ALL {
            assert_eq!(op.negate().negate(), op);
        }
    }

    #[test]
    fn test_expression_to_ast_is_left_deep() {
        let expr = QueryExpression {
            conditions: vec![
                Condition::new("type", Operator::Eq, "issue"),
                Condition::new("tag", Operator::Eq, "bug"),
                Condition::new("priority", Operator::Eq, 1i64),
            ],
            logic_op: Some(LogicOp::And),
        };
        let ast = expr.to_ast().unwrap();
        let fields: Vec<_> = ast.conditions().iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["type", "tag", "priority"]);
        assert_eq!(ast.logic_op(), Some(LogicOp::And));
    }

    #[test]
    fn test_empty_expression_has_no_ast() {
        assert_eq!(QueryExpression::default().to_ast(), None);
    }
}
