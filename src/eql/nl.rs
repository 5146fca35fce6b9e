//! Natural-language to filter translation.
//!
//! Keyword-table matching only: each whitespace token is classified as a
//! type, state, priority or tag keyword, a negation, a conjunction, or
//! filler. Output is always an AND-joined flat expression.

use tracing::debug;

use super::ast::{Condition, LogicOp, Operator, QueryExpression};
use crate::model::Value;

const TYPE_WORDS: &[(&str, &str)] = &[
    ("requirement", "requirement"),
    ("requirements", "requirement"),
    ("req", "requirement"),
    ("reqs", "requirement"),
    ("test", "test_case"),
    ("tests", "test_case"),
    ("testcase", "test_case"),
    ("testcases", "test_case"),
    ("issue", "issue"),
    ("issues", "issue"),
    ("ticket", "issue"),
    ("tickets", "issue"),
    ("feature", "feature"),
    ("features", "feature"),
    ("concept", "concept"),
    ("concepts", "concept"),
    ("lesson", "lesson"),
    ("lessons", "lesson"),
    ("reference", "reference"),
    ("references", "reference"),
    ("artifact", "artifact"),
    ("artifacts", "artifact"),
];

const STATE_WORDS: &[(&str, &str)] = &[
    ("passing", "passing"),
    ("passed", "passing"),
    ("failing", "failing"),
    ("failed", "failing"),
    ("open", "open"),
    ("opened", "open"),
    ("closed", "closed"),
    ("resolved", "closed"),
    ("blocked", "blocked"),
    ("draft", "draft"),
    ("implemented", "implemented"),
    ("done", "done"),
    ("pending", "pending"),
];

const PRIORITY_WORDS: &[(&str, i64)] = &[
    ("p1", 1),
    ("critical", 1),
    ("urgent", 1),
    ("high", 1),
    ("p2", 2),
    ("medium", 2),
    ("p3", 3),
    ("low", 3),
];

const TAG_WORDS: &[(&str, &str)] = &[
    ("bug", "bug"),
    ("bugs", "bug"),
    ("security", "security"),
    ("perf", "performance"),
    ("performance", "performance"),
    ("regression", "regression"),
    ("regressions", "regression"),
];

const NEGATIONS: &[&str] = &["not", "no", "non", "without", "never"];

const CONJUNCTIONS: &[&str] = &["and", "or", "with", "plus", "also", "but"];

const FILLERS: &[&str] = &[
    "show", "me", "all", "the", "find", "list", "get", "that", "are", "is", "which", "a", "an",
    "of", "for", "to", "in", "priority", "tagged", "status",
];

enum Word {
    Type(&'static str),
    State(&'static str),
    Priority(i64),
    Tag(&'static str),
    Negation,
    Conjunction,
    Filler,
    Unknown,
}

fn lookup<T: Copy>(table: &[(&str, T)], word: &str) -> Option<T> {
    table.iter().find(|(k, _)| *k == word).map(|(_, v)| *v)
}

fn classify(word: &str) -> Word {
    if let Some(t) = lookup(TYPE_WORDS, word) {
        Word::Type(t)
    } else if let Some(s) = lookup(STATE_WORDS, word) {
        Word::State(s)
    } else if let Some(p) = lookup(PRIORITY_WORDS, word) {
        Word::Priority(p)
    } else if let Some(t) = lookup(TAG_WORDS, word) {
        Word::Tag(t)
    } else if NEGATIONS.contains(&word) {
        Word::Negation
    } else if CONJUNCTIONS.contains(&word) {
        Word::Conjunction
    } else if FILLERS.contains(&word) {
        Word::Filler
    } else {
        Word::Unknown
    }
}

/// Translate a natural-language request into an AND-joined expression.
///
/// A negation flips the operator of the next type or state keyword only.
/// Unknown words are ignored, so the result may be empty.
pub fn translate(input: &str) -> QueryExpression {
    let mut conditions = Vec::new();
    let mut negate = false;

    for raw in input.split_whitespace() {
        let word = raw
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '_')
            .to_lowercase();
        let op = if negate { Operator::Neq } else { Operator::Eq };
        match classify(&word) {
            Word::Type(t) => {
                conditions.push(Condition::new("type", op, t));
                negate = false;
            }
            Word::State(s) => {
                conditions.push(Condition::new("status", op, s));
                negate = false;
            }
            Word::Priority(p) => conditions.push(Condition::new("priority", Operator::Eq, Value::Int(p))),
            Word::Tag(t) => conditions.push(Condition::new("tag", Operator::Eq, t)),
            Word::Negation => negate = true,
            Word::Conjunction | Word::Filler => {}
            Word::Unknown => debug!(word = %word, "ignoring unrecognized word"),
        }
    }

    QueryExpression {
        logic_op: (conditions.len() > 1).then_some(LogicOp::And),
        conditions,
    }
}
