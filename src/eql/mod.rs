//! # EQL
//!
//! The structured query language (`type:issue AND tag:p1`) and the
//! natural-language fallback. Pure functions: no I/O, no store access.

pub mod ast;
pub mod lexer;
pub mod nl;
pub mod parser;

use tracing::debug;

use crate::Result;
use ast::QueryAst;

/// Field prefixes that mark a string as EQL.
const FIELD_PREFIXES: &[&str] = &[
    "type:", "tag:", "tags:", "id:", "title:", "body:", "priority:", "status:", "assignee:",
    "link(",
];

/// Parse an EQL query string into an AST.
pub fn parse(query: &str) -> Result<QueryAst> {
    let tokens = lexer::tokenize(query)?;
    parser::parse_query(&tokens)
}

/// Heuristic router: true if `s` contains a known field prefix, a
/// `context.<key>:` prefix, or a colon together with an uppercase `AND`/`OR`.
pub fn is_eql_query(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    if FIELD_PREFIXES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    if has_context_prefix(&lower) {
        return true;
    }
    s.contains(':') && s.split_whitespace().any(|w| w == "AND" || w == "OR")
}

fn has_context_prefix(lower: &str) -> bool {
    lower.match_indices("context.").any(|(i, m)| {
        let rest = &lower[i + m.len()..];
        let key_len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        key_len > 0 && rest[key_len..].starts_with(':')
    })
}

/// Compile user input into a filter AST, routing between EQL and the
/// natural-language translator. `Ok(None)` means the input carried no
/// recognizable condition.
pub fn compile(input: &str) -> Result<Option<QueryAst>> {
    if is_eql_query(input) {
        debug!(query = input, "routing to EQL parser");
        parse(input).map(Some)
    } else {
        debug!(query = input, "routing to natural-language translator");
        Ok(nl::translate(input).to_ast())
    }
}
