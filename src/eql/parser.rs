//! EQL recursive descent parser.
//!
//! ```text
//! Expression -> Term { "OR" Term }
//! Term       -> Factor { "AND" Factor }
//! Factor     -> "NOT" Factor | "(" Expression ")" | Condition
//! Condition  -> field ":" [ operator ":" ] value | "link(" type "," target ")"
//! ```
//!
//! Parsing is all-or-nothing: any error discards the partial tree.

use crate::model::{ConnectionType, Value};
use crate::{Error, Result};
use super::ast::*;
use super::lexer::{Token, TokenKind};

/// Parser state: a token slice with a cursor.
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &'t Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_nth_kind(&self, n: usize) -> TokenKind {
        self.tokens[(self.pos + n).min(self.tokens.len() - 1)].kind
    }

    fn advance(&mut self) -> &'t Token {
        let tok = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&'t Token> {
        let tok = self.peek();
        if tok.kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(format!("Expected {:?}, got {:?} '{}'", kind, tok.kind, tok.text)))
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error(&self, msg: String) -> Error {
        Error::SyntaxError {
            position: self.peek().span.start,
            message: msg,
        }
    }
}

/// Parse a complete EQL query from tokens.
///
/// The slice must end with the `Eof` token `tokenize` appends.
pub fn parse_query(tokens: &[Token]) -> Result<QueryAst> {
    if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
        return Err(Error::SyntaxError {
            position: tokens.last().map_or(0, |t| t.span.end),
            message: "Token stream is not terminated by end of input".into(),
        });
    }
    let mut p = Parser::new(tokens);
    if p.at(TokenKind::Eof) {
        return Err(p.error("Empty query".into()));
    }
    let ast = parse_expression(&mut p)?;
    if !p.at(TokenKind::Eof) {
        let tok = p.peek();
        return Err(p.error(format!(
            "Unexpected {:?} '{}' after condition (missing AND/OR?)",
            tok.kind, tok.text
        )));
    }
    Ok(ast)
}

// ============================================================================
// Boolean structure
// ============================================================================

fn parse_expression(p: &mut Parser) -> Result<QueryAst> {
    let mut left = parse_term(p)?;
    while p.eat(TokenKind::Or) {
        let right = parse_term(p)?;
        left = QueryAst::or(left, right);
    }
    Ok(left)
}

fn parse_term(p: &mut Parser) -> Result<QueryAst> {
    let mut left = parse_factor(p)?;
    while p.eat(TokenKind::And) {
        let right = parse_factor(p)?;
        left = QueryAst::and(left, right);
    }
    Ok(left)
}

fn parse_factor(p: &mut Parser) -> Result<QueryAst> {
    match p.peek_kind() {
        TokenKind::Not => {
            p.advance();
            Ok(QueryAst::Not(Box::new(parse_factor(p)?)))
        }
        TokenKind::LParen => {
            p.advance();
            let inner = parse_expression(p)?;
            p.expect(TokenKind::RParen)?;
            Ok(QueryAst::Group(Box::new(inner)))
        }
        TokenKind::Word if p.peek().text == "link" && p.peek_nth_kind(1) == TokenKind::LParen => {
            parse_link(p)
        }
        TokenKind::Word => parse_condition(p),
        kind => Err(p.error(format!("Expected condition, got {:?} '{}'", kind, p.peek().text))),
    }
}

// ============================================================================
// Conditions
// ============================================================================

fn parse_link(p: &mut Parser) -> Result<QueryAst> {
    p.expect(TokenKind::Word)?;
    p.expect(TokenKind::LParen)?;
    let ty = p.expect(TokenKind::Word)?;
    let link_type: ConnectionType = ty.text.parse()?;
    p.expect(TokenKind::Comma)?;
    let link_target = parse_scalar(p)?.text.clone();
    p.expect(TokenKind::RParen)?;
    Ok(QueryAst::Link(LinkCondition { link_type, link_target }))
}

fn parse_condition(p: &mut Parser) -> Result<QueryAst> {
    let field = p.expect(TokenKind::Word)?.text.clone();
    if field.is_empty() || field.ends_with('.') {
        return Err(p.error(format!("Invalid field name '{field}'")));
    }
    p.expect(TokenKind::Colon)?;

    let first = parse_scalar(p)?;
    let (operator, raw) = if p.at(TokenKind::Colon) {
        // `field:op:value`. Only a bare word can name an operator.
        let op = match first.kind {
            TokenKind::Word => first.text.parse::<Operator>().map_err(|_| Error::SyntaxError {
                position: first.span.start,
                message: format!("Unknown operator '{}'", first.text),
            })?,
            _ => return Err(p.error("Operator must be a bare word".into())),
        };
        p.advance();
        (op, parse_scalar(p)?)
    } else {
        (Operator::Eq, first)
    };

    let value = match raw.kind {
        TokenKind::StringLiteral => Value::String(raw.text.clone()),
        _ => Value::parse_literal(&raw.text),
    };
    Ok(QueryAst::Condition(Condition { field, operator, value }))
}

fn parse_scalar<'t>(p: &mut Parser<'t>) -> Result<&'t Token> {
    match p.peek_kind() {
        TokenKind::Word | TokenKind::StringLiteral => Ok(p.advance()),
        kind => Err(p.error(format!("Expected value, got {:?} '{}'", kind, p.peek().text))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eql::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn parse(query: &str) -> Result<QueryAst> {
        let tokens = tokenize(query)?;
        parse_query(&tokens)
    }

    #[test]
    fn test_unterminated_token_stream_is_rejected() {
        assert!(matches!(parse_query(&[]), Err(Error::SyntaxError { position: 0, .. })));
        let mut tokens = tokenize("type:issue").unwrap();
        tokens.pop();
        assert!(matches!(parse_query(&tokens), Err(Error::SyntaxError { .. })));
    }

    #[test]
    fn test_single_condition() {
        let ast = parse("type:issue").unwrap();
        assert_eq!(ast, QueryAst::Condition(Condition::new("type", Operator::Eq, "issue")));
    }

    #[test]
    fn test_and_keeps_source_order() {
        let ast = parse("type:issue AND tag:p1").unwrap();
        assert_eq!(ast.logic_op(), Some(LogicOp::And));
        assert_eq!(ast.conditions(), vec![
            &Condition::new("type", Operator::Eq, "issue"),
            &Condition::new("tag", Operator::Eq, "p1"),
        ]);
    }

    #[test]
    fn test_explicit_operator_and_typed_value() {
        let ast = parse("priority:gte:3").unwrap();
        assert_eq!(ast, QueryAst::Condition(Condition::new("priority", Operator::Gte, 3i64)));
    }

    #[test]
    fn test_link_condition() {
        let ast = parse("link(validates, req.001)").unwrap();
        assert_eq!(ast, QueryAst::Link(LinkCondition {
            link_type: ConnectionType::Validates,
            link_target: "req.001".into(),
        }));
    }

    #[test]
    fn test_link_with_condition() {
        let ast = parse("link(validates, req.auth.001) AND type:test_case").unwrap();
        assert_eq!(ast.links().len(), 1);
        assert_eq!(ast.conditions().len(), 1);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let ast = parse("type:a OR type:b AND tag:x").unwrap();
        match ast {
            QueryAst::Logical { op: LogicOp::Or, right, .. } => {
                assert_eq!(right.logic_op(), Some(LogicOp::And));
            }
            other => panic!("Expected OR at root, got {other:?}"),
        }
    }

    #[test]
    fn test_group_and_not() {
        let ast = parse("(type:issue OR type:bug) AND NOT priority:1").unwrap();
        match ast {
            QueryAst::Logical { left, op: LogicOp::And, right } => {
                assert!(matches!(*left, QueryAst::Group(_)));
                assert!(matches!(*right, QueryAst::Not(_)));
            }
            other => panic!("Expected AND, got {other:?}"),
        }
    }

    #[test]
    fn test_context_field_and_quoted_value() {
        let ast = parse("context.status:'in progress'").unwrap();
        assert_eq!(ast, QueryAst::Condition(Condition::new("context.status", Operator::Eq, "in progress")));
    }

    #[test]
    fn test_quoted_number_stays_string() {
        let ast = parse("title:\"42\"").unwrap();
        assert_eq!(ast.conditions()[0].value, Value::from("42"));
    }

    #[test]
    fn test_unknown_operator_is_syntax_error() {
        let err = parse("priority:between:3").unwrap_err();
        assert!(matches!(err, Error::SyntaxError { position: 9, .. }));
    }

    #[test]
    fn test_unknown_link_type() {
        let err = parse("link(depends_on, x)").unwrap_err();
        assert!(matches!(err, Error::UnknownType { kind: "connection type", .. }));
    }

    #[test]
    fn test_malformed_inputs() {
        for q in ["", "type:", "type issue", "(type:issue", "type:issue AND", "link(validates x)", "type:issue tag:p1"] {
            assert!(parse(q).is_err(), "{q:?} should not parse");
        }
    }
}
