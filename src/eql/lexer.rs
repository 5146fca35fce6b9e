//! EQL lexer. Tokenizes a query string.

use crate::{Error, Result};

/// A token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
}

/// Source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords (uppercase only; `and` is a plain word)
    And, Or, Not,

    // Field names, operators, bare values, `link`
    Word,
    StringLiteral,

    // Punctuation
    LParen, RParen, Colon, Comma,

    Eof,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | ':' | ',' | '\'' | '"')
}

/// Tokenize an EQL query string.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(pos, ch)) = chars.peek() {
        match ch {
            c if c.is_whitespace() => { chars.next(); }

            // String literals
            '\'' | '"' => {
                let quote = ch;
                chars.next();
                let start = pos;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\\')) => {
                            if let Some((_, escaped)) = chars.next() {
                                match escaped {
                                    '\\' => s.push('\\'),
                                    c if c == quote => s.push(c),
                                    c => { s.push('\\'); s.push(c); }
                                }
                            }
                        }
                        Some((end, c)) if c == quote => {
                            tokens.push(Token {
                                kind: TokenKind::StringLiteral,
                                span: Span { start, end: end + 1 },
                                text: s,
                            });
                            break;
                        }
                        Some((_, c)) => s.push(c),
                        None => return Err(Error::SyntaxError {
                            position: start,
                            message: "Unterminated string literal".into(),
                        }),
                    }
                }
            }

            '(' => { chars.next(); tokens.push(punct(TokenKind::LParen, pos, "(")); }
            ')' => { chars.next(); tokens.push(punct(TokenKind::RParen, pos, ")")); }
            ':' => { chars.next(); tokens.push(punct(TokenKind::Colon, pos, ":")); }
            ',' => { chars.next(); tokens.push(punct(TokenKind::Comma, pos, ",")); }

            _ => {
                let start = pos;
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if is_word_char(c) {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    kind: keyword_or_word(&word),
                    span: Span { start, end: start + word.len() },
                    text: word,
                });
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        span: Span { start: input.len(), end: input.len() },
        text: String::new(),
    });

    Ok(tokens)
}

fn punct(kind: TokenKind, pos: usize, text: &str) -> Token {
    Token {
        kind,
        span: Span { start: pos, end: pos + text.len() },
        text: text.to_string(),
    }
}

fn keyword_or_word(s: &str) -> TokenKind {
    match s {
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        _ => TokenKind::Word,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_condition_with_operator() {
        assert_eq!(kinds("priority:gte:3"), vec![
            TokenKind::Word,
            TokenKind::Colon,
            TokenKind::Word,
            TokenKind::Colon,
            TokenKind::Word,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_link_call() {
        let tokens = tokenize("link(validates, req.auth.001)").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![
            TokenKind::Word,
            TokenKind::LParen,
            TokenKind::Word,
            TokenKind::Comma,
            TokenKind::Word,
            TokenKind::RParen,
            TokenKind::Eof,
        ]);
        assert_eq!(tokens[4].text, "req.auth.001");
    }

    #[test]
    fn test_keywords_are_uppercase_only() {
        assert_eq!(kinds("AND and OR or NOT"), vec![
            TokenKind::And,
            TokenKind::Word,
            TokenKind::Or,
            TokenKind::Word,
            TokenKind::Not,
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn test_string_literal_keeps_spaces() {
        let tokens = tokenize("title:contains:'auth flow'").unwrap();
        assert_eq!(tokens[4].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[4].text, "auth flow");
        assert_eq!(tokens[4].span, Span { start: 15, end: 26 });
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("title:'oops").unwrap_err();
        assert!(matches!(err, Error::SyntaxError { position: 6, .. }));
    }
}
