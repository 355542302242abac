//! Tokenizer for condition expressions.

use super::ast::Comparator;
use crate::error::{GuardError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    And,
    Or,
    Not,
    In,
    Is,
    LeftParen,
    RightParen,
    Comma,
    Op(Comparator),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset in the expression
    pub position: usize,
}

pub(crate) fn syntax_error(expression: &str, position: usize, message: impl Into<String>) -> GuardError {
    GuardError::Condition {
        expression: expression.to_string(),
        position,
        message: message.into(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Splits an expression into tokens.
pub(crate) fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let chars: Vec<(usize, char)> = expression.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (position, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let simple = match c {
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            ',' => Some(TokenKind::Comma),
            _ => None,
        };
        if let Some(kind) = simple {
            tokens.push(Token { kind, position });
            i += 1;
            continue;
        }

        // Two-character comparators must be checked before their one-character prefixes.
        let next = chars.get(i + 1).map(|(_, c)| *c);
        let comparator = match (c, next) {
            ('=', Some('=')) => Some((Comparator::Eq, 2)),
            ('!', Some('=')) => Some((Comparator::NotEq, 2)),
            ('>', Some('=')) => Some((Comparator::GtEq, 2)),
            ('<', Some('=')) => Some((Comparator::LtEq, 2)),
            ('>', _) => Some((Comparator::Gt, 1)),
            ('<', _) => Some((Comparator::Lt, 1)),
            ('=', _) => {
                return Err(syntax_error(expression, position, "use '==' for equality"));
            }
            _ => None,
        };
        if let Some((op, width)) = comparator {
            tokens.push(Token {
                kind: TokenKind::Op(op),
                position,
            });
            i += width;
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            let mut value = String::new();
            let mut j = i + 1;
            let mut closed = false;
            while j < chars.len() {
                let (_, ch) = chars[j];
                if ch == '\\' {
                    if let Some((_, escaped)) = chars.get(j + 1) {
                        value.push(*escaped);
                        j += 2;
                        continue;
                    }
                }
                if ch == quote {
                    closed = true;
                    break;
                }
                value.push(ch);
                j += 1;
            }
            if !closed {
                return Err(syntax_error(expression, position, "unterminated string literal"));
            }
            tokens.push(Token {
                kind: TokenKind::Str(value),
                position,
            });
            i = j + 1;
            continue;
        }

        let starts_number = c.is_ascii_digit()
            || (c == '-' && next.is_some_and(|n| n.is_ascii_digit() || n == '.'))
            || (c == '.' && next.is_some_and(|n| n.is_ascii_digit()));
        if starts_number {
            let mut j = i + 1;
            while j < chars.len() {
                let ch = chars[j].1;
                let prev = chars[j - 1].1;
                let exponent_sign = (ch == '-' || ch == '+') && (prev == 'e' || prev == 'E');
                if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || exponent_sign {
                    j += 1;
                } else {
                    break;
                }
            }
            let end = chars.get(j).map(|(p, _)| *p).unwrap_or(expression.len());
            let text = &expression[position..end];
            let kind = if text.contains(['.', 'e', 'E']) {
                text.parse::<f64>().map(TokenKind::Float).ok()
            } else {
                text.parse::<i64>()
                    .map(TokenKind::Int)
                    .ok()
                    .or_else(|| text.parse::<f64>().map(TokenKind::Float).ok())
            };
            let kind = kind.ok_or_else(|| {
                syntax_error(expression, position, format!("invalid number '{text}'"))
            })?;
            tokens.push(Token { kind, position });
            i = j;
            continue;
        }

        if is_ident_start(c) {
            let mut j = i + 1;
            while j < chars.len() && is_ident_char(chars[j].1) {
                j += 1;
            }
            let end = chars.get(j).map(|(p, _)| *p).unwrap_or(expression.len());
            let word = &expression[position..end];
            let kind = match word.to_ascii_uppercase().as_str() {
                "AND" => TokenKind::And,
                "OR" => TokenKind::Or,
                "NOT" => TokenKind::Not,
                "IN" => TokenKind::In,
                "IS" => TokenKind::Is,
                "NULL" => TokenKind::Null,
                "TRUE" => TokenKind::Bool(true),
                "FALSE" => TokenKind::Bool(false),
                _ => TokenKind::Ident(word.to_string()),
            };
            tokens.push(Token { kind, position });
            i = j;
            continue;
        }

        return Err(syntax_error(
            expression,
            position,
            format!("unexpected character '{c}'"),
        ));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(expression: &str) -> Vec<TokenKind> {
        tokenize(expression)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_comparison_chain() {
        assert_eq!(
            kinds("age >= 18 and age < 65"),
            vec![
                TokenKind::Ident("age".to_string()),
                TokenKind::Op(Comparator::GtEq),
                TokenKind::Int(18),
                TokenKind::And,
                TokenKind::Ident("age".to_string()),
                TokenKind::Op(Comparator::Lt),
                TokenKind::Int(65),
            ]
        );
    }

    #[test]
    fn test_tokenize_literals() {
        assert_eq!(
            kinds(r#"name == 'O\'Brien' OR code IN ("a", -1.5, 2e3, TRUE)"#),
            vec![
                TokenKind::Ident("name".to_string()),
                TokenKind::Op(Comparator::Eq),
                TokenKind::Str("O'Brien".to_string()),
                TokenKind::Or,
                TokenKind::Ident("code".to_string()),
                TokenKind::In,
                TokenKind::LeftParen,
                TokenKind::Str("a".to_string()),
                TokenKind::Comma,
                TokenKind::Float(-1.5),
                TokenKind::Comma,
                TokenKind::Float(2000.0),
                TokenKind::Comma,
                TokenKind::Bool(true),
                TokenKind::RightParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_reports_positions() {
        let err = tokenize("status == 'open").unwrap_err();
        assert!(matches!(err, GuardError::Condition { position: 10, .. }));

        let err = tokenize("a = 1").unwrap_err();
        assert!(err.to_string().contains("use '=='"));

        let err = tokenize("a == 1 & b").unwrap_err();
        assert!(matches!(err, GuardError::Condition { position: 7, .. }));
    }
}
