//! Recursive-descent parser for condition expressions.
//!
//! Precedence from loosest to tightest: `OR`, `AND`, `NOT`, terms.

use super::ast::{Expr, Literal};
use super::lexer::{syntax_error, tokenize, Token, TokenKind};
use crate::error::{GuardError, Result};

/// Parses `expression` into an [`Expr`].
pub(crate) fn parse(expression: &str) -> Result<Expr> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(syntax_error(expression, 0, "empty condition"));
    }
    let mut parser = Parser {
        expression,
        tokens,
        pos: 0,
    };
    let expr = parser.parse_or()?;
    if let Some(token) = parser.peek() {
        return Err(parser.error_at(token.position, "unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().is_some_and(|t| &t.kind == kind)
    }

    fn end_position(&self) -> usize {
        self.expression.len()
    }

    fn error_at(&self, position: usize, message: impl Into<String>) -> GuardError {
        syntax_error(self.expression, position, message)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<()> {
        match self.advance() {
            Some(token) if token.kind == kind => Ok(()),
            Some(token) => Err(self.error_at(token.position, format!("expected {what}"))),
            None => Err(self.error_at(self.end_position(), format!("expected {what}"))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while self.check(&TokenKind::And) {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.check(&TokenKind::Not) {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_term()
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let token = self
            .advance()
            .ok_or_else(|| self.error_at(self.end_position(), "expected a field or '('"))?;

        let field = match token.kind {
            TokenKind::LeftParen => {
                let inner = self.parse_or()?;
                self.expect(TokenKind::RightParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::Ident(name) => name,
            _ => return Err(self.error_at(token.position, "expected a field or '('")),
        };

        let next = self.advance().ok_or_else(|| {
            self.error_at(self.end_position(), format!("expected an operator after '{field}'"))
        })?;

        match next.kind {
            TokenKind::Op(op) => {
                let value = self.parse_literal()?;
                Ok(Expr::Compare { field, op, value })
            }
            TokenKind::In => {
                let values = self.parse_list()?;
                Ok(Expr::InList {
                    field,
                    values,
                    negated: false,
                })
            }
            TokenKind::Not => {
                self.expect(TokenKind::In, "IN after NOT")?;
                let values = self.parse_list()?;
                Ok(Expr::InList {
                    field,
                    values,
                    negated: true,
                })
            }
            TokenKind::Is => {
                let negated = self.check(&TokenKind::Not);
                if negated {
                    self.advance();
                }
                self.expect(TokenKind::Null, "NULL")?;
                Ok(Expr::IsNull { field, negated })
            }
            _ => Err(self.error_at(
                next.position,
                format!("expected an operator after '{field}'"),
            )),
        }
    }

    fn parse_list(&mut self) -> Result<Vec<Literal>> {
        self.expect(TokenKind::LeftParen, "'(' to open the IN list")?;
        let mut values = vec![self.parse_literal()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            values.push(self.parse_literal()?);
        }
        self.expect(TokenKind::RightParen, "')' to close the IN list")?;
        Ok(values)
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        match self.advance() {
            Some(Token {
                kind: TokenKind::Str(s),
                ..
            }) => Ok(Literal::Str(s)),
            Some(Token {
                kind: TokenKind::Int(v),
                ..
            }) => Ok(Literal::Int(v)),
            Some(Token {
                kind: TokenKind::Float(v),
                ..
            }) => Ok(Literal::Float(v)),
            Some(Token {
                kind: TokenKind::Bool(v),
                ..
            }) => Ok(Literal::Bool(v)),
            Some(Token {
                kind: TokenKind::Null,
                position,
            }) => Err(self.error_at(position, "use IS NULL to test for null")),
            Some(token) => Err(self.error_at(token.position, "expected a literal")),
            None => Err(self.error_at(self.end_position(), "expected a literal")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ast::Comparator;

    fn cmp(field: &str, op: Comparator, value: Literal) -> Expr {
        Expr::Compare {
            field: field.to_string(),
            op,
            value,
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let expr = parse("a == 1 OR b == 2 AND c == 3").unwrap();
        assert_eq!(
            expr,
            Expr::Or(
                Box::new(cmp("a", Comparator::Eq, Literal::Int(1))),
                Box::new(Expr::And(
                    Box::new(cmp("b", Comparator::Eq, Literal::Int(2))),
                    Box::new(cmp("c", Comparator::Eq, Literal::Int(3))),
                )),
            )
        );
    }

    #[test]
    fn test_parentheses_and_not() {
        let expr = parse("NOT (status == 'ACTIVE' or status IS NULL)").unwrap();
        assert_eq!(
            expr.to_string(),
            "NOT (status == 'ACTIVE' OR status IS NULL)"
        );
    }

    #[test]
    fn test_in_and_null_tests() {
        let expr = parse("region NOT IN ('EU', 'US') AND owner IS NOT NULL").unwrap();
        assert_eq!(
            expr,
            Expr::And(
                Box::new(Expr::InList {
                    field: "region".to_string(),
                    values: vec![Literal::Str("EU".to_string()), Literal::Str("US".to_string())],
                    negated: true,
                }),
                Box::new(Expr::IsNull {
                    field: "owner".to_string(),
                    negated: true,
                }),
            )
        );
    }

    #[test]
    fn test_syntax_errors_carry_positions() {
        let cases = [
            ("", 0),
            ("age >=", 6),
            ("age 18", 4),
            ("(age > 1", 8),
            ("age > 1 age", 8),
            ("x IN ('a',)", 10),
            ("x == NULL", 5),
        ];
        for (expression, expected) in cases {
            match parse(expression) {
                Err(GuardError::Condition { position, .. }) => {
                    assert_eq!(position, expected, "position for {expression:?}")
                }
                other => panic!("expected a syntax error for {expression:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_collect_fields_deduplicates() {
        let expr = parse("age >= 18 AND age < 65 OR region == 'EU'").unwrap();
        let mut fields = Vec::new();
        expr.collect_fields(&mut fields);
        assert_eq!(fields, vec!["age", "region"]);
    }
}
