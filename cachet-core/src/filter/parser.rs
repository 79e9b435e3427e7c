//! Recursive-descent parser for `$filter`.
//!
//! Precedence, loosest first: `or`, `and`, `not`, then comparisons, function
//! calls and parenthesized groups. Chains of `and`/`or` are joined pairwise
//! and `not`/parenthesis nesting is capped at [`MAX_FILTER_DEPTH`], so the
//! resulting tree stays shallow whatever the input length.

use super::lexer::{Lexer, Token, TokenKind};
use super::{FilterNode, FilterOperator, Literal, MAX_FILTER_DEPTH};
use crate::error::FilterError;

/// Parse a `$filter` expression into a [`FilterNode`].
pub fn parse_filter(source: &str) -> Result<FilterNode, FilterError> {
    let tokens = Lexer::new(source).tokenize();
    if let Some(bad) = tokens.iter().find(|t| matches!(t.kind, TokenKind::Error(_))) {
        return Err(FilterError::InvalidSyntax {
            position: bad.position,
            reason: bad.kind.to_string(),
        });
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
    };
    if parser.is_at_end() {
        return Err(parser.error("empty filter expression"));
    }

    let node = parser.parse_or_expr()?;
    if !parser.is_at_end() {
        return Err(parser.error(&format!("unexpected {}", parser.current().kind)));
    }
    node.check_depth()?;
    Ok(node)
}

enum Operand {
    Member(String),
    Literal(Literal),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Open `not`s and parentheses around the current position.
    nesting: usize,
}

impl Parser {
    fn parse_or_expr(&mut self) -> Result<FilterNode, FilterError> {
        let mut operands = vec![self.parse_and_expr()?];

        while self.check(&TokenKind::Or) {
            self.advance();
            operands.push(self.parse_and_expr()?);
        }

        self.join_pairwise(operands, FilterNode::or)
    }

    fn parse_and_expr(&mut self) -> Result<FilterNode, FilterError> {
        let mut operands = vec![self.parse_unary()?];

        while self.check(&TokenKind::And) {
            self.advance();
            operands.push(self.parse_unary()?);
        }

        self.join_pairwise(operands, FilterNode::and)
    }

    fn parse_unary(&mut self) -> Result<FilterNode, FilterError> {
        if self.check(&TokenKind::Not) {
            self.advance();
            self.descend()?;
            let inner = self.parse_unary()?;
            self.nesting -= 1;
            return Ok(inner.negate());
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<FilterNode, FilterError> {
        if self.check(&TokenKind::LParen) {
            self.advance();
            self.descend()?;
            let expr = self.parse_or_expr()?;
            self.expect(TokenKind::RParen)?;
            self.nesting -= 1;
            return Ok(expr);
        }

        if let TokenKind::Identifier(name) = &self.current().kind {
            if self.peek_kind(1) == Some(&TokenKind::LParen) {
                let name = name.clone();
                let call = self.parse_function_call(&name)?;
                return self.parse_boolean_suffix(call);
            }
        }

        self.parse_comparison()
    }

    /// `contains(m, 'x')`, `startswith(m, 'x')`, `endswith(m, 'x')` and the
    /// older `substringof('x', m)`.
    fn parse_function_call(&mut self, name: &str) -> Result<FilterNode, FilterError> {
        let operator = match name {
            "contains" | "substringof" => FilterOperator::Contains,
            "startswith" => FilterOperator::StartsWith,
            "endswith" => FilterOperator::EndsWith,
            other => {
                return Err(FilterError::UnsupportedOperator {
                    operator: other.to_string(),
                })
            }
        };

        self.advance(); // function name
        self.expect(TokenKind::LParen)?;
        let first = self.parse_operand()?;
        self.expect(TokenKind::Comma)?;
        let second = self.parse_operand()?;
        self.expect(TokenKind::RParen)?;

        let (member, literal) = if name == "substringof" {
            (second, first)
        } else {
            (first, second)
        };

        match (member, literal) {
            (Operand::Member(field), Operand::Literal(literal)) => {
                Ok(FilterNode::comparison(field, operator, literal))
            }
            _ => Err(self.error(&format!(
                "{} expects a member and a literal argument",
                name
            ))),
        }
    }

    /// Accept `fn(...) eq true` and `fn(...) eq false` after a function call.
    fn parse_boolean_suffix(&mut self, call: FilterNode) -> Result<FilterNode, FilterError> {
        let negate = match (&self.current().kind, self.peek_kind(1)) {
            (TokenKind::Eq, Some(TokenKind::True)) | (TokenKind::Ne, Some(TokenKind::False)) => {
                false
            }
            (TokenKind::Eq, Some(TokenKind::False)) | (TokenKind::Ne, Some(TokenKind::True)) => {
                true
            }
            _ => return Ok(call),
        };
        self.advance();
        self.advance();
        Ok(if negate { call.negate() } else { call })
    }

    fn parse_comparison(&mut self) -> Result<FilterNode, FilterError> {
        let left_pos = self.current().position;
        let left = self.parse_operand()?;
        let operator = self.parse_compare_op()?;
        let right = self.parse_operand()?;

        match (left, right) {
            (Operand::Member(field), Operand::Literal(literal)) => {
                Ok(FilterNode::comparison(field, operator, literal))
            }
            (Operand::Literal(literal), Operand::Member(field)) => match operator.mirrored() {
                Some(mirrored) => Ok(FilterNode::comparison(field, mirrored, literal)),
                None => Err(FilterError::UnsupportedOperator {
                    operator: operator.to_string(),
                }),
            },
            (Operand::Member(_), Operand::Member(_)) => Err(FilterError::InvalidSyntax {
                position: left_pos,
                reason: "comparing two members is not supported".to_string(),
            }),
            (Operand::Literal(_), Operand::Literal(_)) => Err(FilterError::InvalidSyntax {
                position: left_pos,
                reason: "comparison needs a member operand".to_string(),
            }),
        }
    }

    fn parse_compare_op(&mut self) -> Result<FilterOperator, FilterError> {
        let operator = match &self.current().kind {
            TokenKind::Eq => FilterOperator::Eq,
            TokenKind::Ne => FilterOperator::Ne,
            TokenKind::Gt => FilterOperator::Gt,
            TokenKind::Ge => FilterOperator::Gte,
            TokenKind::Lt => FilterOperator::Lt,
            TokenKind::Le => FilterOperator::Lte,
            TokenKind::Has => FilterOperator::Has,
            other => {
                return Err(self.error(&format!(
                    "expected comparison operator, found {}",
                    other
                )))
            }
        };
        self.advance();
        Ok(operator)
    }

    fn parse_operand(&mut self) -> Result<Operand, FilterError> {
        let operand = match &self.current().kind {
            TokenKind::Identifier(name) => Operand::Member(name.clone()),
            TokenKind::String(s) => Operand::Literal(Literal::String(s.clone())),
            TokenKind::Integer(i) => Operand::Literal(Literal::Integer(*i)),
            TokenKind::Float(x) => Operand::Literal(Literal::Float(*x)),
            TokenKind::True => Operand::Literal(Literal::Boolean(true)),
            TokenKind::False => Operand::Literal(Literal::Boolean(false)),
            TokenKind::Null => Operand::Literal(Literal::Null),
            other => return Err(self.error(&format!("expected member or literal, found {}", other))),
        };
        self.advance();
        Ok(operand)
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn descend(&mut self) -> Result<(), FilterError> {
        if self.nesting >= MAX_FILTER_DEPTH {
            return Err(FilterError::TooDeep {
                max_depth: MAX_FILTER_DEPTH,
            });
        }
        self.nesting += 1;
        Ok(())
    }

    /// Join neighbours pass by pass: `a or b or c or d` becomes
    /// `(a or b) or (c or d)`. Three operands still fold to the left.
    fn join_pairwise(
        &self,
        mut operands: Vec<FilterNode>,
        join: fn(FilterNode, FilterNode) -> FilterNode,
    ) -> Result<FilterNode, FilterError> {
        while operands.len() > 1 {
            let mut joined = Vec::with_capacity(operands.len().div_ceil(2));
            let mut rest = operands.into_iter();
            while let Some(left) = rest.next() {
                joined.push(match rest.next() {
                    Some(right) => join(left, right),
                    None => left,
                });
            }
            operands = joined;
        }
        operands
            .pop()
            .ok_or_else(|| self.error("empty filter expression"))
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), FilterError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected {}, found {}",
                kind,
                self.current().kind
            )))
        }
    }

    fn error(&self, msg: &str) -> FilterError {
        FilterError::InvalidSyntax {
            position: self.current().position,
            reason: msg.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cmp(field: &str, operator: FilterOperator, literal: Literal) -> FilterNode {
        FilterNode::comparison(field, operator, literal)
    }

    #[test]
    fn test_simple_equality() -> Result<(), FilterError> {
        assert_eq!(
            parse_filter("jsonValue eq 'k1'")?,
            cmp("jsonValue", FilterOperator::Eq, Literal::String("k1".into()))
        );
        Ok(())
    }

    #[test]
    fn test_and_binds_tighter_than_or() -> Result<(), FilterError> {
        let a = cmp("a", FilterOperator::Eq, Literal::Integer(1));
        let b = cmp("b", FilterOperator::Eq, Literal::Integer(2));
        let c = cmp("c", FilterOperator::Eq, Literal::Integer(3));

        assert_eq!(
            parse_filter("a eq 1 or b eq 2 and c eq 3")?,
            a.clone().or(b.clone().and(c.clone()))
        );
        assert_eq!(
            parse_filter("(a eq 1 or b eq 2) and c eq 3")?,
            a.or(b).and(c)
        );
        Ok(())
    }

    #[test]
    fn test_not_applies_to_next_term() -> Result<(), FilterError> {
        let a = cmp("a", FilterOperator::Eq, Literal::Boolean(true));
        let b = cmp("b", FilterOperator::Eq, Literal::Null);
        assert_eq!(
            parse_filter("not a eq true and b eq null")?,
            a.negate().and(b)
        );
        Ok(())
    }

    #[test]
    fn test_functions() -> Result<(), FilterError> {
        let expected = cmp(
            "jsonValue/title",
            FilterOperator::Contains,
            Literal::String("un".into()),
        );
        assert_eq!(parse_filter("contains(jsonValue/title, 'un')")?, expected);
        assert_eq!(parse_filter("substringof('un', jsonValue/title)")?, expected);
        assert_eq!(
            parse_filter("substringof('un', jsonValue/title) eq true")?,
            expected
        );
        assert_eq!(
            parse_filter("startswith(jsonValue/title, 'Du') eq false")?,
            cmp(
                "jsonValue/title",
                FilterOperator::StartsWith,
                Literal::String("Du".into())
            )
            .negate()
        );
        Ok(())
    }

    #[test]
    fn test_literal_first_is_mirrored() -> Result<(), FilterError> {
        assert_eq!(
            parse_filter("100 lt jsonValue/pages")?,
            cmp("jsonValue/pages", FilterOperator::Gt, Literal::Integer(100))
        );
        Ok(())
    }

    #[test]
    fn test_has_is_parsed() -> Result<(), FilterError> {
        assert_eq!(
            parse_filter("jsonValue/flags has 'Red'")?,
            cmp("jsonValue/flags", FilterOperator::Has, Literal::String("Red".into()))
        );
        Ok(())
    }

    #[test]
    fn test_syntax_errors_carry_position() {
        match parse_filter("jsonValue eq") {
            Err(FilterError::InvalidSyntax { position, .. }) => assert_eq!(position, 12),
            other => panic!("unexpected result: {:?}", other),
        }
        match parse_filter("a eq 1 )") {
            Err(FilterError::InvalidSyntax { position, .. }) => assert_eq!(position, 7),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(
            parse_filter(""),
            Err(FilterError::InvalidSyntax { .. })
        ));
        assert!(matches!(
            parse_filter("a eq b"),
            Err(FilterError::InvalidSyntax { .. })
        ));
        assert!(matches!(
            parse_filter("a eq 'x"),
            Err(FilterError::InvalidSyntax { position: 5, .. })
        ));
    }

    #[test]
    fn test_deep_parentheses_are_rejected() {
        let source = format!("{}jsonValue eq 'x'{}", "(".repeat(20_000), ")".repeat(20_000));
        assert_eq!(
            parse_filter(&source),
            Err(FilterError::TooDeep {
                max_depth: MAX_FILTER_DEPTH
            })
        );
    }

    #[test]
    fn test_long_not_chain_is_rejected() {
        let source = format!("{}jsonValue eq 'x'", "not ".repeat(20_000));
        assert_eq!(
            parse_filter(&source),
            Err(FilterError::TooDeep {
                max_depth: MAX_FILTER_DEPTH
            })
        );
    }

    #[test]
    fn test_nesting_up_to_the_limit_parses() -> Result<(), FilterError> {
        let depth = MAX_FILTER_DEPTH - 1;
        let source = format!("{}a eq 1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse_filter(&source)?, cmp("a", FilterOperator::Eq, Literal::Integer(1)));
        Ok(())
    }

    #[test]
    fn test_long_or_chain_stays_shallow() -> Result<(), FilterError> {
        let source = vec!["jsonValue eq 'x'"; 10_000].join(" or ");
        let node = parse_filter(&source)?;
        assert_eq!(node.leaf_count(), 10_000);
        assert!(node.depth() <= 15);
        Ok(())
    }

    #[test]
    fn test_chain_of_four_joins_pairwise() -> Result<(), FilterError> {
        let leaf = |n| cmp("a", FilterOperator::Eq, Literal::Integer(n));
        assert_eq!(
            parse_filter("a eq 1 and a eq 2 and a eq 3 and a eq 4")?,
            leaf(1).and(leaf(2)).and(leaf(3).and(leaf(4)))
        );
        Ok(())
    }

    #[test]
    fn test_unknown_function_is_unsupported() {
        assert_eq!(
            parse_filter("tolower(jsonValue) eq 'a'"),
            Err(FilterError::UnsupportedOperator {
                operator: "tolower".to_string()
            })
        );
    }

    proptest! {
        #[test]
        fn prop_string_literals_survive_quoting(s in "[ -~]{0,24}") {
            let source = format!("jsonValue eq {}", Literal::String(s.clone()));
            let parsed = parse_filter(&source);
            prop_assert_eq!(
                parsed,
                Ok(cmp("jsonValue", FilterOperator::Eq, Literal::String(s)))
            );
        }

        #[test]
        fn prop_integers_survive(n in any::<i64>()) {
            let source = format!("jsonValue/n ge {}", n);
            prop_assert_eq!(
                parse_filter(&source),
                Ok(cmp("jsonValue/n", FilterOperator::Gte, Literal::Integer(n)))
            );
        }
    }
}
