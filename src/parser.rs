//! Precedence-climbing recursive-descent parser: nineteen levels, lowest (assignment) to highest
//! (primary literals), each either producing its own node or delegating to
//! [Parser::next_precedence]. See SPEC_FULL.md §4.2 for the full ladder and the associativity
//! decisions baked in here.

use crate::ast::{CallArgument, ComparisonOp, EqualityOp, IdentifierExpression, LiteralValue, MathOp, Span};
use crate::{AExpression, Error, Position, Result, Token, TokenType, Tokenizer};
use std::borrow::Cow;
use std::sync::Arc;

/// Wraps a [Tokenizer] with the precedence ladder. Not reentrant: a `Parser` owns its tokenizer's
/// save-state stack for the duration of `parse_program`.
pub struct Parser<'t> {
    tokenizer: &'t mut Tokenizer,
}

impl<'t> Parser<'t> {
    pub fn new(tokenizer: &'t mut Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Parse every top-level expression in `source` into a [AExpression::Program]. Each line is a
    /// complete expression; the next one begins wherever the previous naturally stopped matching
    /// further operators, since the grammar has no statement terminator.
    pub fn parse_program(&mut self) -> Result<AExpression> {
        let mut lines = Vec::new();
        while self.tokenizer.peek_token()?.is_some() {
            lines.push(self.parse_assignment()?);
        }
        if lines.is_empty() {
            return Err(Error::UnexpectedToken {
                position: self.end_of_input_position(),
                actual: None,
                expected: Vec::new(),
            });
        }
        let span = Span::combine(lines.first().unwrap().span(), lines.last().unwrap().span());
        Ok(AExpression::Program { span, lines })
    }

    fn peek(&mut self) -> Result<Option<Token>> {
        self.tokenizer.peek_token()
    }

    fn peek_is(&mut self, kind: TokenType) -> Result<bool> {
        Ok(matches!(self.peek()?, Some(tok) if tok.kind == kind))
    }

    fn consume(&mut self) -> Result<Option<Token>> {
        self.tokenizer.consume_token()
    }

    fn expect(&mut self, kind: TokenType) -> Result<Token> {
        match self.consume()? {
            Some(tok) if tok.kind == kind => Ok(tok),
            Some(tok) => Err(Error::UnexpectedToken {
                position: Position::new(tok.row, tok.col),
                actual: Some(tok.kind),
                expected: vec![kind],
            }),
            None => Err(Error::UnexpectedToken {
                position: self.end_of_input_position(),
                actual: None,
                expected: vec![kind],
            }),
        }
    }

    fn end_of_input_position(&mut self) -> Position {
        self.tokenizer.position()
    }

    // ---- Level 1: assignment (lowest precedence) ----

    fn parse_assignment(&mut self) -> Result<AExpression> {
        if self.peek_is(TokenType::Identifier)? {
            self.tokenizer.save_state();
            let ident_tok = self.consume()?.unwrap();
            if self.peek_is(TokenType::Assign)? {
                self.tokenizer.discard_state();
                self.consume()?;
                let name = IdentifierExpression::new(&ident_tok);
                let value = self.parse_null_coalesce()?;
                let span = Span {
                    head: (ident_tok.row, ident_tok.col),
                    tail: value.span().tail,
                };
                return Ok(AExpression::Assignment {
                    span,
                    name,
                    value: Arc::new(value),
                });
            }
            self.tokenizer.restore_state();
        }
        self.parse_null_coalesce()
    }

    // ---- Level 2: null-coalesce ----

    fn parse_null_coalesce(&mut self) -> Result<AExpression> {
        let mut lhs = self.parse_concat()?;
        while self.peek_is(TokenType::NullCoalesce)? {
            self.consume()?;
            let rhs = self.parse_concat()?;
            let span = Span::combine(lhs.span(), rhs.span());
            lhs = AExpression::NullCoalesce {
                span,
                lhs: Arc::new(lhs),
                rhs: Arc::new(rhs),
            };
        }
        Ok(lhs)
    }

    // ---- Level 3: concatenation ----

    fn parse_concat(&mut self) -> Result<AExpression> {
        let mut lhs = self.parse_disjunction()?;
        while self.peek_is(TokenType::Concat)? {
            self.consume()?;
            let rhs = self.parse_disjunction()?;
            let span = Span::combine(lhs.span(), rhs.span());
            lhs = AExpression::Concatenation {
                span,
                lhs: Arc::new(lhs),
                rhs: Arc::new(rhs),
            };
        }
        Ok(lhs)
    }

    // ---- Level 4: disjunction ----

    fn parse_disjunction(&mut self) -> Result<AExpression> {
        let mut lhs = self.parse_conjunction()?;
        while self.peek_is(TokenType::Or)? {
            self.consume()?;
            let rhs = self.parse_conjunction()?;
            let span = Span::combine(lhs.span(), rhs.span());
            lhs = AExpression::Disjunction {
                span,
                lhs: Arc::new(lhs),
                rhs: Arc::new(rhs),
            };
        }
        Ok(lhs)
    }

    // ---- Level 5: conjunction ----

    fn parse_conjunction(&mut self) -> Result<AExpression> {
        let mut lhs = self.parse_equality()?;
        while self.peek_is(TokenType::And)? {
            self.consume()?;
            let rhs = self.parse_equality()?;
            let span = Span::combine(lhs.span(), rhs.span());
            lhs = AExpression::Conjunction {
                span,
                lhs: Arc::new(lhs),
                rhs: Arc::new(rhs),
            };
        }
        Ok(lhs)
    }

    // ---- Level 6: equality ----

    fn parse_equality(&mut self) -> Result<AExpression> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek()? {
                Some(tok) if tok.kind == TokenType::Eq => EqualityOp::Eq,
                Some(tok) if tok.kind == TokenType::Ne => EqualityOp::Ne,
                Some(tok) if tok.kind == TokenType::EqExact => EqualityOp::EqExact,
                Some(tok) if tok.kind == TokenType::NeExact => EqualityOp::NeExact,
                _ => break,
            };
            self.consume()?;
            let rhs = self.parse_comparison()?;
            let span = Span::combine(lhs.span(), rhs.span());
            lhs = AExpression::Equality {
                span,
                op,
                lhs: Arc::new(lhs),
                rhs: Arc::new(rhs),
            };
        }
        Ok(lhs)
    }

    // ---- Level 7: comparison ----

    fn parse_comparison(&mut self) -> Result<AExpression> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek()? {
                Some(tok) if tok.kind == TokenType::Lt => ComparisonOp::Lt,
                Some(tok) if tok.kind == TokenType::Le => ComparisonOp::Le,
                Some(tok) if tok.kind == TokenType::Gt => ComparisonOp::Gt,
                Some(tok) if tok.kind == TokenType::Ge => ComparisonOp::Ge,
                _ => break,
            };
            self.consume()?;
            let rhs = self.parse_additive()?;
            let span = Span::combine(lhs.span(), rhs.span());
            lhs = AExpression::Comparison {
                span,
                op,
                lhs: Arc::new(lhs),
                rhs: Arc::new(rhs),
            };
        }
        Ok(lhs)
    }

    // ---- Level 8: additive ----

    fn parse_additive(&mut self) -> Result<AExpression> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek()? {
                Some(tok) if tok.kind == TokenType::Plus => MathOp::Add,
                Some(tok) if tok.kind == TokenType::Minus => MathOp::Sub,
                _ => break,
            };
            self.consume()?;
            let rhs = self.parse_multiplicative()?;
            let span = Span::combine(lhs.span(), rhs.span());
            lhs = AExpression::Math {
                span,
                op,
                lhs: Arc::new(lhs),
                rhs: Arc::new(rhs),
            };
        }
        Ok(lhs)
    }

    // ---- Level 9: multiplicative ----

    fn parse_multiplicative(&mut self) -> Result<AExpression> {
        let mut lhs = self.parse_exponent()?;
        loop {
            let op = match self.peek()? {
                Some(tok) if tok.kind == TokenType::Star => MathOp::Mul,
                Some(tok) if tok.kind == TokenType::Slash => MathOp::Div,
                Some(tok) if tok.kind == TokenType::Percent => MathOp::Mod,
                _ => break,
            };
            self.consume()?;
            let rhs = self.parse_exponent()?;
            let span = Span::combine(lhs.span(), rhs.span());
            lhs = AExpression::Math {
                span,
                op,
                lhs: Arc::new(lhs),
                rhs: Arc::new(rhs),
            };
        }
        Ok(lhs)
    }

    // ---- Level 10: exponentiation ----
    //
    // Left-associative per SPEC_FULL.md §5 ADR 2 (`2^3^2 == 64`, not `512`): the loop re-enters
    // `parse_unary_not` for each operand rather than recursing into itself.

    fn parse_exponent(&mut self) -> Result<AExpression> {
        let mut lhs = self.parse_unary_not()?;
        while self.peek_is(TokenType::Caret)? {
            self.consume()?;
            let rhs = self.parse_unary_not()?;
            let span = Span::combine(lhs.span(), rhs.span());
            lhs = AExpression::Math {
                span,
                op: MathOp::Pow,
                lhs: Arc::new(lhs),
                rhs: Arc::new(rhs),
            };
        }
        Ok(lhs)
    }

    // ---- Level 11: logical negation ----

    fn parse_unary_not(&mut self) -> Result<AExpression> {
        if self.peek_is(TokenType::Not)? {
            let op_tok = self.consume()?.unwrap();
            let operand = self.parse_unary_minus()?;
            let span = Span {
                head: (op_tok.row, op_tok.col),
                tail: operand.span().tail,
            };
            return Ok(AExpression::Invert {
                span,
                operand: Arc::new(operand),
            });
        }
        self.parse_unary_minus()
    }

    // ---- Level 12: unary minus ----

    fn parse_unary_minus(&mut self) -> Result<AExpression> {
        if self.peek_is(TokenType::Minus)? {
            let op_tok = self.consume()?.unwrap();
            let operand = self.parse_index()?;
            let span = Span {
                head: (op_tok.row, op_tok.col),
                tail: operand.span().tail,
            };
            return Ok(AExpression::FlipSign {
                span,
                operand: Arc::new(operand),
            });
        }
        self.parse_index()
    }

    // ---- Level 13: index ----

    fn parse_index(&mut self) -> Result<AExpression> {
        let mut lhs = self.parse_member_access()?;
        loop {
            let optional = match self.peek()? {
                Some(tok) if tok.kind == TokenType::LBracket => false,
                Some(tok) if tok.kind == TokenType::OptLBracket => true,
                _ => break,
            };
            self.consume()?;
            let index = self.parse_assignment()?;
            let close = self.expect(TokenType::RBracket)?;
            let span = Span {
                head: lhs.span().head,
                tail: (close.row, close.col),
            };
            lhs = AExpression::Index {
                span,
                optional,
                object: Arc::new(lhs),
                index: Arc::new(index),
            };
        }
        Ok(lhs)
    }

    // ---- Level 14: member access ----

    fn parse_member_access(&mut self) -> Result<AExpression> {
        let mut lhs = self.parse_invocation()?;
        loop {
            let optional = match self.peek()? {
                Some(tok) if tok.kind == TokenType::Dot => false,
                Some(tok) if tok.kind == TokenType::OptDot => true,
                _ => break,
            };
            self.consume()?;
            let member_tok = self.expect(TokenType::Identifier)?;
            let member = AExpression::Identifier(IdentifierExpression::new(&member_tok));
            let span = Span {
                head: lhs.span().head,
                tail: (member_tok.row, member_tok.col),
            };
            lhs = AExpression::MemberAccess {
                span,
                optional,
                object: Arc::new(lhs),
                member: Arc::new(member),
            };
        }
        Ok(lhs)
    }

    // ---- Level 15: function invocation ----

    fn parse_invocation(&mut self) -> Result<AExpression> {
        if self.peek_is(TokenType::Identifier)? {
            self.tokenizer.save_state();
            let ident_tok = self.consume()?.unwrap();
            let opens = match self.peek()? {
                Some(tok) if tok.kind == TokenType::LParen => Some(false),
                Some(tok) if tok.kind == TokenType::OptLParen => Some(true),
                _ => None,
            };
            if let Some(optional) = opens {
                self.tokenizer.discard_state();
                self.consume()?;
                let args = self.parse_call_arguments()?;
                let close = self.expect(TokenType::RParen)?;
                let name = IdentifierExpression::new(&ident_tok);
                let span = Span::new(&ident_tok, &close);
                return Ok(AExpression::Invocation {
                    span,
                    optional,
                    name,
                    args,
                });
            }
            self.tokenizer.restore_state();
        }
        self.parse_if_then_else()
    }

    fn parse_call_arguments(&mut self) -> Result<Vec<CallArgument>> {
        let mut args = Vec::new();
        let mut seen_named = false;
        if self.peek_is(TokenType::RParen)? {
            return Ok(args);
        }
        loop {
            let mut name = None;
            if self.peek_is(TokenType::Identifier)? {
                self.tokenizer.save_state();
                let ident_tok = self.consume()?.unwrap();
                if self.peek_is(TokenType::Assign)? {
                    self.tokenizer.discard_state();
                    self.consume()?;
                    name = Some(IdentifierExpression::new(&ident_tok));
                } else {
                    self.tokenizer.restore_state();
                }
            }
            if name.is_some() {
                seen_named = true;
            } else if seen_named {
                let position = self
                    .peek()?
                    .map(|t| Position::new(t.row, t.col))
                    .unwrap_or_else(|| self.end_of_input_position());
                return Err(Error::NonNamedFunctionArgument { position });
            }
            let value = self.parse_assignment()?;
            args.push(CallArgument { name, value });
            if self.peek_is(TokenType::Comma)? {
                self.consume()?;
                continue;
            }
            break;
        }
        Ok(args)
    }

    // ---- Level 16: if-then-else ----

    fn parse_if_then_else(&mut self) -> Result<AExpression> {
        if self.peek_is(TokenType::If)? {
            let if_tok = self.consume()?.unwrap();
            let condition = self.parse_assignment()?;
            self.expect(TokenType::Then)?;
            let positive = self.parse_assignment()?;
            self.expect(TokenType::Else)?;
            let negative = self.parse_assignment()?;
            let span = Span {
                head: (if_tok.row, if_tok.col),
                tail: negative.span().tail,
            };
            return Ok(AExpression::IfThenElse {
                span,
                condition: Arc::new(condition),
                positive: Arc::new(positive),
                negative: Arc::new(negative),
            });
        }
        self.parse_callback()
    }

    // ---- Level 17: callback ----

    fn parse_callback(&mut self) -> Result<AExpression> {
        if self.peek_is(TokenType::LParen)? {
            self.tokenizer.save_state();
            if let Some(callback) = self.try_parse_callback()? {
                self.tokenizer.discard_state();
                return self.parse_trailing_calls(callback);
            }
            self.tokenizer.restore_state();
        }
        self.parse_parenthesized()
    }

    /// Attempt `'(' IDENT (',' IDENT)* ')' '->' expression`. Returns `None` (never restoring
    /// itself -- the caller owns the save frame) on any mismatch, so the caller can fall back to
    /// parenthesized-expression parsing.
    fn try_parse_callback(&mut self) -> Result<Option<AExpression>> {
        let open_tok = self.consume()?.unwrap();
        let mut signature = Vec::new();
        match self.peek()? {
            Some(tok) if tok.kind == TokenType::Identifier => {
                self.consume()?;
                signature.push(IdentifierExpression::new(&tok));
            }
            _ => return Ok(None),
        }
        loop {
            match self.peek()? {
                Some(tok) if tok.kind == TokenType::Comma => {
                    self.consume()?;
                    match self.peek()? {
                        Some(tok) if tok.kind == TokenType::Identifier => {
                            self.consume()?;
                            signature.push(IdentifierExpression::new(&tok));
                        }
                        _ => return Ok(None),
                    }
                }
                _ => break,
            }
        }
        if !self.peek_is(TokenType::RParen)? {
            return Ok(None);
        }
        self.consume()?;
        if !self.peek_is(TokenType::Arrow)? {
            return Ok(None);
        }
        self.consume()?;
        let body = self.parse_assignment()?;
        let span = Span {
            head: (open_tok.row, open_tok.col),
            tail: body.span().tail,
        };
        Ok(Some(AExpression::Callback {
            span,
            signature,
            body: Arc::new(body),
        }))
    }

    // ---- Level 18: parenthesized expression ----

    fn parse_parenthesized(&mut self) -> Result<AExpression> {
        if self.peek_is(TokenType::LParen)? {
            self.consume()?;
            let inner = self.parse_assignment()?;
            self.expect(TokenType::RParen)?;
            return self.parse_trailing_calls(inner);
        }
        self.parse_primary()
    }

    /// A parenthesized expression or callback may itself be invoked immediately --
    /// `((x, y) -> x + y)(3, 4)` -- which the ordinary [Parser::parse_invocation] level can't
    /// reach since its callee there is always a bare identifier. See [AExpression::Call].
    fn parse_trailing_calls(&mut self, mut callee: AExpression) -> Result<AExpression> {
        loop {
            let optional = match self.peek()? {
                Some(tok) if tok.kind == TokenType::LParen => false,
                Some(tok) if tok.kind == TokenType::OptLParen => true,
                _ => break,
            };
            self.consume()?;
            let args = self.parse_call_arguments()?;
            let close = self.expect(TokenType::RParen)?;
            let span = Span {
                head: callee.span().head,
                tail: (close.row, close.col),
            };
            callee = AExpression::Call {
                span,
                optional,
                callee: Arc::new(callee),
                args,
            };
        }
        Ok(callee)
    }

    // ---- Level 19: primary ----

    fn parse_primary(&mut self) -> Result<AExpression> {
        let tok = self.consume()?.ok_or_else(|| Error::UnexpectedToken {
            position: self.end_of_input_position(),
            actual: None,
            expected: Vec::new(),
        })?;
        match tok.kind {
            TokenType::Long => Ok(AExpression::Long {
                span: Span::point(&tok),
                value: crate::ast::parse_long_lexeme(&tok.lexeme),
            }),
            TokenType::Double => Ok(AExpression::Double {
                span: Span::point(&tok),
                value: parse_double_lexeme(&tok.lexeme),
            }),
            TokenType::StringLit => Ok(AExpression::Str {
                span: Span::point(&tok),
                value: tok.lexeme.clone(),
            }),
            TokenType::True => Ok(AExpression::Literal {
                span: Span::point(&tok),
                value: LiteralValue::True,
            }),
            TokenType::False => Ok(AExpression::Literal {
                span: Span::point(&tok),
                value: LiteralValue::False,
            }),
            TokenType::Null => Ok(AExpression::Literal {
                span: Span::point(&tok),
                value: LiteralValue::Null,
            }),
            TokenType::Identifier => Ok(AExpression::Identifier(IdentifierExpression::new(&tok))),
            other => Err(Error::UnexpectedToken {
                position: Position::new(tok.row, tok.col),
                actual: Some(other),
                expected: vec![
                    TokenType::Long,
                    TokenType::Double,
                    TokenType::StringLit,
                    TokenType::Identifier,
                    TokenType::True,
                    TokenType::False,
                    TokenType::Null,
                    TokenType::LParen,
                ],
            }),
        }
    }
}

/// `.5` (no leading digit, per spec.md §4.1's `-?[0-9]*\.[0-9]+`) is normalized to `0.5` before
/// parsing, since the lexeme is stored verbatim by the tokenizer.
fn parse_double_lexeme(lexeme: &str) -> f64 {
    let normalized = match lexeme.strip_prefix('.') {
        Some(rest) => Cow::Owned(format!("0.{}", rest)),
        None => Cow::Borrowed(lexeme),
    };
    normalized.parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{DefaultValueInterpreter, Value};
    use crate::environment::{EvaluationEnvironment, StandardFunctionRegistry};
    use std::sync::Arc as StdArc;

    fn parse(source: &str) -> AExpression {
        crate::parse(source).unwrap()
    }

    fn env() -> EvaluationEnvironment {
        EvaluationEnvironment::new(
            StdArc::new(DefaultValueInterpreter::new()),
            StdArc::new(StandardFunctionRegistry::new()),
        )
    }

    #[test]
    fn precedence_respects_pemdas() {
        let ast = parse("1 + 2 * 3");
        let value = crate::evaluate_expression(&ast, &env()).unwrap();
        assert_eq!(value, Value::Long(7));
    }

    #[test]
    fn exponent_is_left_associative() {
        let ast = parse("2 ^ 3 ^ 2");
        let value = crate::evaluate_expression(&ast, &env()).unwrap();
        assert_eq!(value, Value::Long(64));
    }

    #[test]
    fn if_then_else_parses() {
        let ast = parse("if 1 < 2 then \"y\" else \"n\"");
        let value = crate::evaluate_expression(&ast, &env()).unwrap();
        assert_eq!(value, Value::Str("y".to_string()));
    }

    #[test]
    fn callback_iife_parses_and_evaluates() {
        let ast = parse("((x, y) -> x + y)(3, 4)");
        let value = crate::evaluate_expression(&ast, &env()).unwrap();
        assert_eq!(value, Value::Long(7));
    }

    #[test]
    fn named_argument_after_positional_is_rejected() {
        let err = crate::parse("f(a = 1, 2)").unwrap_err();
        assert!(matches!(err, Error::NonNamedFunctionArgument { .. }));
    }

    #[test]
    fn program_has_multiple_lines() {
        let ast = parse("a = 10\n a + 5");
        let value = crate::evaluate_expression(&ast, &env()).unwrap();
        assert_eq!(value, Value::Long(15));
    }

    #[test]
    fn index_and_member_chain() {
        let ast = parse("null?.foo?.bar");
        let value = crate::evaluate_expression(&ast, &env()).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn double_literal_without_leading_digit_is_normalized() {
        let ast = parse(".5");
        let value = crate::evaluate_expression(&ast, &env()).unwrap();
        assert_eq!(value, Value::Double(0.5));
    }
}
