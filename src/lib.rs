//! `embed_expr` is a small, side-effect-free expression language meant to be embedded inside
//! configuration files: arithmetic, string concatenation, boolean logic, conditionals, indexing,
//! member access, function calls with positional and named arguments, and inline callback
//! (lambda) definitions.
//!
//! # Design
//!
//! The crate is a classic three-stage pipeline:
//!
//! 1. A [Tokenizer] turns source text into a stream of [Token]s. It keeps a stack of
//!    [save/restore][Tokenizer::save_state] checkpoints so both its own lexical trial-order
//!    matching and the parser's multi-token lookahead can backtrack cheaply.
//! 2. A [Parser] runs a precedence-climbing recursive-descent grammar over that token stream and
//!    produces an immutable [AExpression] tree.
//! 3. [evaluate_expression] walks that tree against a caller-supplied
//!    [IEvaluationEnvironment], delegating every coercion, comparison and arithmetic operation to
//!    a pluggable [ValueInterpreter].
//!
//! # Example
//!
//! ```
//! use embed_expr::{evaluate_expression, parse, EvaluationEnvironment};
//! use embed_expr::value::{DefaultValueInterpreter, Value};
//! use embed_expr::environment::StandardFunctionRegistry;
//! use std::sync::Arc;
//!
//! let program = parse("1 + 2 * 3").unwrap();
//!
//! let env = EvaluationEnvironment::new(
//!     Arc::new(DefaultValueInterpreter::new()),
//!     Arc::new(StandardFunctionRegistry::new()),
//! );
//!
//! let result = evaluate_expression(&program, &env).unwrap();
//! assert!(matches!(result, Value::Long(7)));
//! ```
//!
//! # License
//! Provided under the MIT license.

mod ast;
pub mod callable;
pub mod environment;
mod error;
mod interpreter;
mod parser;
mod position;
mod token;
mod tokenizer;
pub mod util;
pub mod value;

use std::sync::Arc;

pub use ast::{
    CallArgument, ComparisonOp, EqualityOp, IdentifierExpression, LiteralValue, MathOp, Span,
};
pub use callable::{Callable, FunctionInvocationError};
pub use environment::{EvaluationEnvironment, IEvaluationEnvironment, InterpretationEnvironment};
pub use error::Error;
pub use interpreter::evaluate_expression;
pub use parser::Parser;
pub use token::{Token, TokenType};
pub use tokenizer::Tokenizer;
pub use util::logger::Log;
pub use value::{ObjectView, Value, ValueInterpreter};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// A 1-indexed row/column location in the source text.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

/// A single lexical token: its [TokenType], its 1-indexed source position, and its lexeme.
///
/// Invariant: `row, col >= 1`; `lexeme` matches the token grammar for `kind`. For `StringLit`
/// tokens the lexeme holds the decoded string content (escapes already resolved), not the raw
/// quoted source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenType,
    pub row: usize,
    pub col: usize,
    pub lexeme: String,
}

/// Tagged AST produced by [Parser::parse_program]. Every variant carries a [Span] pointing back
/// at the source tokens it was built from, so interpreter errors can quote the offending text.
///
/// The tree is immutable once parsed and, because its shared substructure is held behind [Arc]
/// rather than `Rc`, is safe to evaluate concurrently from multiple threads provided each
/// evaluation is given its own [IEvaluationEnvironment].
#[derive(Debug, Clone)]
pub enum AExpression {
    Program {
        span: Span,
        lines: Vec<AExpression>,
    },
    Long {
        span: Span,
        value: i64,
    },
    Double {
        span: Span,
        value: f64,
    },
    Str {
        span: Span,
        value: String,
    },
    Literal {
        span: Span,
        value: LiteralValue,
    },
    Identifier(IdentifierExpression),
    Math {
        span: Span,
        op: MathOp,
        lhs: Arc<AExpression>,
        rhs: Arc<AExpression>,
    },
    Comparison {
        span: Span,
        op: ComparisonOp,
        lhs: Arc<AExpression>,
        rhs: Arc<AExpression>,
    },
    Equality {
        span: Span,
        op: EqualityOp,
        lhs: Arc<AExpression>,
        rhs: Arc<AExpression>,
    },
    Conjunction {
        span: Span,
        lhs: Arc<AExpression>,
        rhs: Arc<AExpression>,
    },
    Disjunction {
        span: Span,
        lhs: Arc<AExpression>,
        rhs: Arc<AExpression>,
    },
    Concatenation {
        span: Span,
        lhs: Arc<AExpression>,
        rhs: Arc<AExpression>,
    },
    NullCoalesce {
        span: Span,
        lhs: Arc<AExpression>,
        rhs: Arc<AExpression>,
    },
    Assignment {
        span: Span,
        name: IdentifierExpression,
        value: Arc<AExpression>,
    },
    MemberAccess {
        span: Span,
        optional: bool,
        object: Arc<AExpression>,
        member: Arc<AExpression>,
    },
    Index {
        span: Span,
        optional: bool,
        object: Arc<AExpression>,
        index: Arc<AExpression>,
    },
    Invert {
        span: Span,
        operand: Arc<AExpression>,
    },
    FlipSign {
        span: Span,
        operand: Arc<AExpression>,
    },
    Invocation {
        span: Span,
        optional: bool,
        name: IdentifierExpression,
        args: Vec<CallArgument>,
    },
    /// A call whose callee is an arbitrary expression rather than a bare identifier -- the
    /// grammar's generic `primary '(' args? ')'` postfix (spec.md §6) applied to something other
    /// than `IDENT`, most commonly an immediately-invoked [AExpression::Callback]:
    /// `((x, y) -> x + y)(3, 4)`. [AExpression::Invocation] remains the node for ordinary
    /// `name(args)` calls, which is the only shape spec.md §3's AST model names explicitly.
    Call {
        span: Span,
        optional: bool,
        callee: Arc<AExpression>,
        args: Vec<CallArgument>,
    },
    Callback {
        span: Span,
        signature: Vec<IdentifierExpression>,
        body: Arc<AExpression>,
    },
    IfThenElse {
        span: Span,
        condition: Arc<AExpression>,
        positive: Arc<AExpression>,
        negative: Arc<AExpression>,
    },
}

/// Tokenize `source` end to end, the same way [Tokenizer] is driven internally by [Parser].
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = tokenizer.consume_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

/// Tokenize and parse `source` into a [AExpression::Program].
pub fn parse(source: &str) -> Result<AExpression> {
    let mut tokenizer = Tokenizer::new(source);
    let mut parser = Parser::new(&mut tokenizer);
    parser.parse_program()
}
