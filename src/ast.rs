use crate::{AExpression, Position, Token};
use ptree::TreeItem;
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// The source span an AST node was built from, as the (row, col) of its first and last token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub head: (usize, usize),
    pub tail: (usize, usize),
}

impl Span {
    pub fn point(token: &Token) -> Self {
        Self {
            head: (token.row, token.col),
            tail: (token.row, token.col),
        }
    }

    pub fn new(head: &Token, tail: &Token) -> Self {
        Self {
            head: (head.row, head.col),
            tail: (tail.row, tail.col),
        }
    }

    pub fn combine(lhs: Span, rhs: Span) -> Self {
        Self {
            head: lhs.head,
            tail: rhs.tail,
        }
    }

    pub fn head_position(&self) -> Position {
        Position::new(self.head.0, self.head.1)
    }
}

/// `MathExpression`'s operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

/// `ComparisonExpression`'s operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Lt,
    Le,
    Gt,
    Ge,
}

/// `EqualityExpression`'s operator; the `Exact` variants disable cross-type coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqualityOp {
    Eq,
    Ne,
    EqExact,
    NeExact,
}

/// `true` / `false` / `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralValue {
    True,
    False,
    Null,
}

/// A bare identifier, used both as a standalone expression and as a name slot (assignment
/// target, member name, callback parameter, function name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierExpression {
    pub span: Span,
    pub symbol: String,
}

impl IdentifierExpression {
    pub fn new(token: &Token) -> Self {
        Self {
            span: Span::point(token),
            symbol: token.lexeme.clone(),
        }
    }

    /// The symbol normalized the way the interpreter resolves it: symbols are case-insensitive.
    pub fn lowercased(&self) -> String {
        self.symbol.to_lowercase()
    }
}

/// One argument of a [AExpression::Invocation]: a positional argument has `name: None`.
#[derive(Debug, Clone)]
pub struct CallArgument {
    pub name: Option<IdentifierExpression>,
    pub value: AExpression,
}

impl AExpression {
    /// The span of source text this node was parsed from.
    pub fn span(&self) -> Span {
        match self {
            AExpression::Program { span, .. }
            | AExpression::Long { span, .. }
            | AExpression::Double { span, .. }
            | AExpression::Str { span, .. }
            | AExpression::Literal { span, .. }
            | AExpression::Math { span, .. }
            | AExpression::Comparison { span, .. }
            | AExpression::Equality { span, .. }
            | AExpression::Conjunction { span, .. }
            | AExpression::Disjunction { span, .. }
            | AExpression::Concatenation { span, .. }
            | AExpression::NullCoalesce { span, .. }
            | AExpression::Assignment { span, .. }
            | AExpression::MemberAccess { span, .. }
            | AExpression::Index { span, .. }
            | AExpression::Invert { span, .. }
            | AExpression::FlipSign { span, .. }
            | AExpression::Invocation { span, .. }
            | AExpression::Call { span, .. }
            | AExpression::Callback { span, .. }
            | AExpression::IfThenElse { span, .. } => *span,
            AExpression::Identifier(id) => id.span,
        }
    }

    fn child_nodes(&self) -> Vec<AExpression> {
        match self {
            AExpression::Program { lines, .. } => lines.clone(),
            AExpression::Math { lhs, rhs, .. }
            | AExpression::Comparison { lhs, rhs, .. }
            | AExpression::Equality { lhs, rhs, .. }
            | AExpression::Conjunction { lhs, rhs, .. }
            | AExpression::Disjunction { lhs, rhs, .. }
            | AExpression::Concatenation { lhs, rhs, .. }
            | AExpression::NullCoalesce { lhs, rhs, .. } => vec![(**lhs).clone(), (**rhs).clone()],
            AExpression::Assignment { value, .. } => vec![(**value).clone()],
            AExpression::MemberAccess { object, member, .. } => {
                vec![(**object).clone(), (**member).clone()]
            }
            AExpression::Index { object, index, .. } => vec![(**object).clone(), (**index).clone()],
            AExpression::Invert { operand, .. } | AExpression::FlipSign { operand, .. } => {
                vec![(**operand).clone()]
            }
            AExpression::Invocation { args, .. } => {
                args.iter().map(|a| a.value.clone()).collect()
            }
            AExpression::Call { callee, args, .. } => {
                let mut children = vec![(**callee).clone()];
                children.extend(args.iter().map(|a| a.value.clone()));
                children
            }
            AExpression::Callback { body, .. } => vec![(**body).clone()],
            AExpression::IfThenElse {
                condition,
                positive,
                negative,
                ..
            } => vec![(**condition).clone(), (**positive).clone(), (**negative).clone()],
            AExpression::Long { .. }
            | AExpression::Double { .. }
            | AExpression::Str { .. }
            | AExpression::Literal { .. }
            | AExpression::Identifier(_) => Vec::new(),
        }
    }

    fn label(&self) -> String {
        match self {
            AExpression::Program { .. } => "program".to_string(),
            AExpression::Long { value, .. } => format!("{}", value),
            AExpression::Double { value, .. } => format!("{}", value),
            AExpression::Str { value, .. } => format!("{:?}", value),
            AExpression::Literal { value, .. } => format!("{:?}", value),
            AExpression::Identifier(id) => id.symbol.clone(),
            AExpression::Math { op, .. } => format!("{:?}", op),
            AExpression::Comparison { op, .. } => format!("{:?}", op),
            AExpression::Equality { op, .. } => format!("{:?}", op),
            AExpression::Conjunction { .. } => "&&".to_string(),
            AExpression::Disjunction { .. } => "||".to_string(),
            AExpression::Concatenation { .. } => "&".to_string(),
            AExpression::NullCoalesce { .. } => "??".to_string(),
            AExpression::Assignment { name, .. } => format!("{} =", name.symbol),
            AExpression::MemberAccess { optional, .. } => {
                if *optional {
                    "?.".to_string()
                } else {
                    ".".to_string()
                }
            }
            AExpression::Index { optional, .. } => {
                if *optional {
                    "?[]".to_string()
                } else {
                    "[]".to_string()
                }
            }
            AExpression::Invert { .. } => "!".to_string(),
            AExpression::FlipSign { .. } => "-".to_string(),
            AExpression::Invocation { name, optional, .. } => {
                format!("{}{}()", name.symbol, if *optional { "?" } else { "" })
            }
            AExpression::Call { optional, .. } => {
                format!("call{}()", if *optional { "?" } else { "" })
            }
            AExpression::Callback { signature, .. } => format!(
                "({}) ->",
                signature
                    .iter()
                    .map(|p| p.symbol.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            AExpression::IfThenElse { .. } => "if-then-else".to_string(),
        }
    }

    /// Render the tree to stdout with [ptree], useful when debugging a grammar embedded in a
    /// host application.
    pub fn print_tree(&self) -> std::io::Result<()> {
        ptree::print_tree(self)
    }

    /// Pretty-print the expression back into source text. Parenthesization may differ from the
    /// original source, but re-parsing the result yields an equivalent tree.
    pub fn expressionify(&self) -> String {
        match self {
            AExpression::Program { lines, .. } => lines
                .iter()
                .map(|l| l.expressionify())
                .collect::<Vec<_>>()
                .join("\n"),
            AExpression::Long { value, .. } => value.to_string(),
            AExpression::Double { value, .. } => value.to_string(),
            AExpression::Str { value, .. } => format!("\"{}\"", value.replace('"', "\\\"")),
            AExpression::Literal { value, .. } => match value {
                LiteralValue::True => "true".to_string(),
                LiteralValue::False => "false".to_string(),
                LiteralValue::Null => "null".to_string(),
            },
            AExpression::Identifier(id) => id.symbol.clone(),
            AExpression::Math { op, lhs, rhs, .. } => {
                let sym = match op {
                    MathOp::Add => "+",
                    MathOp::Sub => "-",
                    MathOp::Mul => "*",
                    MathOp::Div => "/",
                    MathOp::Mod => "%",
                    MathOp::Pow => "^",
                };
                format!("({} {} {})", lhs.expressionify(), sym, rhs.expressionify())
            }
            AExpression::Comparison { op, lhs, rhs, .. } => {
                let sym = match op {
                    ComparisonOp::Lt => "<",
                    ComparisonOp::Le => "<=",
                    ComparisonOp::Gt => ">",
                    ComparisonOp::Ge => ">=",
                };
                format!("({} {} {})", lhs.expressionify(), sym, rhs.expressionify())
            }
            AExpression::Equality { op, lhs, rhs, .. } => {
                let sym = match op {
                    EqualityOp::Eq => "==",
                    EqualityOp::Ne => "!=",
                    EqualityOp::EqExact => "===",
                    EqualityOp::NeExact => "!==",
                };
                format!("({} {} {})", lhs.expressionify(), sym, rhs.expressionify())
            }
            AExpression::Conjunction { lhs, rhs, .. } => {
                format!("({} && {})", lhs.expressionify(), rhs.expressionify())
            }
            AExpression::Disjunction { lhs, rhs, .. } => {
                format!("({} || {})", lhs.expressionify(), rhs.expressionify())
            }
            AExpression::Concatenation { lhs, rhs, .. } => {
                format!("({} & {})", lhs.expressionify(), rhs.expressionify())
            }
            AExpression::NullCoalesce { lhs, rhs, .. } => {
                format!("({} ?? {})", lhs.expressionify(), rhs.expressionify())
            }
            AExpression::Assignment { name, value, .. } => {
                format!("{} = {}", name.symbol, value.expressionify())
            }
            AExpression::MemberAccess {
                optional,
                object,
                member,
                ..
            } => format!(
                "{}{}{}",
                object.expressionify(),
                if *optional { "?." } else { "." },
                member.expressionify()
            ),
            AExpression::Index {
                optional,
                object,
                index,
                ..
            } => format!(
                "{}{}[{}]",
                object.expressionify(),
                if *optional { "?" } else { "" },
                index.expressionify()
            ),
            AExpression::Invert { operand, .. } => format!("!{}", operand.expressionify()),
            AExpression::FlipSign { operand, .. } => format!("-{}", operand.expressionify()),
            AExpression::Invocation {
                name,
                optional,
                args,
                ..
            } => {
                let rendered = args
                    .iter()
                    .map(|a| match &a.name {
                        Some(n) => format!("{} = {}", n.symbol, a.value.expressionify()),
                        None => a.value.expressionify(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "{}{}({})",
                    name.symbol,
                    if *optional { "?" } else { "" },
                    rendered
                )
            }
            AExpression::Call {
                optional,
                callee,
                args,
                ..
            } => {
                let rendered = args
                    .iter()
                    .map(|a| match &a.name {
                        Some(n) => format!("{} = {}", n.symbol, a.value.expressionify()),
                        None => a.value.expressionify(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "({}){}({})",
                    callee.expressionify(),
                    if *optional { "?" } else { "" },
                    rendered
                )
            }
            AExpression::Callback {
                signature, body, ..
            } => format!(
                "({}) -> {}",
                signature
                    .iter()
                    .map(|p| p.symbol.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                body.expressionify()
            ),
            AExpression::IfThenElse {
                condition,
                positive,
                negative,
                ..
            } => format!(
                "if {} then {} else {}",
                condition.expressionify(),
                positive.expressionify(),
                negative.expressionify()
            ),
        }
    }
}

impl Display for AExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.expressionify())
    }
}

impl TreeItem for AExpression {
    type Child = AExpression;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _style: &ptree::Style) -> std::io::Result<()> {
        write!(f, "{}", self.label())
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(self.child_nodes())
    }
}

/// Parse a `LONG` lexeme, handling the optional integer-exponent suffix (`3e2 == 300`). The
/// `LONG` regex only ever produces a lowercase `e` (spec.md §4.1), so the split always matches
/// when an exponent is present; a bare digit run (no `e`) is treated as exponent zero.
///
/// Both branches go through the same `mantissa * 10^exponent` computation in `i128`, truncated to
/// `i64` by an `as` cast so overflow wraps rather than panicking -- the one place this crate
/// deliberately keeps the source's "preserve overflow" behavior rather than promoting to a bigger
/// type (see SPEC_FULL.md open question 3). `mantissa`/`exponent` are plain digit runs guaranteed
/// by the `LONG` regex, so their `str::parse` calls only fail in practice when the digit run is
/// too long even for `i128`/`u32`; that's the same "huge literal" case `saturating_mul` already
/// bounds, so falling back to `0` there (rather than a large sentinel like `i64::MAX`) keeps
/// overflow visibly an overflow instead of masquerading as a plausible value.
pub(crate) fn parse_long_lexeme(lexeme: &str) -> i64 {
    let (mantissa, exponent) = match lexeme.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<u32>().unwrap_or(0)),
        None => (lexeme, 0),
    };
    let m: i128 = mantissa.parse().unwrap_or(0);
    let scaled = m.saturating_mul(10i128.saturating_pow(exponent.min(38)));
    scaled as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_long() {
        assert_eq!(parse_long_lexeme("42"), 42);
        assert_eq!(parse_long_lexeme("-7"), -7);
    }

    #[test]
    fn parses_long_with_exponent() {
        assert_eq!(parse_long_lexeme("3e2"), 300);
        assert_eq!(parse_long_lexeme("-2e3"), -2000);
    }

    #[test]
    fn span_combine_keeps_outer_bounds() {
        let a = Span {
            head: (1, 1),
            tail: (1, 3),
        };
        let b = Span {
            head: (1, 7),
            tail: (1, 9),
        };
        let combined = Span::combine(a, b);
        assert_eq!(combined.head, (1, 1));
        assert_eq!(combined.tail, (1, 9));
    }
}
