use crate::{Position, TokenType};
use std::fmt::{Display, Formatter};

/// The full error taxonomy for tokenization, parsing and evaluation.
///
/// Errors are fatal to the current [crate::evaluate_expression] call or `parse` call and
/// propagate to the host; the parser recovers from lookahead failures internally via the
/// tokenizer's save-state stack, so only genuine syntax errors ever surface here.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    // --- Lexical ---
    UnknownToken {
        position: Position,
    },
    UnterminatedString {
        position: Position,
    },
    // --- Syntactic ---
    UnexpectedToken {
        position: Position,
        actual: Option<TokenType>,
        expected: Vec<TokenType>,
    },
    // --- Semantic ---
    UndefinedVariable {
        symbol: String,
        position: Position,
    },
    UndefinedFunction {
        symbol: String,
        position: Position,
    },
    UndefinedFunctionArgumentName {
        function: String,
        argument: String,
        position: Position,
    },
    NonNamedFunctionArgument {
        position: Position,
    },
    IdentifierInUse {
        symbol: String,
        position: Position,
    },
    UnknownMember {
        symbol: String,
        position: Position,
    },
    InvalidIndex {
        message: String,
        position: Position,
    },
    InvalidMapKey {
        key: String,
        position: Position,
    },
    NonIndexableValue {
        position: Position,
    },
    InvalidFunctionInvocation {
        function: String,
        argument_index: usize,
        message: String,
        position: Position,
    },
    InvalidFunctionArgumentType {
        function: String,
        argument: String,
        message: String,
        position: Position,
    },
    // --- Internal ---
    Internal {
        message: String,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownToken { position } => {
                write!(f, "unknown token at {}", position)
            }
            Error::UnterminatedString { position } => {
                write!(f, "unterminated string starting at {}", position)
            }
            Error::UnexpectedToken {
                position,
                actual,
                expected,
            } => {
                let actual_text = actual
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "end of input".to_string());
                if expected.is_empty() {
                    write!(f, "unexpected {} at {}", actual_text, position)
                } else {
                    let expected_text = expected
                        .iter()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>()
                        .join(" or ");
                    write!(
                        f,
                        "expected {} but found {} at {}",
                        expected_text, actual_text, position
                    )
                }
            }
            Error::UndefinedVariable { symbol, position } => {
                write!(f, "undefined variable '{}' at {}", symbol, position)
            }
            Error::UndefinedFunction { symbol, position } => {
                write!(f, "undefined function '{}' at {}", symbol, position)
            }
            Error::UndefinedFunctionArgumentName {
                function,
                argument,
                position,
            } => write!(
                f,
                "function '{}' has no argument named '{}' at {}",
                function, argument, position
            ),
            Error::NonNamedFunctionArgument { position } => write!(
                f,
                "positional argument cannot follow a named argument at {}",
                position
            ),
            Error::IdentifierInUse { symbol, position } => {
                write!(f, "identifier '{}' is already in use at {}", symbol, position)
            }
            Error::UnknownMember { symbol, position } => {
                write!(f, "unknown member '{}' at {}", symbol, position)
            }
            Error::InvalidIndex { message, position } => {
                write!(f, "invalid index at {}: {}", position, message)
            }
            Error::InvalidMapKey { key, position } => {
                write!(f, "invalid map key '{}' at {}", key, position)
            }
            Error::NonIndexableValue { position } => {
                write!(f, "value is not indexable at {}", position)
            }
            Error::InvalidFunctionInvocation {
                function,
                argument_index,
                message,
                position,
            } => write!(
                f,
                "invocation of '{}' failed at argument {} ({}) at {}",
                function, argument_index, message, position
            ),
            Error::InvalidFunctionArgumentType {
                function,
                argument,
                message,
                position,
            } => write!(
                f,
                "invalid argument '{}' for function '{}' at {}: {}",
                argument, function, position, message
            ),
            Error::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for Error {}
