use crate::{Error, Log, Position, Result, Token, TokenType};
use once_cell::sync::Lazy;
use regex::Regex;

/// A checkpoint the tokenizer can rewind to. Pushed by [Tokenizer::save_state], popped by
/// [Tokenizer::restore_state] or [Tokenizer::discard_state].
#[derive(Debug, Clone)]
struct TokenizerState {
    char_index: usize,
    row: usize,
    col: usize,
    current_token: Option<Token>,
}

type Reader = Box<dyn Fn(&mut Tokenizer) -> Result<Option<String>> + Sync + Send>;

/// Trial order for [Tokenizer::read_next_token]: tried top to bottom, first match wins. Multi-
/// character operators are listed ahead of their single-character prefixes (`===` before `==`
/// before `=`) so the longest lexeme is always preferred.
static READERS: Lazy<Vec<(TokenType, Reader)>> = Lazy::new(|| {
    vec![
        (TokenType::Comment, Box::new(read_comment)),
        (TokenType::StringLit, Box::new(read_string)),
        (TokenType::Double, Box::new(read_double)),
        (TokenType::Long, Box::new(read_long)),
        (TokenType::True, word_literal("true")),
        (TokenType::False, word_literal("false")),
        (TokenType::Null, word_literal("null")),
        (TokenType::If, word_literal("if")),
        (TokenType::Then, word_literal("then")),
        (TokenType::Else, word_literal("else")),
        (TokenType::Identifier, Box::new(read_identifier)),
        (TokenType::EqExact, literal("===")),
        (TokenType::NeExact, literal("!==")),
        (TokenType::Eq, literal("==")),
        (TokenType::Ne, literal("!=")),
        (TokenType::Le, literal("<=")),
        (TokenType::Ge, literal(">=")),
        (TokenType::And, literal("&&")),
        (TokenType::Or, literal("||")),
        (TokenType::NullCoalesce, literal("??")),
        (TokenType::Arrow, literal("->")),
        (TokenType::OptDot, literal("?.")),
        (TokenType::OptLBracket, literal("?[")),
        (TokenType::OptLParen, literal("?(")),
        (TokenType::Plus, literal("+")),
        (TokenType::Minus, literal("-")),
        (TokenType::Star, literal("*")),
        (TokenType::Slash, literal("/")),
        (TokenType::Percent, literal("%")),
        (TokenType::Caret, literal("^")),
        (TokenType::Lt, literal("<")),
        (TokenType::Gt, literal(">")),
        (TokenType::Not, literal("!")),
        (TokenType::Assign, literal("=")),
        (TokenType::Concat, literal("&")),
        (TokenType::LParen, literal("(")),
        (TokenType::RParen, literal(")")),
        (TokenType::LBracket, literal("[")),
        (TokenType::RBracket, literal("]")),
        (TokenType::Dot, literal(".")),
        (TokenType::Comma, literal(",")),
    ]
});

// `-?[0-9]*\.[0-9]+` per spec.md §4.1: the integer part is optional, so `.5` lexes as a DOUBLE
// (normalized to `0.5` in `parse_double_lexeme`) rather than falling through to `Dot` + `Long(5)`.
static DOUBLE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]*\.[0-9]+([eE][+-]?[0-9]+)?").unwrap());
// `e[0-9]+` per spec.md §4.1: lowercase only, no sign on the exponent. `parse_long_lexeme` splits
// on lowercase `e` to match.
static LONG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+(e[0-9]+)?").unwrap());
static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*").unwrap());

fn is_word_boundary(c: Option<char>) -> bool {
    !matches!(c, Some(c) if c.is_alphanumeric() || c == '_')
}

/// Tokenizes UTF-8 source text, one character at a time, with a stack-based backtracking
/// mechanism so the parser (and the tokenizer itself) can try a lexeme and cheaply undo it.
pub struct Tokenizer {
    chars: Vec<char>,
    char_index: usize,
    row: usize,
    col: usize,
    save_stack: Vec<TokenizerState>,
    current_token: Option<Token>,
    debug: Log<()>,
}

impl Tokenizer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            char_index: 0,
            row: 1,
            col: 1,
            save_stack: Vec::new(),
            current_token: None,
            debug: Log::None,
        }
    }

    pub fn set_log(&mut self, log: Log<()>) {
        self.debug = log;
    }

    fn has_next_char(&self) -> bool {
        self.char_index < self.chars.len()
    }

    fn peek_next_char(&self) -> Option<char> {
        self.chars.get(self.char_index).copied()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek_next_char()?;
        self.char_index += 1;
        if c == '\n' {
            self.row += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn previous_char(&self) -> Option<char> {
        if self.char_index == 0 {
            None
        } else {
            self.chars.get(self.char_index - 1).copied()
        }
    }

    /// The cursor's current source position, used by the parser to anchor end-of-input errors.
    pub fn position(&self) -> Position {
        Position::new(self.row, self.col)
    }

    /// Push the tokenizer's current cursor and lookahead buffer onto the backtracking stack.
    pub fn save_state(&mut self) {
        self.save_stack.push(TokenizerState {
            char_index: self.char_index,
            row: self.row,
            col: self.col,
            current_token: self.current_token.clone(),
        });
    }

    /// Rewind to the last [Tokenizer::save_state] checkpoint, undoing every character and token
    /// consumed since.
    pub fn restore_state(&mut self) {
        if let Some(state) = self.save_stack.pop() {
            self.char_index = state.char_index;
            self.row = state.row;
            self.col = state.col;
            self.current_token = state.current_token;
        }
    }

    /// Drop the last checkpoint without rewinding -- the speculative attempt succeeded.
    pub fn discard_state(&mut self) {
        self.save_stack.pop();
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_next_char() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn remaining(&self) -> String {
        self.chars[self.char_index..].iter().collect()
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.next_char();
        }
    }

    fn read_next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let start_row = self.row;
        let start_col = self.col;

        if !self.has_next_char() {
            return Err(Error::UnexpectedToken {
                position: self.position(),
                actual: None,
                expected: Vec::new(),
            });
        }

        for (kind, reader) in READERS.iter() {
            self.save_state();
            match reader(self) {
                Ok(Some(lexeme)) => {
                    self.discard_state();
                    #[cfg(debug_assertions)]
                    if self.debug != Log::None {
                        println!("read {:?} {:?} at {}:{}", kind, lexeme, start_row, start_col);
                    }
                    return Ok(Token::new(*kind, start_row, start_col, lexeme));
                }
                Ok(None) => {
                    self.restore_state();
                }
                Err(err) => {
                    self.discard_state();
                    return Err(err);
                }
            }
        }

        Err(Error::UnknownToken {
            position: Position::new(start_row, start_col),
        })
    }

    /// Consume and return the next token, or `None` at end of input. Comments are filtered out
    /// transparently -- callers never see [TokenType::Comment].
    pub fn consume_token(&mut self) -> Result<Option<Token>> {
        if let Some(token) = self.current_token.take() {
            return Ok(Some(token));
        }
        self.skip_whitespace();
        if !self.has_next_char() {
            return Ok(None);
        }
        loop {
            let token = self.read_next_token()?;
            if token.kind != TokenType::Comment {
                return Ok(Some(token));
            }
            self.skip_whitespace();
            if !self.has_next_char() {
                return Ok(None);
            }
        }
    }

    /// Look at the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<Option<Token>> {
        if self.current_token.is_none() {
            self.current_token = self.consume_token()?;
        }
        Ok(self.current_token.clone())
    }
}

fn literal(text: &'static str) -> Reader {
    Box::new(move |t: &mut Tokenizer| -> Result<Option<String>> {
        if t.remaining().starts_with(text) {
            t.advance_by(text.chars().count());
            Ok(Some(text.to_string()))
        } else {
            Ok(None)
        }
    })
}

fn word_literal(text: &'static str) -> Reader {
    Box::new(move |t: &mut Tokenizer| -> Result<Option<String>> {
        if t.remaining().starts_with(text) {
            let after = t.chars.get(t.char_index + text.chars().count()).copied();
            if is_word_boundary(after) {
                t.advance_by(text.chars().count());
                return Ok(Some(text.to_string()));
            }
        }
        Ok(None)
    })
}

/// `#` to end of line, per spec.md §4.1's COMMENT rule.
fn read_comment(t: &mut Tokenizer) -> Result<Option<String>> {
    if t.peek_next_char() != Some('#') {
        return Ok(None);
    }
    let mut lexeme = String::new();
    while let Some(c) = t.peek_next_char() {
        if c == '\n' {
            break;
        }
        lexeme.push(c);
        t.next_char();
    }
    Ok(Some(lexeme))
}

/// Reads a double-quoted string literal, resolving `\\`, `\"`, `\n`, `\t`, `\r` escapes.
///
/// Unlike every other reader, this one returns `Err` rather than `Ok(None)` once it has consumed
/// the opening quote: a string that runs to end of input without a closing quote is always a
/// hard [Error::UnterminatedString], never a fallthrough to the next candidate reader.
fn read_string(t: &mut Tokenizer) -> Result<Option<String>> {
    if t.peek_next_char() != Some('"') {
        return Ok(None);
    }
    let start = t.position();
    t.next_char();
    let mut out = String::new();
    loop {
        match t.next_char() {
            None => return Err(Error::UnterminatedString { position: start }),
            Some('"') => return Ok(Some(out)),
            Some('\\') => match t.next_char() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => return Err(Error::UnterminatedString { position: start }),
            },
            Some(c) => out.push(c),
        }
    }
}

fn read_double(t: &mut Tokenizer) -> Result<Option<String>> {
    match DOUBLE_PATTERN.find(&t.remaining()) {
        Some(m) => {
            let lexeme = m.as_str().to_string();
            t.advance_by(lexeme.chars().count());
            Ok(Some(lexeme))
        }
        None => Ok(None),
    }
}

fn read_long(t: &mut Tokenizer) -> Result<Option<String>> {
    match LONG_PATTERN.find(&t.remaining()) {
        Some(m) => {
            let lexeme = m.as_str().to_string();
            t.advance_by(lexeme.chars().count());
            Ok(Some(lexeme))
        }
        None => Ok(None),
    }
}

fn read_identifier(t: &mut Tokenizer) -> Result<Option<String>> {
    match IDENTIFIER_PATTERN.find(&t.remaining()) {
        Some(m) => {
            let lexeme = m.as_str().to_string();
            t.advance_by(lexeme.chars().count());
            Ok(Some(lexeme))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        let mut tokenizer = Tokenizer::new(source);
        let mut out = Vec::new();
        while let Some(tok) = tokenizer.consume_token().unwrap() {
            out.push(tok.kind);
        }
        out
    }

    #[test]
    fn tokenizes_arithmetic() {
        assert_eq!(
            kinds("1 + 2 * 3"),
            vec![
                TokenType::Long,
                TokenType::Plus,
                TokenType::Long,
                TokenType::Star,
                TokenType::Long
            ]
        );
    }

    #[test]
    fn prefers_longest_operator_match() {
        assert_eq!(kinds("a === b"), vec![TokenType::Identifier, TokenType::EqExact, TokenType::Identifier]);
        assert_eq!(kinds("a == b"), vec![TokenType::Identifier, TokenType::Eq, TokenType::Identifier]);
        assert_eq!(kinds("a = b"), vec![TokenType::Identifier, TokenType::Assign, TokenType::Identifier]);
    }

    #[test]
    fn keyword_requires_word_boundary() {
        assert_eq!(kinds("nullable"), vec![TokenType::Identifier]);
        assert_eq!(kinds("null"), vec![TokenType::Null]);
    }

    #[test]
    fn decodes_string_escapes() {
        let mut tokenizer = Tokenizer::new(r#""a\nb\"c""#);
        let tok = tokenizer.consume_token().unwrap().unwrap();
        assert_eq!(tok.kind, TokenType::StringLit);
        assert_eq!(tok.lexeme, "a\nb\"c");
    }

    #[test]
    fn unterminated_string_is_hard_error() {
        let mut tokenizer = Tokenizer::new("\"unterminated");
        let err = tokenizer.consume_token().unwrap_err();
        assert_eq!(err, Error::UnterminatedString { position: Position::new(1, 1) });
    }

    #[test]
    fn skips_comments() {
        assert_eq!(kinds("1 # a comment\n+ 2"), vec![TokenType::Long, TokenType::Plus, TokenType::Long]);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut tokenizer = Tokenizer::new("a b");
        let peeked = tokenizer.peek_token().unwrap().unwrap();
        assert_eq!(peeked.lexeme, "a");
        let consumed = tokenizer.consume_token().unwrap().unwrap();
        assert_eq!(consumed.lexeme, "a");
        let next = tokenizer.consume_token().unwrap().unwrap();
        assert_eq!(next.lexeme, "b");
    }

    #[test]
    fn double_without_leading_digit_lexes_as_one_token() {
        assert_eq!(kinds(".5"), vec![TokenType::Double]);
        let mut tokenizer = Tokenizer::new(".5");
        let tok = tokenizer.consume_token().unwrap().unwrap();
        assert_eq!(tok.lexeme, ".5");
    }

    #[test]
    fn long_exponent_is_lowercase_only() {
        // spec.md §4.1's LONG exponent suffix is the literal `e[0-9]+`, lowercase only. Uppercase
        // `E` isn't part of the numeric lexeme, so `3E2` lexes as two tokens, not one `Long`.
        assert_eq!(kinds("3e2"), vec![TokenType::Long]);
        assert_eq!(kinds("3E2"), vec![TokenType::Long, TokenType::Identifier]);
    }

    #[test]
    fn identifier_does_not_allow_leading_underscore() {
        // No reader matches a leading `_` (spec.md §4.1's IDENTIFIER is `[A-Za-z][A-Za-z0-9_]*`),
        // so this is an `UnknownToken`, not an identifier named `_foo`.
        let mut tokenizer = Tokenizer::new("_foo");
        assert!(matches!(
            tokenizer.consume_token(),
            Err(Error::UnknownToken { position }) if position == Position::new(1, 1)
        ));
        assert_eq!(kinds("foo_bar"), vec![TokenType::Identifier]);
    }
}
