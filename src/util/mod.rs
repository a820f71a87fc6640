//! Ambient, non-grammar concerns shared by the tokenizer, parser and interpreter.

pub mod logger;
