//! Parser module for shell input
//!
//! This module contains the lexer, the recursive-descent parser and the
//! standalone arithmetic and brace-expansion parsers.

pub mod types;
pub mod lexer;
pub mod brace_expansion;
pub mod arithmetic_parser;
pub mod conditional_parser;
pub mod compound_parser;
pub mod command_parser;
pub mod parser;

// Re-exports
pub use arithmetic_parser::{parse_arithmetic, ArithSyntaxError};
pub use lexer::{tokenize, Token, TokenType};
pub use parser::{parse, AliasLookup, Parser};
pub use types::{ParseError, ParseResult};
