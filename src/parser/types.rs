//! Parser Types and Constants
//!
//! Shared types, errors and limits used across parser modules.

use thiserror::Error;

use crate::parser::lexer::TokenType;

// Parser limits to prevent hangs and resource exhaustion
pub const MAX_PARSER_DEPTH: usize = 200;
pub const DEFAULT_MAX_ALIAS_DEPTH: usize = 16;

/// Parse failures.
///
/// `Incomplete` is recoverable: the input ended inside a quote, here-document
/// or compound command and more lines may complete it. Everything else is
/// terminal for the current input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unexpected end of file while looking for {expected}")]
    Incomplete { expected: String, line: usize },

    #[error("syntax error near unexpected token `{token}' (line {line})")]
    UnexpectedToken { token: String, line: usize },

    #[error("syntax error: {message} (line {line})")]
    Syntax { message: String, line: usize },

    #[error("alias `{name}' expands recursively ({depth} levels)")]
    AliasCycle { name: String, depth: usize },

    #[error("line too long ({length} > {limit} bytes)")]
    LineTooLong { length: usize, limit: usize },
}

impl ParseError {
    pub fn incomplete(expected: impl Into<String>, line: usize) -> Self {
        ParseError::Incomplete {
            expected: expected.into(),
            line,
        }
    }

    pub fn syntax(message: impl Into<String>, line: usize) -> Self {
        ParseError::Syntax {
            message: message.into(),
            line,
        }
    }

    pub fn unexpected(token: impl Into<String>, line: usize) -> Self {
        ParseError::UnexpectedToken {
            token: token.into(),
            line,
        }
    }

    /// Whether more input could turn this failure into a successful parse.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ParseError::Incomplete { .. })
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Check if a token type is a redirection operator
pub fn is_redirection_token(t: TokenType) -> bool {
    matches!(
        t,
        TokenType::Less
            | TokenType::Great
            | TokenType::DLess
            | TokenType::DGreat
            | TokenType::LessAnd
            | TokenType::GreatAnd
            | TokenType::LessGreat
            | TokenType::DLessDash
            | TokenType::Clobber
            | TokenType::TLess
            | TokenType::AndGreat
            | TokenType::AndDGreat
    )
}

/// Reserved words recognized in command position
pub const RESERVED_WORDS: &[&str] = &[
    "if", "then", "else", "elif", "fi", "for", "while", "until", "do", "done", "case", "esac",
    "in", "function", "select", "time", "{", "}", "!", "[[", "]]",
];

/// Words that close a construct and therefore end a command list
pub fn is_list_terminator_word(word: &str) -> bool {
    matches!(
        word,
        "then" | "else" | "elif" | "fi" | "do" | "done" | "esac" | "}"
    )
}

/// Check if a string is a valid variable name
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
