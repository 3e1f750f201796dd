//! Interpreter Errors
//!
//! Error types for each layer of execution:
//! - ArithmeticError: `$(( ))`, `(( ))`, `let`, subscripts
//! - ExpansionError: word expansion failures (nounset, bad substitution, `:?`)
//! - ExecError: spawn, exec and redirection failures local to one segment
//! - InterpreterError: everything that can end the current input chunk
//!
//! Loop and function control flow is not an error; see
//! [`ControlSignal`](crate::interpreter::types::ControlSignal).

use std::io;

use thiserror::Error;

use crate::parser::{ArithSyntaxError, ParseError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("division by 0")]
    DivisionByZero,

    #[error("{0}")]
    Syntax(String),

    #[error("{0}: unbound variable")]
    Unbound(String),

    #[error("exponent less than 0")]
    NegativeExponent,

    #[error("{0}: readonly variable")]
    Readonly(String),

    #[error("{0}: expression recursion level exceeded")]
    Recursion(String),
}

impl From<ArithSyntaxError> for ArithmeticError {
    fn from(err: ArithSyntaxError) -> Self {
        ArithmeticError::Syntax(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExpansionError {
    #[error("{0}: unbound variable")]
    Unbound(String),

    #[error("{0}: bad substitution")]
    BadSubstitution(String),

    #[error("{name}: {message}")]
    NullOrUnset { name: String, message: String },

    #[error("{0}: readonly variable")]
    Readonly(String),

    #[error("{0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("{0}: ambiguous redirect")]
    AmbiguousRedirect(String),

    #[error("substitution nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("{0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{0}: command not found")]
    NotFound(String),

    #[error("{path}: {source}")]
    NotExecutable { path: String, source: io::Error },

    #[error("{target}: {source}")]
    Redirect { target: String, source: io::Error },

    #[error("{0}: cannot overwrite existing file")]
    Clobber(String),

    #[error("{0}: bad file descriptor")]
    BadDescriptor(String),

    #[error("{context}: {source}")]
    Sys {
        context: &'static str,
        source: io::Error,
    },

    #[error(transparent)]
    Expansion(#[from] ExpansionError),
}

impl ExecError {
    pub fn sys(context: &'static str, source: io::Error) -> Self {
        ExecError::Sys { context, source }
    }

    /// Status a segment reports after failing this way.
    pub fn exit_status(&self) -> i32 {
        match self {
            ExecError::NotFound(_) => 127,
            ExecError::NotExecutable { source, .. }
                if source.kind() == io::ErrorKind::NotFound =>
            {
                127
            }
            ExecError::NotExecutable { .. } => 126,
            _ => 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Expansion(#[from] ExpansionError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("{0}")]
    Fatal(String),
}

impl From<ArithmeticError> for InterpreterError {
    fn from(err: ArithmeticError) -> Self {
        InterpreterError::Expansion(ExpansionError::Arithmetic(err))
    }
}

impl InterpreterError {
    /// Status recorded in `$?` when this error ends a chunk of input.
    pub fn exit_status(&self) -> i32 {
        match self {
            InterpreterError::Parse(_) => 2,
            InterpreterError::Expansion(_) => 1,
            InterpreterError::Exec(err) => err.exit_status(),
            InterpreterError::Fatal(_) => 2,
        }
    }
}

pub type ExpansionResult<T> = Result<T, ExpansionError>;
pub type ExecResult<T> = Result<T, InterpreterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_error_status() {
        assert_eq!(ExecError::NotFound("x".into()).exit_status(), 127);
        let denied = ExecError::NotExecutable {
            path: "/tmp/x".into(),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(denied.exit_status(), 126);
        assert_eq!(ExecError::Clobber("f".into()).exit_status(), 1);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ExpansionError::Unbound("FOO".into()).to_string(),
            "FOO: unbound variable"
        );
        assert_eq!(
            InterpreterError::from(ArithmeticError::DivisionByZero).to_string(),
            "division by 0"
        );
        assert_eq!(
            InterpreterError::Parse(ParseError::unexpected(")", 1)).exit_status(),
            2
        );
    }
}
