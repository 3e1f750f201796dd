//! plush - a small POSIX-like command shell
//!
//! The [`parser`] turns input into the [`ast`], the [`interpreter`] runs it
//! against the real process environment, and [`shell`] drives input from a
//! terminal, a script file or `-c`.

pub mod ast;
pub mod config;
pub mod interpreter;
pub mod parser;
pub mod shell;

pub use interpreter::Interpreter;
pub use parser::{parse, ParseError, Parser};
