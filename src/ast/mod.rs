//! Abstract Syntax Tree (AST) Types for the shell
//!
//! Architecture:
//!   Input → Lexer → Parser → AST → Expander → Execution engine → Processes

pub mod types;
