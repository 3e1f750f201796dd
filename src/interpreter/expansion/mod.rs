//! Expansion helpers used by the word-expansion engine in
//! [`word_expansion`](crate::interpreter::word_expansion).

pub mod command_substitution;
pub mod parameter_ops;
pub mod pattern;
pub mod process_substitution;
pub mod tilde;
pub mod word_glob_expansion;
pub mod word_split;
