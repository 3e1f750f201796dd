//! Interpreter module
//!
//! Shell state, word expansion and the execution engine that turns parsed
//! command lists into processes.

pub mod alias_expansion;
pub mod arithmetic;
pub mod builtin_dispatch;
pub mod builtins;
pub mod command_resolution;
pub mod conditionals;
pub mod errors;
pub mod execution_engine;
pub mod expansion;
pub mod functions;
pub mod helpers;
pub mod interpreter;
pub mod jobs;
pub mod pipeline_execution;
pub mod redirections;
pub mod sys;
pub mod traps;
pub mod types;
pub mod variables;
pub mod word_expansion;

pub use errors::*;
pub use interpreter::Interpreter;
pub use types::*;
