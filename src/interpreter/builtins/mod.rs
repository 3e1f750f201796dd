//! Builtin Commands
//!
//! Each builtin is a plain function `fn(&mut Interpreter, &[String]) ->
//! BuiltinResult` taking the arguments after the command name. Output is
//! returned, not written, and the dispatcher sends it to fds 1 and 2 so
//! in-process redirections apply to it. Builtins that affect control flow
//! set [`ControlSignal`](crate::interpreter::types::ControlSignal) in the
//! interpreter state.

pub mod alias_cmd;
pub mod break_cmd;
pub mod cd_cmd;
pub mod continue_cmd;
pub mod echo_cmd;
pub mod eval_cmd;
pub mod exit_cmd;
pub mod export_cmd;
pub mod jobs_cmd;
pub mod let_cmd;
pub mod local_cmd;
pub mod return_cmd;
pub mod set_cmd;
pub mod shift_cmd;
pub mod source_cmd;
pub mod trap_cmd;
pub mod unset_cmd;

use std::io;

/// Result type for builtin commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltinResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl BuiltinResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn status(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    pub fn output(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn failure(stderr: &str, exit_code: i32) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code,
        }
    }
}

/// `No such file or directory`, without the `(os error 2)` suffix.
pub(crate) fn io_message(err: &io::Error) -> String {
    let text = err.to_string();
    match text.find(" (os error") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}
