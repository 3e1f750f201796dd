//! Interpreter - AST Execution Entry Point
//!
//! [`Interpreter`] owns the complete shell state and is the receiver of
//! every execution method. The work is split across modules that each add
//! an `impl Interpreter` block:
//! - word expansion (word_expansion.rs, expansion/)
//! - lists, compound commands and loops (execution_engine.rs)
//! - pipelines and simple commands (pipeline_execution.rs)
//! - redirections (redirections.rs)
//! - `[[ ]]` evaluation (conditionals.rs)
//! - builtins (builtin_dispatch.rs, builtins/)
//!
//! This file holds construction, parsing with the alias table and line
//! limit, error reporting, and the transition into a forked subshell.

use std::path::Path;

use log::debug;

use crate::ast::types::CommandList;
use crate::interpreter::builtin_dispatch::BuiltinRegistry;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::sys::{self, Disposition};
use crate::interpreter::traps::TrapAction;
use crate::interpreter::types::{ControlSignal, ExecutionLimits, InterpreterState, ShellOptions};
use crate::parser::{ParseError, Parser};

pub struct Interpreter {
    pub state: InterpreterState,
    pub limits: ExecutionLimits,
    pub(crate) builtins: BuiltinRegistry,
}

impl Interpreter {
    pub fn new(options: ShellOptions, script_name: impl Into<String>) -> Self {
        Self::with_limits(options, script_name, ExecutionLimits::default())
    }

    pub fn with_limits(options: ShellOptions, script_name: impl Into<String>, limits: ExecutionLimits) -> Self {
        Self {
            state: InterpreterState::new(options, script_name),
            limits,
            builtins: BuiltinRegistry::new(),
        }
    }

    /// Import the process environment and set the variables the shell
    /// maintains itself.
    pub fn initialize_from_system(&mut self) {
        self.state.vars.import_env(
            std::env::vars_os()
                .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned())),
        );

        let _ = self.state.vars.set_scalar("PPID", sys::getppid().to_string());

        if let Ok(cwd) = std::env::current_dir() {
            let pwd_valid = self
                .state
                .vars
                .get_scalar("PWD")
                .is_some_and(|pwd| Path::new(pwd).is_absolute() && same_dir(Path::new(pwd), &cwd));
            if !pwd_valid {
                let _ = self.state.vars.set_scalar("PWD", cwd.to_string_lossy());
                self.state.vars.export("PWD");
            }
        }

        let level = self
            .state
            .vars
            .get_scalar("SHLVL")
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(0);
        let _ = self.state.vars.set_scalar("SHLVL", (level + 1).to_string());
        self.state.vars.export("SHLVL");

        if self.state.options.interactive {
            let _ = sys::set_signal(libc::SIGINT, Disposition::Ignore);
            let _ = sys::set_signal(libc::SIGQUIT, Disposition::Ignore);
        }
    }

    /// Parse one chunk of input with alias expansion enabled.
    pub fn parse(&self, input: &str) -> Result<CommandList, ParseError> {
        let longest = input.lines().map(str::len).max().unwrap_or(0);
        if longest > self.limits.max_line_length {
            return Err(ParseError::LineTooLong {
                length: longest,
                limit: self.limits.max_line_length,
            });
        }
        Parser::new(input)?
            .with_aliases(&self.state.aliases, self.limits.max_alias_depth)
            .parse_program()
    }

    /// Parse and run `text`, reporting any error on stderr. Returns the
    /// resulting status, which is also stored in `$?`.
    pub fn execute_text(&mut self, text: &str) -> i32 {
        match self.parse(text) {
            Ok(list) => self.run_list(&list),
            Err(err) => self.report_error(&err.into()),
        }
    }

    /// Run an already parsed list, reporting any error on stderr.
    pub fn run_list(&mut self, list: &CommandList) -> i32 {
        let status = match self.execute_list(list) {
            Ok(status) => status,
            Err(err) => self.report_error(&err),
        };
        let status = match self.state.pending {
            Some(ControlSignal::Exit(code)) => code,
            _ => status,
        };
        self.state.last_exit_code = status;
        status
    }

    /// Print `plush: <err>` and record the error's status in `$?`.
    pub fn report_error(&mut self, err: &InterpreterError) -> i32 {
        sys::print_err(&format!("plush: {}\n", err));
        let status = err.exit_status();
        self.state.last_exit_code = status;
        status
    }

    /// Status requested by `exit` or errexit, if any.
    pub fn exit_requested(&self) -> Option<i32> {
        match self.state.pending {
            Some(ControlSignal::Exit(code)) => Some(code),
            _ => None,
        }
    }

    /// Turn a freshly forked child into a subshell: drop state that belongs
    /// to the parent and restore default signal handling.
    pub fn become_subshell(&mut self, background: bool) {
        self.state.in_subshell = true;
        self.state.options.interactive = false;
        self.state.jobs.clear();
        self.state.proc_substs.clear();
        self.state.traps.reset_for_subshell();

        let interrupt = if background {
            Disposition::Ignore
        } else {
            Disposition::Default
        };
        for signal in [libc::SIGINT, libc::SIGQUIT] {
            if self.state.traps.get(signal) != Some(&TrapAction::Ignore) {
                let _ = sys::set_signal(signal, interrupt);
            }
        }
        if self.state.traps.get(libc::SIGPIPE) != Some(&TrapAction::Ignore) {
            let _ = sys::set_signal(libc::SIGPIPE, Disposition::Default);
        }
        debug!("subshell pid {} (background: {})", sys::getpid(), background);
    }

    /// Leave a forked subshell, running its `EXIT` trap first.
    pub fn exit_subshell(&mut self, status: i32) -> ! {
        self.state.last_exit_code = status;
        self.run_exit_trap();
        let status = self.exit_requested().unwrap_or(status);
        sys::exit_now(status)
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(x), Ok(y)) => x.dev() == y.dev() && x.ino() == y.ino(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    #[test]
    fn test_line_limit() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.limits.max_line_length = 8;
        assert!(matches!(
            interp.parse("echo 0123456789"),
            Err(ParseError::LineTooLong { length: 15, limit: 8 })
        ));
        assert!(interp.parse("echo hi").is_ok());
    }

    #[test]
    fn test_parse_error_sets_status() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(interp.execute_text("echo )"), 2);
        assert_eq!(interp.state.last_exit_code, 2);
    }

    #[test]
    fn test_parse_uses_aliases() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.state.aliases.insert("setx", "X=aliased");
        assert_eq!(interp.execute_text("setx"), 0);
        assert_eq!(interp.state.vars.get_scalar("X"), Some("aliased"));
    }

    #[test]
    #[serial]
    fn test_initialize_from_system() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.initialize_from_system();
        assert!(interp.state.vars.is_exported("PATH") || interp.state.vars.get("PATH").is_none());
        assert_eq!(
            interp.state.vars.get_scalar("PPID"),
            Some(sys::getppid().to_string().as_str())
        );
        assert!(interp.state.vars.get_scalar("PWD").is_some());
    }

    #[test]
    fn test_exit_request() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(interp.execute_text("exit 3; X=after"), 3);
        assert_eq!(interp.exit_requested(), Some(3));
        assert_eq!(interp.state.vars.get_scalar("X"), None);
    }
}
