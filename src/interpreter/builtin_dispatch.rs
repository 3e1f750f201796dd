//! Builtin Command Dispatch
//!
//! Name to function table for builtin commands, and the call path used by
//! the execution engine: look the name up, run the function in the shell
//! process, write its captured output to fds 1 and 2, return its status.

use std::collections::HashMap;

use crate::interpreter::builtins::{
    alias_cmd, break_cmd, cd_cmd, continue_cmd, echo_cmd, eval_cmd, exit_cmd, export_cmd, jobs_cmd,
    let_cmd, local_cmd, return_cmd, set_cmd, shift_cmd, source_cmd, trap_cmd, unset_cmd,
    BuiltinResult,
};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::sys;

pub type BuiltinFn = fn(&mut Interpreter, &[String]) -> BuiltinResult;

fn handle_colon(_: &mut Interpreter, _: &[String]) -> BuiltinResult {
    BuiltinResult::ok()
}

fn handle_false(_: &mut Interpreter, _: &[String]) -> BuiltinResult {
    BuiltinResult::status(1)
}

#[derive(Clone)]
pub struct BuiltinRegistry {
    table: HashMap<&'static str, BuiltinFn>,
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinRegistry {
    /// Registry holding the full builtin catalog.
    pub fn new() -> Self {
        let mut registry = Self {
            table: HashMap::new(),
        };
        let catalog: [(&'static str, BuiltinFn); 26] = [
            (":", handle_colon),
            ("true", handle_colon),
            ("false", handle_false),
            ("echo", echo_cmd::handle_echo),
            ("pwd", cd_cmd::handle_pwd),
            ("cd", cd_cmd::handle_cd),
            ("export", export_cmd::handle_export),
            ("readonly", export_cmd::handle_readonly),
            ("unset", unset_cmd::handle_unset),
            ("local", local_cmd::handle_local),
            ("set", set_cmd::handle_set),
            ("shift", shift_cmd::handle_shift),
            ("break", break_cmd::handle_break),
            ("continue", continue_cmd::handle_continue),
            ("return", return_cmd::handle_return),
            ("exit", exit_cmd::handle_exit),
            ("eval", eval_cmd::handle_eval),
            ("source", source_cmd::handle_source),
            (".", source_cmd::handle_source),
            ("let", let_cmd::handle_let),
            ("alias", alias_cmd::handle_alias),
            ("unalias", alias_cmd::handle_unalias),
            ("trap", trap_cmd::handle_trap),
            ("jobs", jobs_cmd::handle_jobs),
            ("wait", jobs_cmd::handle_wait),
            ("kill", jobs_cmd::handle_kill),
        ];
        for (name, handler) in catalog {
            registry.register(name, handler);
        }
        registry
    }

    pub fn register(&mut self, name: &'static str, handler: BuiltinFn) {
        self.table.insert(name, handler);
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.table.get(name).copied()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.table.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Interpreter {
    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.is_builtin(name)
    }

    /// Run builtin `argv[0]` in the shell process and return its status.
    pub fn run_builtin(&mut self, argv: &[String]) -> i32 {
        let Some(handler) = argv.first().and_then(|name| self.builtins.get(name)) else {
            return 127;
        };
        let result = handler(self, &argv[1..]);
        if !result.stdout.is_empty() {
            sys::print_out(&result.stdout);
        }
        if !result.stderr.is_empty() {
            sys::print_err(&result.stderr);
        }
        result.exit_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_catalog() {
        let registry = BuiltinRegistry::new();
        for name in ["cd", "echo", ".", "source", "trap", "wait", ":"] {
            assert!(registry.is_builtin(name), "{}", name);
        }
        assert!(!registry.is_builtin("ls"));
        assert_eq!(registry.names().first(), Some(&"."));
    }

    #[test]
    fn test_run_builtin_status() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(interp.run_builtin(&["true".to_string()]), 0);
        assert_eq!(interp.run_builtin(&["false".to_string()]), 1);
        assert_eq!(interp.run_builtin(&["nope".to_string()]), 127);
        assert_eq!(interp.run_builtin(&[]), 127);
    }

    #[test]
    fn test_register_custom() {
        fn seven(_: &mut Interpreter, _: &[String]) -> BuiltinResult {
            BuiltinResult::status(7)
        }
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.builtins.register("seven", seven);
        assert!(interp.is_builtin("seven"));
        assert_eq!(interp.run_builtin(&["seven".to_string()]), 7);
    }
}
