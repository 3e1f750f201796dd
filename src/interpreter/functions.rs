//! Shell Functions
//!
//! The function table and function invocation. A call swaps in the
//! argument vector as the positional parameters, pushes a `local` frame,
//! runs a clone of the stored body and restores everything on the way out,
//! whether the body finished, hit `return`, or failed with an error.

use std::collections::HashMap;

use log::trace;

use crate::ast::types::FunctionDef;
use crate::interpreter::errors::{ExecResult, InterpreterError};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::types::ControlSignal;

#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: HashMap<String, FunctionDef>,
}

impl FunctionTable {
    /// Define or redefine a function.
    pub fn define(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.clone(), def);
    }

    pub fn lookup(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.functions.remove(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Interpreter {
    /// Call function `name` with `argv[1..]` as its positional parameters.
    pub fn call_function(&mut self, name: &str, argv: &[String]) -> ExecResult<i32> {
        let Some(def) = self.state.functions.lookup(name).cloned() else {
            return Ok(127);
        };
        if self.state.call_depth >= self.limits.max_call_depth {
            return Err(InterpreterError::Fatal(format!(
                "{}: maximum function nesting level exceeded ({})",
                name, self.limits.max_call_depth
            )));
        }
        trace!("call {} with {} args", name, argv.len().saturating_sub(1));

        let saved_positional = std::mem::replace(&mut self.state.positional, argv[1..].to_vec());
        let saved_loop_depth = std::mem::replace(&mut self.state.loop_depth, 0);
        self.state.vars.push_frame();
        self.state.call_depth += 1;

        let result = self.execute_command(&def.body);

        self.state.call_depth -= 1;
        self.state.vars.pop_frame();
        self.state.loop_depth = saved_loop_depth;
        self.state.positional = saved_positional;

        let status = result?;
        if self.state.pending == Some(ControlSignal::Return) {
            self.state.pending = None;
            return Ok(self.state.last_exit_code);
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use crate::parser::parse;
    use crate::ast::types::Command;
    use pretty_assertions::assert_eq;

    fn def(source: &str) -> FunctionDef {
        match parse(source).unwrap().entries.remove(0).command {
            Command::FunctionDef(def) => def,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_table_define_lookup_remove() {
        let mut table = FunctionTable::default();
        table.define(def("f() { :; }"));
        table.define(def("g() { :; }"));
        assert!(table.contains("f"));
        assert_eq!(table.names(), vec!["f", "g"]);
        assert!(table.remove("f"));
        assert!(table.lookup("f").is_none());
    }

    #[test]
    fn test_call_swaps_positional_and_locals() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.state.positional = vec!["outer".into()];
        interp.state.vars.set_scalar("v", "global").unwrap();
        interp.state.functions.define(def("f() { local v=inner; R=$1$#; return 4; }"));

        let argv = vec!["f".to_string(), "a".to_string(), "b".to_string()];
        let status = interp.call_function("f", &argv).unwrap();

        assert_eq!(status, 4);
        assert_eq!(interp.state.pending, None);
        assert_eq!(interp.state.positional, vec!["outer"]);
        assert_eq!(interp.state.vars.get_scalar("v"), Some("global"));
        assert_eq!(interp.state.vars.get_scalar("R"), Some("a2"));
    }

    #[test]
    fn test_recursion_limit() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.limits.max_call_depth = 8;
        interp.state.functions.define(def("r() { r; }"));
        let err = interp.call_function("r", &["r".to_string()]).unwrap_err();
        assert!(err.to_string().contains("maximum function nesting level"));
        assert_eq!(interp.state.call_depth, 0);
    }
}
