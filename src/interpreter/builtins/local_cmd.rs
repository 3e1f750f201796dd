//! local - Declare function-local variables
//!
//! local NAME[=value] ...
//!
//! The prior binding of each name is saved in the current function's frame
//! and restored when the function returns. `local NAME` without a value
//! leaves NAME unset inside the function.

use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::interpreter::Interpreter;
use crate::parser::types::is_valid_name;

pub fn handle_local(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    if interp.state.call_depth == 0 || !interp.state.vars.in_frame() {
        return BuiltinResult::failure("plush: local: can only be used in a function\n", 1);
    }

    let args = match args.first().map(String::as_str) {
        Some("--") => &args[1..],
        _ => args,
    };

    let mut stderr = String::new();
    let mut exit_code = 0;

    for arg in args {
        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (arg.as_str(), None),
        };
        if !is_valid_name(name) {
            stderr.push_str(&format!("plush: local: `{}': not a valid identifier\n", arg));
            exit_code = 1;
            continue;
        }
        let outcome = interp.state.vars.declare_local(name).and_then(|()| match value {
            Some(value) => interp.state.set_var(name, value),
            None => interp.state.vars.unset(name),
        });
        if let Err(err) = outcome {
            stderr.push_str(&format!("plush: local: {}\n", err));
            exit_code = 1;
        }
    }

    BuiltinResult {
        stdout: String::new(),
        stderr,
        exit_code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_local_outside_function() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let result = handle_local(&mut interp, &["x=1".to_string()]);
        assert_eq!(result.exit_code, 1);
        assert_eq!(interp.state.vars.get_scalar("x"), None);
    }

    #[test]
    fn test_local_restores_on_return() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.execute_text("x=global; f() { local x=inner y; Y=${y-unset}; X=$x; }; f");
        assert_eq!(interp.state.vars.get_scalar("X"), Some("inner"));
        assert_eq!(interp.state.vars.get_scalar("Y"), Some("unset"));
        assert_eq!(interp.state.vars.get_scalar("x"), Some("global"));
        assert!(!interp.state.vars.contains("y"));
    }

    #[test]
    fn test_local_invalid_name() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.execute_text("f() { local 1a=2; S=$?; }; f");
        assert_eq!(interp.state.vars.get_scalar("S"), Some("1"));
    }
}
