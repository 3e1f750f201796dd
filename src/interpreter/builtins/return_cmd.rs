//! return - Return from a function with an exit code

use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::types::ControlSignal;

/// Handle the return builtin command.
///
/// # Arguments
/// * `interp` - The interpreter
/// * `args` - Optional status; defaults to `$?`
pub fn handle_return(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    if interp.state.call_depth == 0 && interp.state.source_depth == 0 {
        return BuiltinResult::failure(
            "plush: return: can only `return' from a function or sourced script\n",
            1,
        );
    }

    let exit_code = match args.first() {
        None => interp.state.last_exit_code,
        Some(arg) => match arg.parse::<i64>() {
            Ok(n) => n.rem_euclid(256) as i32,
            Err(_) => {
                return BuiltinResult::failure(
                    &format!("plush: return: {}: numeric argument required\n", arg),
                    2,
                )
            }
        },
    };

    interp.state.pending = Some(ControlSignal::Return);
    BuiltinResult::status(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;

    fn make_interp() -> Interpreter {
        Interpreter::new(ShellOptions::default(), "plush")
    }

    #[test]
    fn test_return_outside_function() {
        let mut interp = make_interp();
        let result = handle_return(&mut interp, &[]);
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("can only `return'"));
        assert_eq!(interp.state.pending, None);
    }

    #[test]
    fn test_return_in_function() {
        let mut interp = make_interp();
        interp.state.call_depth = 1;
        interp.state.last_exit_code = 9;
        assert_eq!(handle_return(&mut interp, &[]).exit_code, 9);
        assert_eq!(interp.state.pending, Some(ControlSignal::Return));
        assert_eq!(handle_return(&mut interp, &["258".to_string()]).exit_code, 2);
    }

    #[test]
    fn test_return_non_numeric() {
        let mut interp = make_interp();
        interp.state.source_depth = 1;
        assert_eq!(handle_return(&mut interp, &["x".to_string()]).exit_code, 2);
    }
}
