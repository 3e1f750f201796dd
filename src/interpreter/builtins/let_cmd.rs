//! let - Evaluate arithmetic expressions
//!
//! Usage:
//!   let expr [expr ...]
//!   let "x=1" "y=x+2"
//!
//! Each argument is evaluated as an arithmetic expression.
//! Returns 0 if the last expression evaluates to non-zero,
//! returns 1 if it evaluates to zero.
//!
//! Unquoted `let x=( 1 )` arrives as separate words; words are joined
//! until their parentheses balance.

use crate::interpreter::arithmetic::ArithEvaluator;
use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::interpreter::Interpreter;

fn group_expressions(args: &[String]) -> Vec<String> {
    let mut expressions = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;

    for arg in args {
        depth += arg.matches('(').count() as i32 - arg.matches(')').count() as i32;
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(arg);
        if depth <= 0 {
            expressions.push(std::mem::take(&mut current));
            depth = 0;
        }
    }
    if !current.is_empty() {
        expressions.push(current);
    }
    expressions
}

/// Handle the `let` builtin command.
pub fn handle_let(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    if args.is_empty() {
        return BuiltinResult::failure("plush: let: expression expected\n", 1);
    }

    let mut last = 0i64;
    for expr in group_expressions(args) {
        match ArithEvaluator::new(&mut interp.state).evaluate_text(&expr) {
            Ok(value) => last = value,
            Err(err) => {
                return BuiltinResult::failure(&format!("plush: let: {}: {}\n", expr, err), 1);
            }
        }
    }
    BuiltinResult::status(if last != 0 { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_group_expressions() {
        assert_eq!(
            group_expressions(&args(&["x=(", "1", "+", "2", ")", "y=3"])),
            args(&["x=( 1 + 2 )", "y=3"])
        );
    }

    #[test]
    fn test_let_assigns_and_status() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(handle_let(&mut interp, &args(&["x=4", "y=x*2"])).exit_code, 0);
        assert_eq!(interp.state.vars.get_scalar("y"), Some("8"));
        assert_eq!(handle_let(&mut interp, &args(&["x-4"])).exit_code, 1);
    }

    #[test]
    fn test_let_errors() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(handle_let(&mut interp, &[]).exit_code, 1);
        let result = handle_let(&mut interp, &args(&["1/0"]));
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "plush: let: 1/0: division by 0\n");
    }
}
