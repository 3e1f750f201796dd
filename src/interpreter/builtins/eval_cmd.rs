//! eval - Execute arguments as a shell command
//!
//! Concatenates all arguments and executes them as a shell command
//! in the current environment (variables persist after eval).

use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_eval(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let args = match args.first().map(String::as_str) {
        Some("--") => &args[1..],
        Some(first) if first.starts_with('-') && first.len() > 1 => {
            return BuiltinResult::failure(
                &format!("plush: eval: {}: invalid option\neval: usage: eval [arg ...]\n", first),
                2,
            );
        }
        _ => args,
    };

    let command = args.join(" ");
    if command.trim().is_empty() {
        return BuiltinResult::ok();
    }

    if interp.state.subst_depth >= interp.limits.max_subst_depth {
        return BuiltinResult::failure(
            &format!(
                "plush: eval: nesting exceeds {} levels\n",
                interp.limits.max_subst_depth
            ),
            1,
        );
    }

    interp.state.subst_depth += 1;
    let status = interp.execute_text(&command);
    interp.state.subst_depth -= 1;
    BuiltinResult::status(status)
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
    fn test_eval_sets_variables() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let result = handle_eval(&mut interp, &args(&["X=1;", "Y=$((X+1))"]));
        assert_eq!(result.exit_code, 0);
        assert_eq!(interp.state.vars.get_scalar("Y"), Some("2"));
    }

    #[test]
    fn test_eval_status_and_empty() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(handle_eval(&mut interp, &args(&["false"])).exit_code, 1);
        assert_eq!(handle_eval(&mut interp, &args(&["", " "])).exit_code, 0);
        assert_eq!(handle_eval(&mut interp, &args(&["-z"])).exit_code, 2);
        assert_eq!(handle_eval(&mut interp, &args(&["if"])).exit_code, 2);
    }

    #[test]
    fn test_eval_nesting_limit() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.limits.max_subst_depth = 2;
        interp.execute_text("f() { eval f; }");
        let result = handle_eval(&mut interp, &args(&["f"]));
        assert_eq!(result.exit_code, 1);
        assert_eq!(interp.state.subst_depth, 0);
    }
}
