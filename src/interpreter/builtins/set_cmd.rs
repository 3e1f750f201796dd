//! set - Set/unset shell options and positional parameters
//!
//! set                 - list variables
//! set -o / set +o     - list option states / commands that recreate them
//! set -eux, set +eux  - enable / disable options by letter
//! set -o NAME         - enable an option by long name
//! set [--] args       - replace the positional parameters

use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::expansion::parameter_ops::quote_value;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::types::{InterpreterState, OPTION_NAMES};
use crate::interpreter::variables::VarValue;

const SET_USAGE: &str = "set: usage: set [-aCefuvx] [-o option] [--] [arg ...]\n";

fn invalid(message: String) -> BuiltinResult {
    BuiltinResult::failure(&format!("plush: set: {}\n{}", message, SET_USAGE), 2)
}

/// `name=value` lines for every variable.
fn list_variables(state: &InterpreterState) -> String {
    let mut stdout = String::new();
    for name in state.vars.names() {
        let Some(var) = state.vars.get(&name) else {
            continue;
        };
        match &var.value {
            VarValue::Scalar(value) => {
                stdout.push_str(&format!("{}={}\n", name, quote_value(value)));
            }
            VarValue::Array(items) => {
                let elements: Vec<String> = items
                    .iter()
                    .map(|(index, value)| format!("[{}]={}", index, quote_value(value)))
                    .collect();
                stdout.push_str(&format!("{}=({})\n", name, elements.join(" ")));
            }
        }
    }
    stdout
}

fn list_options(state: &InterpreterState, as_commands: bool) -> String {
    let mut stdout = String::new();
    for (name, _) in OPTION_NAMES {
        let on = state.options.get(name).unwrap_or(false);
        if as_commands {
            stdout.push_str(&format!("set {} {}\n", if on { "-o" } else { "+o" }, name));
        } else {
            stdout.push_str(&format!("{:<15} {}\n", name, if on { "on" } else { "off" }));
        }
    }
    stdout
}

/// Handle the set builtin command.
pub fn handle_set(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    if args.is_empty() {
        return BuiltinResult::output(list_variables(&interp.state));
    }

    let state = &mut interp.state;
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        match arg {
            "--" => {
                state.positional = args[i + 1..].to_vec();
                return BuiltinResult::ok();
            }
            "-" => {
                state.options.xtrace = false;
                state.options.verbose = false;
                if i + 1 < args.len() {
                    state.positional = args[i + 1..].to_vec();
                    return BuiltinResult::ok();
                }
            }
            "-o" | "+o" => {
                let enable = arg == "-o";
                match args.get(i + 1) {
                    None => return BuiltinResult::output(list_options(state, !enable)),
                    Some(name) => {
                        if !state.options.set_by_name(name, enable) {
                            return invalid(format!("{}: invalid option name", name));
                        }
                        i += 1;
                    }
                }
            }
            _ if arg.len() > 1 && (arg.starts_with('-') || arg.starts_with('+')) => {
                let enable = arg.starts_with('-');
                for letter in arg[1..].chars() {
                    if !state.options.set_by_letter(letter, enable) {
                        return invalid(format!("{}{}: invalid option", &arg[..1], letter));
                    }
                }
            }
            "+" => {}
            _ => {
                state.positional = args[i..].to_vec();
                return BuiltinResult::ok();
            }
        }
        i += 1;
    }
    BuiltinResult::ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn make_interp() -> Interpreter {
        Interpreter::new(ShellOptions::default(), "plush")
    }

    #[test]
    fn test_set_letters() {
        let mut interp = make_interp();
        assert_eq!(handle_set(&mut interp, &args(&["-eu"])).exit_code, 0);
        assert!(interp.state.options.errexit);
        assert!(interp.state.options.nounset);
        handle_set(&mut interp, &args(&["+e"]));
        assert!(!interp.state.options.errexit);
        assert_eq!(interp.state.options.flags(), "u");
    }

    #[test]
    fn test_set_long_options() {
        let mut interp = make_interp();
        handle_set(&mut interp, &args(&["-o", "pipefail", "-o", "noclobber"]));
        assert!(interp.state.options.pipefail);
        assert!(interp.state.options.noclobber);
        let listing = handle_set(&mut interp, &args(&["-o"])).stdout;
        assert!(listing.contains("pipefail        on\n"));
        assert!(listing.contains("xtrace          off\n"));
        let commands = handle_set(&mut interp, &args(&["+o"])).stdout;
        assert!(commands.contains("set -o pipefail\n"));
    }

    #[test]
    fn test_set_positional() {
        let mut interp = make_interp();
        handle_set(&mut interp, &args(&["--", "a", "-b"]));
        assert_eq!(interp.state.positional, args(&["a", "-b"]));
        handle_set(&mut interp, &args(&["-x", "c"]));
        assert!(interp.state.options.xtrace);
        assert_eq!(interp.state.positional, args(&["c"]));
        handle_set(&mut interp, &args(&["--"]));
        assert!(interp.state.positional.is_empty());
    }

    #[test]
    fn test_set_invalid() {
        let mut interp = make_interp();
        let result = handle_set(&mut interp, &args(&["-Z"]));
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.starts_with("plush: set: -Z: invalid option\n"));
        let result = handle_set(&mut interp, &args(&["-o", "bogus"]));
        assert!(result.stderr.contains("bogus: invalid option name"));
    }

    #[test]
    fn test_set_lists_variables() {
        let mut interp = make_interp();
        interp.state.set_var("A", "x y").unwrap();
        interp.state.set_array("L", args(&["1", "2"])).unwrap();
        assert_eq!(
            handle_set(&mut interp, &[]).stdout,
            "A='x y'\nL=([0]='1' [1]='2')\n"
        );
    }
}
