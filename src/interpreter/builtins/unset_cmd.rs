//! unset - Remove variables/functions builtin
//!
//! Supports:
//! - unset VAR - remove variable, or the function when no variable exists
//! - unset -v VAR - remove variable only
//! - unset -f FUNC - remove function only
//! - unset 'a[i]' - remove array element

use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::interpreter::Interpreter;
use crate::parser::types::is_valid_name;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Target {
    Either,
    Variable,
    Function,
}

/// Split `name[expr]` into its parts.
fn split_element(arg: &str) -> Option<(&str, &str)> {
    let open = arg.find('[')?;
    let inner = arg[open + 1..].strip_suffix(']')?;
    let name = &arg[..open];
    (is_valid_name(name) && !inner.is_empty()).then_some((name, inner))
}

/// Handle the unset builtin command
pub fn handle_unset(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let mut target = Target::Either;
    let mut rest = args;
    while let Some(arg) = rest.first() {
        match arg.as_str() {
            "--" => {
                rest = &rest[1..];
                break;
            }
            "-v" => target = Target::Variable,
            "-f" => target = Target::Function,
            a if a.starts_with('-') && a.len() > 1 => {
                return BuiltinResult::failure(
                    &format!("plush: unset: {}: invalid option\nunset: usage: unset [-f] [-v] [name ...]\n", a),
                    2,
                );
            }
            _ => break,
        }
        rest = &rest[1..];
    }

    let mut stderr = String::new();
    let mut exit_code = 0;

    for arg in rest {
        if target == Target::Function {
            interp.state.functions.remove(arg);
            continue;
        }

        if let Some((name, expr)) = split_element(arg) {
            let outcome = interp
                .resolve_index(name, expr)
                .and_then(|index| interp.state.vars.unset_element(name, index));
            if let Err(err) = outcome {
                stderr.push_str(&format!("plush: unset: {}\n", err));
                exit_code = 1;
            }
            continue;
        }

        if !is_valid_name(arg) {
            stderr.push_str(&format!("plush: unset: `{}': not a valid identifier\n", arg));
            exit_code = 1;
            continue;
        }

        if target == Target::Either
            && !interp.state.vars.contains(arg)
            && interp.state.functions.remove(arg)
        {
            continue;
        }
        match interp.state.vars.unset(arg) {
            Ok(()) => {
                if arg == "PATH" {
                    interp.state.command_cache.clear();
                }
            }
            Err(err) => {
                stderr.push_str(&format!("plush: unset: {}\n", err));
                exit_code = 1;
            }
        }
    }

    BuiltinResult {
        stdout: String::new(),
        stderr,
        exit_code,
    }
}
