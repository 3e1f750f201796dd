//! export, readonly - Variable attribute builtins
//!
//! Usage:
//!   export [-p]         - List exported variables
//!   export NAME=value   - Set and export variable
//!   export NAME+=value  - Append value and export variable
//!   export NAME         - Export existing variable (or create empty)
//!   export -n NAME      - Remove the export attribute, keep the value
//!   readonly [-p]       - List readonly variables
//!   readonly NAME[=value]

use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::expansion::parameter_ops::quote_value;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::types::InterpreterState;
use crate::parser::types::is_valid_name;

/// One `NAME`, `NAME=value` or `NAME+=value` operand.
struct Operand<'a> {
    name: &'a str,
    value: Option<&'a str>,
    append: bool,
}

fn parse_operand(arg: &str) -> Option<Operand<'_>> {
    let operand = match arg.find('=') {
        Some(eq) if arg[..eq].ends_with('+') => Operand {
            name: &arg[..eq - 1],
            value: Some(&arg[eq + 1..]),
            append: true,
        },
        Some(eq) => Operand {
            name: &arg[..eq],
            value: Some(&arg[eq + 1..]),
            append: false,
        },
        None => Operand {
            name: arg,
            value: None,
            append: false,
        },
    };
    is_valid_name(operand.name).then_some(operand)
}

fn assign(state: &mut InterpreterState, operand: &Operand) -> Result<(), String> {
    let Some(value) = operand.value else {
        return Ok(());
    };
    let result = if operand.append {
        let current = state.vars.get_scalar(operand.name).unwrap_or_default().to_string();
        state.set_var(operand.name, current + value)
    } else {
        state.set_var(operand.name, value)
    };
    result.map_err(|err| err.to_string())
}

/// Split leading option words from operands.
fn split_options<'a>(args: &'a [String], allowed: &str) -> Result<(String, &'a [String]), String> {
    let mut flags = String::new();
    let mut rest = args;
    while let Some(arg) = rest.first() {
        if arg == "--" {
            rest = &rest[1..];
            break;
        }
        let Some(letters) = arg.strip_prefix('-').filter(|l| !l.is_empty()) else {
            break;
        };
        if let Some(bad) = letters.chars().find(|c| !allowed.contains(*c)) {
            return Err(format!("-{}", bad));
        }
        flags.push_str(letters);
        rest = &rest[1..];
    }
    Ok((flags, rest))
}

/// Handle the export builtin command.
///
/// # Arguments
/// * `interp` - The interpreter
/// * `args` - Options and `NAME[=value]` operands
pub fn handle_export(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let (flags, operands) = match split_options(args, "np") {
        Ok(split) => split,
        Err(bad) => {
            return BuiltinResult::failure(
                &format!("plush: export: {}: invalid option\nexport: usage: export [-n] [-p] [name[=value] ...]\n", bad),
                2,
            )
        }
    };
    let unexport = flags.contains('n');

    if operands.is_empty() && !unexport {
        let vars = &interp.state.vars;
        let mut stdout = String::new();
        for (name, value) in vars.exported_pairs() {
            stdout.push_str(&format!("export {}={}\n", name, quote_value(&value)));
        }
        return BuiltinResult::output(stdout);
    }

    let mut stderr = String::new();
    let mut exit_code = 0;
    for arg in operands {
        let Some(operand) = parse_operand(arg) else {
            stderr.push_str(&format!("plush: export: `{}': not a valid identifier\n", arg));
            exit_code = 1;
            continue;
        };
        if let Err(err) = assign(&mut interp.state, &operand) {
            stderr.push_str(&format!("plush: export: {}\n", err));
            exit_code = 1;
            continue;
        }
        if unexport {
            interp.state.vars.unexport(operand.name);
        } else {
            interp.state.vars.export(operand.name);
        }
    }

    BuiltinResult {
        stdout: String::new(),
        stderr,
        exit_code,
    }
}

/// Handle the readonly builtin command.
pub fn handle_readonly(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let operands = match split_options(args, "p") {
        Ok((_, operands)) => operands,
        Err(bad) => {
            return BuiltinResult::failure(
                &format!("plush: readonly: {}: invalid option\nreadonly: usage: readonly [-p] [name[=value] ...]\n", bad),
                2,
            )
        }
    };

    if operands.is_empty() {
        let vars = &interp.state.vars;
        let mut stdout = String::new();
        for name in vars.readonly_names() {
            match vars.get_scalar(&name) {
                Some(value) => stdout.push_str(&format!("readonly {}={}\n", name, quote_value(value))),
                None => stdout.push_str(&format!("readonly {}\n", name)),
            }
        }
        return BuiltinResult::output(stdout);
    }

    let mut stderr = String::new();
    let mut exit_code = 0;
    for arg in operands {
        let Some(operand) = parse_operand(arg) else {
            stderr.push_str(&format!("plush: readonly: `{}': not a valid identifier\n", arg));
            exit_code = 1;
            continue;
        };
        if let Err(err) = assign(&mut interp.state, &operand) {
            stderr.push_str(&format!("plush: readonly: {}\n", err));
            exit_code = 1;
            continue;
        }
        interp.state.vars.mark_readonly(operand.name);
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

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn make_interp() -> Interpreter {
        Interpreter::new(ShellOptions::default(), "plush")
    }

    #[test]
    fn test_export_set_and_export() {
        let mut interp = make_interp();
        let result = handle_export(&mut interp, &args(&["FOO=bar"]));
        assert_eq!(result.exit_code, 0);
        assert_eq!(interp.state.vars.get_scalar("FOO"), Some("bar"));
        assert!(interp.state.vars.is_exported("FOO"));
    }

    #[test]
    fn test_export_append_and_existing() {
        let mut interp = make_interp();
        interp.state.set_var("P", "/bin").unwrap();
        handle_export(&mut interp, &args(&["P+=:/usr/bin", "Q"]));
        assert_eq!(interp.state.vars.get_scalar("P"), Some("/bin:/usr/bin"));
        assert!(interp.state.vars.is_exported("P"));
        assert!(interp.state.vars.is_exported("Q"));
    }

    #[test]
    fn test_export_unexport_and_list() {
        let mut interp = make_interp();
        handle_export(&mut interp, &args(&["A=it's", "B=2"]));
        handle_export(&mut interp, &args(&["-n", "B"]));
        assert!(!interp.state.vars.is_exported("B"));
        assert_eq!(interp.state.vars.get_scalar("B"), Some("2"));
        let listing = handle_export(&mut interp, &args(&["-p"])).stdout;
        assert_eq!(listing, "export A='it'\\''s'\n");
    }

    #[test]
    fn test_export_invalid() {
        let mut interp = make_interp();
        let result = handle_export(&mut interp, &args(&["1X=y", "OK=1"]));
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("`1X=y': not a valid identifier"));
        assert_eq!(interp.state.vars.get_scalar("OK"), Some("1"));
        assert_eq!(handle_export(&mut interp, &args(&["-z"])).exit_code, 2);
    }

    #[test]
    fn test_readonly() {
        let mut interp = make_interp();
        assert_eq!(handle_readonly(&mut interp, &args(&["R=1"])).exit_code, 0);
        assert!(interp.state.set_var("R", "2").is_err());
        let result = handle_readonly(&mut interp, &args(&["R=3"]));
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "plush: readonly: R: readonly variable\n");
        assert_eq!(handle_readonly(&mut interp, &[]).stdout, "readonly R='1'\n");
    }
}
