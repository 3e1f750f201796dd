//! alias, unalias - Manage the alias table
//!
//! alias                 - print every alias
//! alias name            - print one alias
//! alias name=value ...  - define aliases
//! unalias [-a] name ... - remove aliases (all with -a)
//!
//! Definitions take effect for input parsed after the current line.

use crate::interpreter::alias_expansion::is_valid_alias_name;
use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::interpreter::Interpreter;

pub fn handle_alias(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let args = match args.first().map(String::as_str) {
        Some("--") | Some("-p") => &args[1..],
        _ => args,
    };
    let aliases = &mut interp.state.aliases;

    if args.is_empty() {
        let stdout: String = aliases
            .iter()
            .filter_map(|(name, _)| aliases.format_entry(name))
            .map(|line| line + "\n")
            .collect();
        return BuiltinResult::output(stdout);
    }

    let mut stdout = String::new();
    let mut stderr = String::new();
    let mut exit_code = 0;
    for arg in args {
        match arg.split_once('=') {
            Some((name, value)) => {
                if !is_valid_alias_name(name) {
                    stderr.push_str(&format!("plush: alias: `{}': invalid alias name\n", name));
                    exit_code = 1;
                    continue;
                }
                aliases.insert(name, value);
            }
            None => match aliases.format_entry(arg) {
                Some(line) => {
                    stdout.push_str(&line);
                    stdout.push('\n');
                }
                None => {
                    stderr.push_str(&format!("plush: alias: {}: not found\n", arg));
                    exit_code = 1;
                }
            },
        }
    }
    BuiltinResult {
        stdout,
        stderr,
        exit_code,
    }
}

pub fn handle_unalias(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    if args.first().map(String::as_str) == Some("-a") {
        interp.state.aliases.clear();
        return BuiltinResult::ok();
    }
    let args = match args.first().map(String::as_str) {
        Some("--") => &args[1..],
        _ => args,
    };
    if args.is_empty() {
        return BuiltinResult::failure("unalias: usage: unalias [-a] name [name ...]\n", 2);
    }

    let mut stderr = String::new();
    for name in args {
        if !interp.state.aliases.remove(name) {
            stderr.push_str(&format!("plush: unalias: {}: not found\n", name));
        }
    }
    let exit_code = if stderr.is_empty() { 0 } else { 1 };
    BuiltinResult {
        stdout: String::new(),
        stderr,
        exit_code,
    }
}
