//! trap - Set actions for signals
//!
//! trap                  - print current traps
//! trap -p [SIG ...]     - print traps, optionally only the named ones
//! trap -l               - list signal names
//! trap ACTION SIG ...   - run ACTION when SIG arrives
//! trap '' SIG ...       - ignore SIG
//! trap - SIG ...        - restore the default action
//!
//! `EXIT` (or 0) names the pseudo-signal run when the shell exits.

use crate::interpreter::builtins::{io_message, BuiltinResult};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::sys::Disposition;
use crate::interpreter::traps::{signal_list, signal_number, TrapAction};

fn print_traps(interp: &Interpreter, names: &[String]) -> BuiltinResult {
    let traps = &interp.state.traps;
    let mut stdout = String::new();
    let mut stderr = String::new();
    if names.is_empty() {
        for (signal, _) in traps.iter() {
            if let Some(line) = traps.format_entry(signal) {
                stdout.push_str(&line);
                stdout.push('\n');
            }
        }
    }
    for name in names {
        match signal_number(name) {
            Some(signal) => {
                if let Some(line) = traps.format_entry(signal) {
                    stdout.push_str(&line);
                    stdout.push('\n');
                }
            }
            None => stderr.push_str(&format!(
                "plush: trap: {}: invalid signal specification\n",
                name
            )),
        }
    }
    let exit_code = if stderr.is_empty() { 0 } else { 1 };
    BuiltinResult {
        stdout,
        stderr,
        exit_code,
    }
}

/// Disposition a signal returns to when its trap is removed.
fn default_disposition(interp: &Interpreter, signal: i32) -> Disposition {
    let shell_ignores = interp.state.options.interactive
        && !interp.state.in_subshell
        && (signal == libc::SIGINT || signal == libc::SIGQUIT);
    if shell_ignores {
        Disposition::Ignore
    } else {
        Disposition::Default
    }
}

pub fn handle_trap(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let args = match args.first().map(String::as_str) {
        Some("--") => &args[1..],
        _ => args,
    };
    match args.first().map(String::as_str) {
        None => return print_traps(interp, &[]),
        Some("-p") => return print_traps(interp, &args[1..]),
        Some("-l") => return BuiltinResult::output(format!("{}\n", signal_list())),
        _ => {}
    }

    // A lone signal operand resets that signal.
    let (action, signals) = if args.len() == 1 && signal_number(&args[0]).is_some() {
        ("-", args)
    } else {
        (args[0].as_str(), &args[1..])
    };

    let mut stderr = String::new();
    for spec in signals {
        let Some(signal) = signal_number(spec) else {
            stderr.push_str(&format!(
                "plush: trap: {}: invalid signal specification\n",
                spec
            ));
            continue;
        };
        let outcome = match action {
            "-" => {
                let disposition = default_disposition(interp, signal);
                interp.state.traps.reset(signal, disposition)
            }
            "" => interp.state.traps.set(signal, TrapAction::Ignore),
            text => interp
                .state
                .traps
                .set(signal, TrapAction::Command(text.to_string())),
        };
        if let Err(err) = outcome {
            stderr.push_str(&format!("plush: trap: {}: {}\n", spec, io_message(&err)));
        }
    }

    let exit_code = if stderr.is_empty() { 0 } else { 1 };
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
    use serial_test::serial;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    #[serial]
    fn test_trap_set_print_reset() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(handle_trap(&mut interp, &args(&["echo bye", "EXIT"])).exit_code, 0);
        assert_eq!(handle_trap(&mut interp, &args(&["", "USR2"])).exit_code, 0);
        assert_eq!(
            handle_trap(&mut interp, &[]).stdout,
            "trap -- 'echo bye' EXIT\ntrap -- '' USR2\n"
        );
        assert_eq!(
            handle_trap(&mut interp, &args(&["-p", "EXIT"])).stdout,
            "trap -- 'echo bye' EXIT\n"
        );

        handle_trap(&mut interp, &args(&["-", "USR2"]));
        handle_trap(&mut interp, &args(&["0"]));
        assert_eq!(handle_trap(&mut interp, &[]).stdout, "");
    }

    #[test]
    fn test_trap_invalid_signal() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let result = handle_trap(&mut interp, &args(&["echo", "NOPE"]));
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.stderr, "plush: trap: NOPE: invalid signal specification\n");
    }

    #[test]
    fn test_trap_list() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let listing = handle_trap(&mut interp, &args(&["-l"])).stdout;
        assert!(listing.contains(" 2) SIGINT"));
    }

    #[test]
    #[serial]
    fn test_exit_trap_runs() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.execute_text("trap 'RAN=yes' EXIT");
        interp.run_exit_trap();
        assert_eq!(interp.state.vars.get_scalar("RAN"), Some("yes"));
    }
}
