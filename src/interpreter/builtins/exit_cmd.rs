//! exit - Exit shell builtin

use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::types::ControlSignal;

/// Handle the exit builtin command.
///
/// Requests termination through the pending control signal; the read loop
/// (or the subshell wrapper) performs the actual exit after running the
/// `EXIT` trap. Exit codes wrap modulo 256.
pub fn handle_exit(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let (exit_code, stderr) = match args.first() {
        None => (interp.state.last_exit_code, String::new()),
        Some(arg) => match arg.trim().parse::<i64>() {
            Ok(parsed) => (parsed.rem_euclid(256) as i32, String::new()),
            Err(_) => (2, format!("plush: exit: {}: numeric argument required\n", arg)),
        },
    };
    if args.len() > 1 && stderr.is_empty() {
        return BuiltinResult::failure("plush: exit: too many arguments\n", 1);
    }
    interp.state.pending = Some(ControlSignal::Exit(exit_code));
    BuiltinResult {
        stdout: String::new(),
        stderr,
        exit_code,
    }
}
