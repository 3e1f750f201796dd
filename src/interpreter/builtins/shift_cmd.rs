//! shift - Shift positional parameters
//!
//! shift [n]
//!
//! Shifts positional parameters to the left by n (default 1).
//! $n+1 becomes $1, $n+2 becomes $2, etc.

use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::interpreter::Interpreter;

/// Handle the shift builtin command.
///
/// # Arguments
/// * `interp` - The interpreter
/// * `args` - Optional shift count
pub fn handle_shift(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    if args.len() > 1 {
        return BuiltinResult::failure("plush: shift: too many arguments\n", 1);
    }
    let count = match args.first() {
        None => 1,
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) => n,
            Err(_) => {
                return BuiltinResult::failure(
                    &format!("plush: shift: {}: numeric argument required\n", arg),
                    1,
                )
            }
        },
    };

    let positional = &mut interp.state.positional;
    if count > positional.len() {
        return BuiltinResult::failure("plush: shift: shift count out of range\n", 1);
    }
    positional.drain(..count);
    BuiltinResult::ok()
}
