//! break - Exit from loops builtin

use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::types::ControlSignal;

/// Validate a `break`/`continue` count and clamp it to the loop nesting.
///
/// Returns `Ok(None)` outside any loop, where both builtins do nothing.
pub(crate) fn loop_levels(name: &str, interp: &Interpreter, args: &[String]) -> Result<Option<u32>, BuiltinResult> {
    if args.len() > 1 {
        return Err(BuiltinResult::failure(
            &format!("plush: {}: too many arguments\n", name),
            1,
        ));
    }
    let levels = match args.first() {
        None => 1,
        Some(arg) => match arg.parse::<i64>() {
            Ok(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
            Ok(_) => {
                return Err(BuiltinResult::failure(
                    &format!("plush: {}: {}: loop count out of range\n", name, arg),
                    1,
                ))
            }
            Err(_) => {
                return Err(BuiltinResult::failure(
                    &format!("plush: {}: {}: numeric argument required\n", name, arg),
                    1,
                ))
            }
        },
    };
    if interp.state.loop_depth == 0 {
        return Ok(None);
    }
    Ok(Some(levels.min(interp.state.loop_depth)))
}

/// Handle the break builtin command.
///
/// # Arguments
/// * `interp` - The interpreter
/// * `args` - Optional loop count
pub fn handle_break(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    match loop_levels("break", interp, args) {
        Ok(Some(levels)) => {
            interp.state.pending = Some(ControlSignal::Break(levels));
            BuiltinResult::ok()
        }
        Ok(None) => BuiltinResult::ok(),
        Err(result) => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;

    fn make_interp(loop_depth: u32) -> Interpreter {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.state.loop_depth = loop_depth;
        interp
    }

    #[test]
    fn test_break_outside_loop() {
        let mut interp = make_interp(0);
        let result = handle_break(&mut interp, &[]);
        assert_eq!(result.exit_code, 0);
        assert_eq!(interp.state.pending, None);
    }

    #[test]
    fn test_break_default_level() {
        let mut interp = make_interp(2);
        handle_break(&mut interp, &[]);
        assert_eq!(interp.state.pending, Some(ControlSignal::Break(1)));
    }

    #[test]
    fn test_break_clamped_to_depth() {
        let mut interp = make_interp(2);
        handle_break(&mut interp, &["5".to_string()]);
        assert_eq!(interp.state.pending, Some(ControlSignal::Break(2)));
    }

    #[test]
    fn test_break_bad_arguments() {
        let mut interp = make_interp(1);
        let result = handle_break(&mut interp, &["0".to_string()]);
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("loop count out of range"));
        let result = handle_break(&mut interp, &["x".to_string()]);
        assert!(result.stderr.contains("numeric argument required"));
        let result = handle_break(&mut interp, &["1".to_string(), "2".to_string()]);
        assert!(result.stderr.contains("too many arguments"));
        assert_eq!(interp.state.pending, None);
    }
}
