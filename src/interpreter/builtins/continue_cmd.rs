//! continue - Skip to next loop iteration builtin

use crate::interpreter::builtins::break_cmd::loop_levels;
use crate::interpreter::builtins::BuiltinResult;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::types::ControlSignal;

pub fn handle_continue(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    match loop_levels("continue", interp, args) {
        Ok(Some(levels)) => {
            interp.state.pending = Some(ControlSignal::Continue(levels));
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

    #[test]
    fn test_continue_levels() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.state.loop_depth = 3;
        handle_continue(&mut interp, &["2".to_string()]);
        assert_eq!(interp.state.pending, Some(ControlSignal::Continue(2)));
    }

    #[test]
    fn test_continue_outside_loop() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(handle_continue(&mut interp, &[]).exit_code, 0);
        assert_eq!(interp.state.pending, None);
    }
}
