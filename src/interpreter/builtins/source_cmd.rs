//! source/. - Execute commands from a file in the current environment
//!
//! source filename [arguments]
//!
//! A name without a slash is looked up on PATH first, then in the current
//! directory. Extra arguments replace the positional parameters for the
//! duration of the file. `return` inside the file ends it early.

use std::path::PathBuf;

use crate::interpreter::builtins::{io_message, BuiltinResult};
use crate::interpreter::command_resolution::search_path;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::types::ControlSignal;

pub fn handle_source(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let args = match args.first().map(String::as_str) {
        Some("--") => &args[1..],
        _ => args,
    };
    let Some(filename) = args.first() else {
        return BuiltinResult::failure(
            "plush: source: filename argument required\nsource: usage: source filename [arguments]\n",
            2,
        );
    };

    let path = locate(interp, filename);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) => {
            return BuiltinResult::failure(
                &format!("plush: {}: {}\n", filename, io_message(&err)),
                1,
            )
        }
    };

    if interp.state.subst_depth >= interp.limits.max_subst_depth {
        return BuiltinResult::failure(
            &format!(
                "plush: source: {}: nesting exceeds {} levels\n",
                filename, interp.limits.max_subst_depth
            ),
            1,
        );
    }

    let saved_positional = if args.len() > 1 {
        Some(std::mem::replace(
            &mut interp.state.positional,
            args[1..].to_vec(),
        ))
    } else {
        None
    };
    interp.state.source_depth += 1;
    interp.state.subst_depth += 1;

    let status = interp.execute_text(&text);

    interp.state.subst_depth -= 1;
    interp.state.source_depth -= 1;
    if let Some(positional) = saved_positional {
        interp.state.positional = positional;
    }
    if interp.state.pending == Some(ControlSignal::Return) {
        interp.state.pending = None;
    }
    BuiltinResult::status(status)
}

fn locate(interp: &Interpreter, filename: &str) -> PathBuf {
    if !filename.contains('/') {
        let path_var = interp.state.vars.get_scalar("PATH").unwrap_or("");
        if let Some(found) = search_path(path_var, filename) {
            return found;
        }
    }
    PathBuf::from(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;

    fn script(text: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), text).unwrap();
        file
    }

    #[test]
    fn test_source_sets_variables() {
        let file = script("A=1\nB=$((A + 1))\n");
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let result = handle_source(&mut interp, &[file.path().display().to_string()]);
        assert_eq!(result.exit_code, 0);
        assert_eq!(interp.state.vars.get_scalar("B"), Some("2"));
        assert_eq!(interp.state.source_depth, 0);
    }

    #[test]
    fn test_source_return_and_positional() {
        let file = script("R=$1\nreturn 4\nR=unreached\n");
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.state.positional = vec!["outer".to_string()];
        let result = handle_source(
            &mut interp,
            &[file.path().display().to_string(), "inner".to_string()],
        );
        assert_eq!(result.exit_code, 4);
        assert_eq!(interp.state.vars.get_scalar("R"), Some("inner"));
        assert_eq!(interp.state.positional, vec!["outer".to_string()]);
        assert_eq!(interp.state.pending, None);
    }

    #[test]
    fn test_source_errors() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(handle_source(&mut interp, &[]).exit_code, 2);
        let result = handle_source(&mut interp, &["/nonexistent/file".to_string()]);
        assert_eq!(result.exit_code, 1);
        assert!(result.stderr.contains("No such file or directory"));
    }
}
