//! Input driver
//!
//! Feeds the interpreter one logical chunk at a time. Lines are collected
//! until they parse; a chunk that is still open (`if` without `fi`, an
//! unterminated quote, a here-document body) waits for more lines, shown
//! with `PS2` at the terminal. Interactive input goes through `rustyline`,
//! scripts are read line by line so an alias defined on one line applies
//! to the next, and non-terminal stdin is read unbuffered so commands that
//! read stdin see the rest of it.

use std::path::Path;

use log::{debug, warn};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::config::{ConfigError, Input, ShellConfig};
use crate::interpreter::sys;
use crate::interpreter::Interpreter;

const DEFAULT_PS1: &str = "$ ";
const DEFAULT_PS2: &str = "> ";

pub struct Shell {
    interp: Interpreter,
    input: Input,
    /// Lines of the chunk being collected
    buffer: String,
}

impl Shell {
    pub fn new(config: &ShellConfig) -> Result<Self, ConfigError> {
        let mut options = config.options()?;
        let input = config.input();
        if input == Input::Stdin && sys::isatty(sys::STDIN) {
            options.interactive = true;
        }
        let mut interp = Interpreter::with_limits(options, config.script_name(), config.limits()?);
        interp.state.positional = config.args.clone();
        interp.initialize_from_system();
        Ok(Self::with_interpreter(interp, input))
    }

    pub fn with_interpreter(interp: Interpreter, input: Input) -> Self {
        Self {
            interp,
            input,
            buffer: String::new(),
        }
    }

    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.interp
    }

    /// Run the configured input to completion and return the exit status.
    pub fn run(&mut self) -> i32 {
        let status = match self.input.clone() {
            Input::Command(text) => self.run_command(&text),
            Input::Script(path) => self.run_script(&path),
            Input::Stdin if self.interp.state.options.interactive => self.run_interactive(),
            Input::Stdin => self.run_stream(sys::STDIN),
        };
        self.finish(status)
    }

    fn run_command(&mut self, text: &str) -> i32 {
        if self.interp.state.options.verbose {
            sys::print_err(&format!("{}\n", text));
        }
        self.interp.execute_text(text)
    }

    fn run_script(&mut self, path: &Path) -> i32 {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                sys::print_err(&format!(
                    "plush: {}: {}\n",
                    path.display(),
                    crate::interpreter::builtins::io_message(&err)
                ));
                return 127;
            }
        };
        debug!("running script {}", path.display());
        for line in text.lines() {
            self.feed_line(line);
            if self.interp.exit_requested().is_some() {
                return self.interp.state.last_exit_code;
            }
        }
        self.flush_incomplete();
        self.interp.state.last_exit_code
    }

    fn run_stream(&mut self, fd: i32) -> i32 {
        loop {
            self.interp.run_pending_traps();
            match sys::read_line(fd) {
                Ok(Some(line)) => {
                    self.feed_line(&line);
                    if self.interp.exit_requested().is_some() {
                        break;
                    }
                }
                Ok(None) => {
                    self.flush_incomplete();
                    break;
                }
                Err(err) => {
                    sys::print_err(&format!("plush: read error: {}\n", err));
                    break;
                }
            }
        }
        self.interp.state.last_exit_code
    }

    fn run_interactive(&mut self) -> i32 {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(err) => {
                warn!("line editor unavailable ({}), reading stdin directly", err);
                return self.run_stream(sys::STDIN);
            }
        };
        loop {
            self.interp.run_pending_traps();
            self.notify_jobs();
            let prompt = self.prompt();
            match editor.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = editor.add_history_entry(line.as_str());
                    }
                    self.feed_line(&line);
                    if self.interp.exit_requested().is_some() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    self.buffer.clear();
                    self.interp.state.last_exit_code = 130;
                }
                Err(ReadlineError::Eof) => {
                    self.flush_incomplete();
                    sys::print_err("exit\n");
                    break;
                }
                Err(err) => {
                    sys::print_err(&format!("plush: {}\n", err));
                    break;
                }
            }
        }
        self.interp.state.last_exit_code
    }

    /// Add one line to the pending chunk and run the chunk once it parses.
    /// Returns the chunk's status, or `None` while more input is needed.
    pub fn feed_line(&mut self, line: &str) -> Option<i32> {
        if self.interp.state.options.verbose {
            sys::print_err(&format!("{}\n", line));
        }
        self.buffer.push_str(line);
        self.buffer.push('\n');
        match self.interp.parse(&self.buffer) {
            Err(err) if err.is_incomplete() => None,
            Ok(list) => {
                self.buffer.clear();
                Some(self.interp.run_list(&list))
            }
            Err(err) => {
                self.buffer.clear();
                Some(self.interp.report_error(&err.into()))
            }
        }
    }

    /// End of input inside an open chunk is a syntax error.
    fn flush_incomplete(&mut self) {
        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return;
        }
        let text = std::mem::take(&mut self.buffer);
        if let Err(err) = self.interp.parse(&text) {
            self.interp.report_error(&err.into());
        }
    }

    fn prompt(&mut self) -> String {
        let (name, default) = if self.buffer.is_empty() {
            ("PS1", DEFAULT_PS1)
        } else {
            ("PS2", DEFAULT_PS2)
        };
        let raw = self
            .interp
            .state
            .vars
            .get_scalar(name)
            .unwrap_or(default)
            .to_string();
        let saved = self.interp.state.last_exit_code;
        let prompt = self.interp.expand_heredoc(&raw).unwrap_or(raw);
        self.interp.state.last_exit_code = saved;
        prompt
    }

    /// Report background jobs that finished since the last prompt.
    fn notify_jobs(&mut self) {
        let jobs = &mut self.interp.state.jobs;
        jobs.reap();
        for job in jobs.take_finished() {
            sys::print_err(&format!("{}\n", job.describe(false)));
        }
    }

    /// Run the `EXIT` trap and settle the final status.
    pub fn finish(&mut self, status: i32) -> i32 {
        let status = self.interp.exit_requested().unwrap_or(status);
        self.interp.state.last_exit_code = status;
        self.interp.run_exit_trap();
        self.interp.exit_requested().unwrap_or(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn shell(input: Input) -> Shell {
        Shell::with_interpreter(Interpreter::new(ShellOptions::default(), "plush"), input)
    }

    #[test]
    fn test_feed_line_waits_for_complete_chunk() {
        let mut shell = shell(Input::Stdin);
        assert_eq!(shell.feed_line("if true; then"), None);
        assert_eq!(shell.feed_line("  X=1"), None);
        assert_eq!(shell.feed_line("fi"), Some(0));
        assert_eq!(shell.interpreter().state.vars.get_scalar("X"), Some("1"));
    }

    #[test]
    fn test_backslash_continuation() {
        let mut shell = shell(Input::Stdin);
        assert_eq!(shell.feed_line("JOINED=a\\"), None);
        assert_eq!(shell.feed_line("b"), Some(0));
        assert_eq!(shell.interpreter().state.vars.get_scalar("JOINED"), Some("ab"));
    }

    #[test]
    fn test_feed_line_syntax_error_resets() {
        let mut shell = shell(Input::Stdin);
        assert_eq!(shell.feed_line("fi"), Some(2));
        assert_eq!(shell.feed_line("true"), Some(0));
    }

    #[test]
    fn test_alias_applies_to_following_lines() {
        let mut shell = shell(Input::Stdin);
        assert_eq!(shell.feed_line("alias setv='V=aliased'"), Some(0));
        assert_eq!(shell.feed_line("setv"), Some(0));
        assert_eq!(shell.interpreter().state.vars.get_scalar("V"), Some("aliased"));
    }

    #[test]
    fn test_here_document_across_lines() {
        let mut shell = shell(Input::Stdin);
        assert_eq!(shell.feed_line("cat <<EOF >/dev/null"), None);
        assert_eq!(shell.feed_line("body"), None);
        assert_eq!(shell.feed_line("EOF"), Some(0));
    }

    #[test]
    #[serial]
    fn test_script_runs_line_by_line() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("s.sh");
        std::fs::write(&script, "A=1\nfor i in 1 2; do\n  A=$((A+i))\ndone\nexit $A\nA=never\n").unwrap();
        let mut shell = shell(Input::Script(script));
        assert_eq!(shell.run(), 4);
    }

    #[test]
    fn test_missing_script() {
        let mut shell = shell(Input::Script("/nonexistent/script.sh".into()));
        assert_eq!(shell.run(), 127);
    }

    #[test]
    fn test_exit_trap_runs_on_finish() {
        let mut shell = shell(Input::Command("trap 'T=ran' EXIT; exit 5".into()));
        assert_eq!(shell.run(), 5);
        assert_eq!(shell.interpreter().state.vars.get_scalar("T"), Some("ran"));
    }
}
