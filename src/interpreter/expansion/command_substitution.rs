//! Command Substitution
//!
//! `$(...)` and backticks run their text in a forked copy of the shell with
//! stdout connected to a pipe. The parent reads the pipe to end of file,
//! then waits for the child, so a child that writes more than a pipe buffer
//! never deadlocks. Trailing newlines are stripped from the captured text.

use log::debug;

use crate::interpreter::errors::{ExpansionError, ExpansionResult};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::sys::{self, ForkResult};

/// Resolve the backslash escapes that are special inside backticks.
pub fn unescape_backticks(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && matches!(chars.get(i + 1), Some('$') | Some('`') | Some('\\')) {
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

impl Interpreter {
    /// Run `command` in a subshell and return its standard output.
    pub fn command_substitution(&mut self, command: &str) -> ExpansionResult<String> {
        if self.state.subst_depth >= self.limits.max_subst_depth {
            return Err(ExpansionError::TooDeep(self.limits.max_subst_depth));
        }
        let (read_end, write_end) = sys::pipe()?;
        let pid = match sys::fork() {
            Ok(ForkResult::Child) => {
                sys::close(read_end);
                self.become_subshell(false);
                self.state.subst_depth += 1;
                let status = match sys::dup2(write_end, sys::STDOUT) {
                    Ok(()) => {
                        sys::close(write_end);
                        self.execute_text(command)
                    }
                    Err(err) => {
                        sys::print_err(&format!("plush: {}\n", err));
                        1
                    }
                };
                self.exit_subshell(status)
            }
            Ok(ForkResult::Parent(pid)) => pid,
            Err(err) => {
                sys::close(read_end);
                sys::close(write_end);
                return Err(err.into());
            }
        };
        sys::close(write_end);
        debug!("command substitution pid {}: {:?}", pid, command);

        let captured = sys::read_to_end(read_end);
        sys::close(read_end);
        let status = sys::wait_for(pid)?;
        self.state.last_subst_status = Some(status);

        let mut output = String::from_utf8_lossy(&captured?).into_owned();
        let trimmed = output.trim_end_matches('\n').len();
        output.truncate(trimmed);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_backticks() {
        let chars: Vec<char> = "echo \\$HOME \\` \\\\ \\n".chars().collect();
        assert_eq!(unescape_backticks(&chars), "echo $HOME ` \\ \\n");
    }
}
