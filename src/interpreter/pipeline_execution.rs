//! Pipeline Execution
//!
//! Handles execution of command pipelines (cmd1 | cmd2 | cmd3) and of the
//! simple commands inside them.
//!
//! A one-segment pipeline runs in the shell process: builtins, functions
//! and compound commands execute in place with saved descriptors, external
//! programs are forked and waited for. A multi-segment pipeline forks one
//! child per segment, wired together with pipes; each child expands and
//! runs its own segment, so builtins in a pipeline never touch the parent's
//! state.

use std::os::unix::io::RawFd;
use std::path::PathBuf;

use log::{debug, warn};

use crate::ast::types::{Assignment, AssignmentValue, Pipeline, PipelineSegment, Redirection};
use crate::interpreter::command_resolution::Resolved;
use crate::interpreter::errors::{ExecError, ExecResult, InterpreterError};
use crate::interpreter::helpers::xtrace::{trace_assignment, trace_command, DEFAULT_PS4};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::redirections::SavedFds;
use crate::interpreter::sys::{self, ForkResult};
use crate::interpreter::variables::ShellVariable;

/// Status of a whole pipeline from the status of each segment.
///
/// Without pipefail the last segment decides. With it, the first non-zero
/// status wins, except that a 127 anywhere forces 127.
pub fn pipeline_status(statuses: &[i32], pipefail: bool) -> i32 {
    if !pipefail {
        return statuses.last().copied().unwrap_or(0);
    }
    if statuses.contains(&127) {
        return 127;
    }
    statuses.iter().copied().find(|&s| s != 0).unwrap_or(0)
}

/// Bindings replaced by `NAME=value cmd`, restored after `cmd`.
type TempBindings = Vec<(String, Option<ShellVariable>)>;

impl Interpreter {
    pub fn execute_pipeline(&mut self, pipeline: &Pipeline) -> ExecResult<i32> {
        let mark = self.state.proc_substs.len();
        let result = match pipeline.segments.as_slice() {
            [] => Ok(vec![0]),
            [segment] => self.execute_segment(segment, false).map(|status| vec![status]),
            segments => self.execute_piped(segments, false),
        };
        self.join_process_substitutions(mark);
        self.finish_pipeline(result?)
    }

    /// Run `pipeline` from a background job's process. The last segment
    /// runs in this process, so an external command replaces it and the
    /// job's pid is the pid of that command.
    pub(crate) fn execute_pipeline_in_place(&mut self, pipeline: &Pipeline) -> ExecResult<i32> {
        let mark = self.state.proc_substs.len();
        let result = match pipeline.segments.as_slice() {
            [] => Ok(vec![0]),
            [segment] => self.execute_segment(segment, true).map(|status| vec![status]),
            segments => self.execute_piped(segments, true),
        };
        self.join_process_substitutions(mark);
        self.finish_pipeline(result?)
    }

    fn finish_pipeline(&mut self, statuses: Vec<i32>) -> ExecResult<i32> {
        let values = statuses.iter().map(ToString::to_string).collect();
        if let Err(err) = self.state.set_array("PIPESTATUS", values) {
            debug!("PIPESTATUS not updated: {}", err);
        }
        Ok(pipeline_status(&statuses, self.state.options.pipefail))
    }

    /// Fork one child per segment and wait for all of them in spawn order.
    /// With `last_in_place` the last segment runs in the calling process.
    fn execute_piped(&mut self, segments: &[PipelineSegment], last_in_place: bool) -> ExecResult<Vec<i32>> {
        let mut pids = Vec::with_capacity(segments.len());
        let mut previous_read: Option<RawFd> = None;
        let mut spawn_error = None;
        let mut last_status = None;

        for (i, segment) in segments.iter().enumerate() {
            if last_in_place && i + 1 == segments.len() {
                if let Some(fd) = previous_read.take() {
                    let _ = sys::dup2(fd, sys::STDIN);
                    sys::close(fd);
                }
                last_status = Some(match self.execute_segment(segment, true) {
                    Ok(status) => status,
                    Err(err) => self.report_error(&err),
                });
                break;
            }

            let next_pipe = if i + 1 < segments.len() {
                match sys::pipe() {
                    Ok(pipe) => Some(pipe),
                    Err(err) => {
                        spawn_error = Some(ExecError::sys("pipe", err));
                        break;
                    }
                }
            } else {
                None
            };

            match sys::fork() {
                Ok(ForkResult::Child) => {
                    self.become_subshell(false);
                    if let Some(fd) = previous_read {
                        let _ = sys::dup2(fd, sys::STDIN);
                        sys::close(fd);
                    }
                    if let Some((read, write)) = next_pipe {
                        sys::close(read);
                        let _ = sys::dup2(write, sys::STDOUT);
                        sys::close(write);
                    }
                    let status = match self.execute_segment(segment, true) {
                        Ok(status) => status,
                        Err(err) => self.report_error(&err),
                    };
                    self.exit_subshell(status)
                }
                Ok(ForkResult::Parent(pid)) => {
                    debug!("pipeline segment {} pid {}", i, pid);
                    pids.push(pid);
                }
                Err(err) => {
                    if let Some((read, write)) = next_pipe {
                        sys::close(read);
                        sys::close(write);
                    }
                    spawn_error = Some(ExecError::sys("fork", err));
                    break;
                }
            }

            if let Some(fd) = previous_read.take() {
                sys::close(fd);
            }
            if let Some((read, write)) = next_pipe {
                sys::close(write);
                previous_read = Some(read);
            }
        }
        if let Some(fd) = previous_read {
            sys::close(fd);
        }

        let mut statuses: Vec<i32> = pids
            .into_iter()
            .map(|pid| {
                sys::wait_for(pid).unwrap_or_else(|err| {
                    warn!("waitpid {}: {}", pid, err);
                    1
                })
            })
            .collect();
        statuses.extend(last_status);
        match spawn_error {
            Some(err) => Err(err.into()),
            None => Ok(statuses),
        }
    }

    /// Run one segment. `forked` is true inside a pipeline child, where an
    /// external command replaces the process instead of being forked again.
    fn execute_segment(&mut self, segment: &PipelineSegment, forked: bool) -> ExecResult<i32> {
        if segment.line > 0 {
            self.state.current_line = segment.line;
        }
        if let Some(compound) = &segment.compound {
            return self.run_redirected(&segment.redirections, |interp| interp.execute_command(compound));
        }

        self.state.last_subst_status = None;
        let argv = self.expand_words(&segment.words)?;

        if argv.is_empty() {
            for assignment in &segment.assignments {
                let value = self.perform_assignment(assignment)?;
                self.trace_assignment(&assignment.name, &value);
            }
            let status = self.state.last_subst_status.unwrap_or(0);
            return self.run_redirected(&segment.redirections, |_| Ok(status));
        }

        let resolved = self.resolve_command(&argv[0]);
        match resolved {
            Resolved::Builtin | Resolved::Function => {
                let saved = self.push_temp_assignments(&segment.assignments)?;
                self.trace_command(&argv);
                let is_function = resolved == Resolved::Function;
                let result = self.run_redirected(&segment.redirections, |interp| {
                    if is_function {
                        interp.call_function(&argv[0], &argv)
                    } else {
                        Ok(interp.run_builtin(&argv))
                    }
                });
                self.pop_temp_assignments(saved);
                result
            }
            Resolved::External(path) => self.run_external(segment, &argv, Some(path), forked),
            Resolved::NotFound => self.run_external(segment, &argv, None, forked),
        }
    }

    fn run_external(
        &mut self,
        segment: &PipelineSegment,
        argv: &[String],
        path: Option<PathBuf>,
        forked: bool,
    ) -> ExecResult<i32> {
        if forked {
            self.exec_segment(segment, argv, path)
        }
        match sys::fork().map_err(|err| ExecError::sys("fork", err))? {
            ForkResult::Child => {
                self.become_subshell(false);
                self.exec_segment(segment, argv, path)
            }
            ForkResult::Parent(pid) => {
                let status = sys::wait_for(pid).map_err(|err| ExecError::sys("waitpid", err))?;
                debug!("{} (pid {}) exited with {}", argv[0], pid, status);
                Ok(status)
            }
        }
    }

    /// Last step in a child: export the temporary assignments, apply the
    /// redirections and exec.
    fn exec_segment(&mut self, segment: &PipelineSegment, argv: &[String], path: Option<PathBuf>) -> ! {
        for assignment in &segment.assignments {
            if let Err(err) = self.perform_assignment(assignment) {
                let status = self.report_error(&err);
                sys::exit_now(status)
            }
            self.state.vars.export(&assignment.name);
        }
        self.trace_command(argv);
        if let Err(err) = self.apply_redirections(&segment.redirections, None) {
            let status = self.report_error(&err);
            sys::exit_now(status)
        }
        self.exec_external(&argv[0], path, argv)
    }

    /// Run `run` with `redirections` applied in the shell process, putting
    /// every descriptor back afterwards. A redirection failure is reported
    /// and becomes the status.
    fn run_redirected<F>(&mut self, redirections: &[Redirection], run: F) -> ExecResult<i32>
    where
        F: FnOnce(&mut Self) -> ExecResult<i32>,
    {
        if redirections.is_empty() {
            return run(self);
        }
        let mut saved = SavedFds::default();
        let result = match self.apply_redirections(redirections, Some(&mut saved)) {
            Ok(()) => run(self),
            Err(err) => self.segment_failure(err),
        };
        saved.restore();
        result
    }

    /// Exec and expansion failures inside a redirection degrade only this
    /// segment; anything else ends the chunk.
    fn segment_failure(&mut self, err: InterpreterError) -> ExecResult<i32> {
        match err {
            InterpreterError::Exec(_) | InterpreterError::Expansion(_) => Ok(self.report_error(&err)),
            other => Err(other),
        }
    }

    // =========================================================================
    // ASSIGNMENTS
    // =========================================================================

    /// Perform one assignment word and return the value for xtrace.
    pub(crate) fn perform_assignment(&mut self, assignment: &Assignment) -> ExecResult<String> {
        let name = assignment.name.as_str();
        let shown = match (&assignment.value, &assignment.index) {
            (AssignmentValue::Scalar(word), None) => {
                let value = self.expand_assignment_value(word)?;
                if assignment.append {
                    self.state.vars.append_scalar(name, &value)?;
                    self.state.after_assign(name);
                } else {
                    self.state.set_var(name, value.clone())?;
                }
                value
            }
            (AssignmentValue::Scalar(word), Some(subscript)) => {
                let index = self.resolve_index(name, subscript)?;
                let mut value = self.expand_assignment_value(word)?;
                let shown = value.clone();
                if assignment.append {
                    let current = self.state.vars.get_element(name, index).unwrap_or_default();
                    value = format!("{}{}", current, value);
                }
                self.state.set_var_element(name, index, value)?;
                shown
            }
            (AssignmentValue::Array(words), _) => {
                let values = self.expand_words(words)?;
                let shown = format!("({})", values.join(" "));
                if assignment.append {
                    self.state.vars.append_array(name, values)?;
                    self.state.after_assign(name);
                } else {
                    self.state.set_array(name, values)?;
                }
                shown
            }
        };
        Ok(shown)
    }

    /// Apply `NAME=value` prefixes for one in-process command, exported
    /// for its duration.
    fn push_temp_assignments(&mut self, assignments: &[Assignment]) -> ExecResult<TempBindings> {
        let mut saved = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            saved.push((assignment.name.clone(), self.state.vars.snapshot(&assignment.name)));
            match self.perform_assignment(assignment) {
                Ok(value) => self.trace_assignment(&assignment.name, &value),
                Err(err) => {
                    self.pop_temp_assignments(saved);
                    return Err(err);
                }
            }
            self.state.vars.export(&assignment.name);
        }
        Ok(saved)
    }

    fn pop_temp_assignments(&mut self, saved: TempBindings) {
        for (name, binding) in saved.into_iter().rev() {
            self.state.vars.restore(&name, binding);
            if name == "PATH" {
                self.state.command_cache.clear();
            }
        }
    }

    // =========================================================================
    // XTRACE
    // =========================================================================

    fn xtrace_prefix(&self) -> Option<String> {
        self.state.options.xtrace.then(|| {
            self.state
                .vars
                .get_scalar("PS4")
                .unwrap_or(DEFAULT_PS4)
                .to_string()
        })
    }

    fn trace_command(&self, argv: &[String]) {
        if let Some(prefix) = self.xtrace_prefix() {
            sys::print_err(&trace_command(&prefix, argv));
        }
    }

    fn trace_assignment(&self, name: &str, value: &str) {
        if let Some(prefix) = self.xtrace_prefix() {
            sys::print_err(&trace_assignment(&prefix, name, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn interp() -> Interpreter {
        Interpreter::new(ShellOptions::default(), "plush")
    }

    fn var(interp: &Interpreter, name: &str) -> Option<String> {
        interp.state.vars.get_scalar(name).map(str::to_string)
    }

    #[test]
    fn test_pipeline_status() {
        assert_eq!(pipeline_status(&[1, 0], false), 0);
        assert_eq!(pipeline_status(&[0, 1], false), 1);
        assert_eq!(pipeline_status(&[0, 2, 3], true), 2);
        assert_eq!(pipeline_status(&[1, 127, 0], true), 127);
        assert_eq!(pipeline_status(&[0, 0], true), 0);
        assert_eq!(pipeline_status(&[], false), 0);
    }

    #[test]
    fn test_assignment_only() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("A=1 B=two"), 0);
        assert_eq!(var(&interp, "A").as_deref(), Some("1"));
        assert_eq!(var(&interp, "B").as_deref(), Some("two"));
        assert_eq!(interp.execute_text("A+=23"), 0);
        assert_eq!(var(&interp, "A").as_deref(), Some("123"));
        interp.execute_text("L=(x y); L+=(z); L[5]=w");
        assert_eq!(interp.state.vars.get_element("L", 2), Some("z"));
        assert_eq!(interp.state.vars.get_element("L", 5), Some("w"));
    }

    #[test]
    #[serial]
    fn test_assignment_status_from_substitution() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("X=$(exit 3)"), 3);
        assert_eq!(interp.execute_text("X=plain"), 0);
    }

    #[test]
    fn test_temporary_assignment_restored() {
        let mut interp = interp();
        interp.execute_text("V=keep; f() { SEEN=$V; }");
        assert_eq!(interp.execute_text("V=temp f"), 0);
        assert_eq!(var(&interp, "SEEN").as_deref(), Some("temp"));
        assert_eq!(var(&interp, "V").as_deref(), Some("keep"));
        assert!(!interp.state.vars.is_exported("V"));
    }

    #[test]
    #[serial]
    fn test_command_not_found() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("nosuchcmd123 2>/dev/null"), 127);
        assert_eq!(interp.execute_text("nosuchcmd123 2>/dev/null; echo >/dev/null"), 0);
    }

    #[test]
    #[serial]
    fn test_pipelines_and_pipestatus() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("false | true"), 0);
        assert_eq!(interp.state.vars.get_element("PIPESTATUS", 0), Some("1"));
        assert_eq!(interp.state.vars.get_element("PIPESTATUS", 1), Some("0"));
        interp.state.options.pipefail = true;
        assert_eq!(interp.execute_text("false | true"), 1);
    }

    #[test]
    #[serial]
    fn test_builtin_in_pipeline_runs_in_child() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("X=1; X=2 | true; Y=3 | true"), 0);
        assert_eq!(var(&interp, "X").as_deref(), Some("1"));
        assert_eq!(var(&interp, "Y"), None);
    }

    #[test]
    #[serial]
    fn test_redirected_group_restores_fds() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut interp = interp();
        interp.state.set_var("OUT", out.display().to_string()).unwrap();
        assert_eq!(interp.execute_text("{ echo one; echo two; } > $OUT"), 0);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "one\ntwo\n");
        assert_eq!(interp.execute_text("for w in a b; do echo $w; done | cat >> $OUT"), 0);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "one\ntwo\na\nb\n");
    }

    #[test]
    #[serial]
    fn test_redirection_failure_degrades_segment() {
        let mut interp = interp();
        assert_eq!(interp.execute_text("echo hi < /nonexistent/input 2>/dev/null"), 1);
        assert_eq!(interp.execute_text("echo hi >/dev/null"), 0);
    }
}
