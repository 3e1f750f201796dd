//! Execution Engine
//!
//! Walks command lists and compound commands:
//!
//! execute_list -> execute_entry -> execute_command -> execute_pipeline
//!
//! Control flow requested by builtins (`break`, `continue`, `return`,
//! `exit`) arrives through `state.pending`; a list stops at the first
//! statement that leaves a signal pending, and loops consume the
//! break/continue levels addressed to them.

use std::time::{Duration, Instant};

use log::debug;

use crate::ast::types::{
    ArithCommand, CaseCommand, CaseTerminator, Command, CommandList, ForArithCommand, ForCommand,
    IfCommand, ListEntry, ListOperator, LoopCommand,
};
use crate::interpreter::errors::{ExecError, ExecResult};
use crate::interpreter::expansion::pattern::pattern_matches;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::sys::{self, ForkResult};
use crate::interpreter::types::ControlSignal;

/// What a loop does after its body (or condition) ran.
enum LoopFlow {
    Next,
    Exit,
}

const DEFAULT_PS3: &str = "#? ";
/// Finished jobs a non-interactive shell keeps for `wait`.
const MAX_FINISHED_JOBS: usize = 64;

impl Interpreter {
    /// Run every entry of `list`, honouring `&&`/`||`, and return the status
    /// of the last entry that ran.
    pub fn execute_list(&mut self, list: &CommandList) -> ExecResult<i32> {
        let mut status = 0;
        let mut previous = ListOperator::None;
        for entry in &list.entries {
            let run = match previous {
                ListOperator::And => status == 0,
                ListOperator::Or => status != 0,
                ListOperator::Seq | ListOperator::None => true,
            };
            previous = entry.op;
            if !run {
                continue;
            }

            self.state.current_line = entry.line;
            status = self.execute_entry(entry)?;
            self.state.last_exit_code = status;

            if self.errexit_applies(entry, status) {
                debug!("errexit: status {} at line {}", status, entry.line);
                self.state.pending = Some(ControlSignal::Exit(status));
            }
            self.run_pending_traps();
            self.reap_jobs();
            if self.state.pending.is_some() {
                break;
            }
        }
        Ok(status)
    }

    /// Collect finished background jobs so they do not linger as zombies.
    /// An interactive shell reports them at the next prompt.
    fn reap_jobs(&mut self) {
        if self.state.jobs.is_empty() {
            return;
        }
        self.state.jobs.reap();
        if !self.state.options.interactive {
            self.state.jobs.forget_finished(MAX_FINISHED_JOBS);
        }
    }

    fn errexit_applies(&self, entry: &ListEntry, status: i32) -> bool {
        self.state.options.errexit
            && status != 0
            && !entry.background
            && !entry.negated
            && !self.state.in_condition
            && !matches!(entry.op, ListOperator::And | ListOperator::Or)
            && self.state.pending.is_none()
    }

    fn execute_entry(&mut self, entry: &ListEntry) -> ExecResult<i32> {
        if entry.background {
            return self.launch_background(entry);
        }

        let started = entry.timed.then(|| (Instant::now(), sys::cpu_times()));
        let exempt = entry.negated || matches!(entry.op, ListOperator::And | ListOperator::Or);
        let saved_condition = self.state.in_condition;
        self.state.in_condition |= exempt;
        let result = self.execute_command(&entry.command);
        self.state.in_condition = saved_condition;
        let status = result?;

        if let Some((wall, (user, system))) = started {
            let (user_now, system_now) = sys::cpu_times();
            sys::print_err(&format_times(
                wall.elapsed(),
                user_now.saturating_sub(user),
                system_now.saturating_sub(system),
            ));
        }

        Ok(match (entry.negated, status) {
            (true, 0) => 1,
            (true, _) => 0,
            (false, status) => status,
        })
    }

    /// Fork `entry` as a job. A pipeline's last segment runs in the job's
    /// own process, so the recorded pid is that of the last command.
    fn launch_background(&mut self, entry: &ListEntry) -> ExecResult<i32> {
        match sys::fork().map_err(|err| ExecError::sys("fork", err))? {
            ForkResult::Child => {
                self.become_subshell(true);
                if let Ok(fd) = sys::open(std::path::Path::new("/dev/null"), libc::O_RDONLY, 0) {
                    let _ = sys::dup2(fd, sys::STDIN);
                    sys::close(fd);
                }
                let result = match &entry.command {
                    Command::Pipeline(pipeline) if !entry.negated => {
                        self.execute_pipeline_in_place(pipeline)
                    }
                    command => self.execute_command(command),
                };
                let status = match result {
                    Ok(status) => status,
                    Err(err) => self.report_error(&err),
                };
                let status = match (entry.negated, status) {
                    (true, 0) => 1,
                    (true, _) => 0,
                    (false, status) => status,
                };
                self.exit_subshell(status)
            }
            ForkResult::Parent(pid) => {
                let id = self.state.jobs.add(pid, entry.source_text.as_str());
                self.state.last_background_pid = Some(pid);
                if self.state.options.interactive {
                    sys::print_err(&format!("[{}] {}\n", id, pid));
                }
                Ok(0)
            }
        }
    }

    pub fn execute_command(&mut self, command: &Command) -> ExecResult<i32> {
        match command {
            Command::Pipeline(pipeline) => self.execute_pipeline(pipeline),
            Command::FunctionDef(def) => {
                self.state.functions.define(def.clone());
                Ok(0)
            }
            Command::If(if_cmd) => self.execute_if(if_cmd),
            Command::While(loop_cmd) => self.execute_while(loop_cmd, false),
            Command::Until(loop_cmd) => self.execute_while(loop_cmd, true),
            Command::For(for_cmd) => self.execute_for(for_cmd),
            Command::ForArith(for_cmd) => self.execute_for_arith(for_cmd),
            Command::Select(select) => self.execute_select(select),
            Command::Case(case) => self.execute_case(case),
            Command::Subshell(list) => self.execute_subshell(list),
            Command::Group(list) => self.execute_list(list),
            Command::Conditional(expr) => self.execute_conditional(expr),
            Command::Arithmetic(arith) => Ok(self.execute_arith_command(arith)),
        }
    }

    /// Run a condition list; errexit does not apply inside it.
    fn execute_condition(&mut self, list: &CommandList) -> ExecResult<i32> {
        let saved = std::mem::replace(&mut self.state.in_condition, true);
        let result = self.execute_list(list);
        self.state.in_condition = saved;
        result
    }

    fn execute_if(&mut self, if_cmd: &IfCommand) -> ExecResult<i32> {
        for clause in &if_cmd.clauses {
            let status = self.execute_condition(&clause.condition)?;
            if self.state.pending.is_some() {
                return Ok(status);
            }
            if status == 0 {
                return self.execute_list(&clause.body);
            }
        }
        match &if_cmd.else_body {
            Some(body) => self.execute_list(body),
            None => Ok(0),
        }
    }

    // =========================================================================
    // LOOPS
    // =========================================================================

    fn in_loop<F>(&mut self, run: F) -> ExecResult<i32>
    where
        F: FnOnce(&mut Self) -> ExecResult<i32>,
    {
        self.state.loop_depth += 1;
        let result = run(self);
        self.state.loop_depth -= 1;
        result
    }

    /// Consume a break/continue addressed to this loop.
    fn loop_control(&mut self) -> LoopFlow {
        match self.state.pending {
            None => LoopFlow::Next,
            Some(ControlSignal::Break(levels)) => {
                self.state.pending = (levels > 1).then(|| ControlSignal::Break(levels - 1));
                LoopFlow::Exit
            }
            Some(ControlSignal::Continue(levels)) if levels > 1 => {
                self.state.pending = Some(ControlSignal::Continue(levels - 1));
                LoopFlow::Exit
            }
            Some(ControlSignal::Continue(_)) => {
                self.state.pending = None;
                LoopFlow::Next
            }
            Some(ControlSignal::Return) | Some(ControlSignal::Exit(_)) => LoopFlow::Exit,
        }
    }

    fn execute_while(&mut self, loop_cmd: &LoopCommand, until: bool) -> ExecResult<i32> {
        self.in_loop(|interp| {
            let mut status = 0;
            loop {
                let condition = interp.execute_condition(&loop_cmd.condition)?;
                if let LoopFlow::Exit = interp.loop_control() {
                    break;
                }
                if (condition == 0) == until {
                    break;
                }
                status = interp.execute_list(&loop_cmd.body)?;
                if let LoopFlow::Exit = interp.loop_control() {
                    break;
                }
            }
            Ok(status)
        })
    }

    fn execute_for(&mut self, for_cmd: &ForCommand) -> ExecResult<i32> {
        let items = match &for_cmd.words {
            Some(words) => self.expand_words(words)?,
            None => self.state.positional.clone(),
        };
        self.in_loop(|interp| {
            let mut status = 0;
            for item in items {
                interp.state.set_var(&for_cmd.variable, item)?;
                status = interp.execute_list(&for_cmd.body)?;
                if let LoopFlow::Exit = interp.loop_control() {
                    break;
                }
            }
            Ok(status)
        })
    }

    fn execute_for_arith(&mut self, for_cmd: &ForArithCommand) -> ExecResult<i32> {
        self.state.current_line = for_cmd.line;
        if !for_cmd.init.trim().is_empty() {
            self.eval_arith(&for_cmd.init)?;
        }
        self.in_loop(|interp| {
            let mut status = 0;
            loop {
                if !for_cmd.condition.trim().is_empty() && interp.eval_arith(&for_cmd.condition)? == 0 {
                    break;
                }
                status = interp.execute_list(&for_cmd.body)?;
                if let LoopFlow::Exit = interp.loop_control() {
                    break;
                }
                if !for_cmd.update.trim().is_empty() {
                    interp.eval_arith(&for_cmd.update)?;
                }
            }
            Ok(status)
        })
    }

    /// `select`: print a numbered menu on stderr, read a choice from stdin
    /// into `REPLY`, bind the chosen word (or "") and run the body. Ends at
    /// end of input.
    fn execute_select(&mut self, select: &ForCommand) -> ExecResult<i32> {
        let items = match &select.words {
            Some(words) => self.expand_words(words)?,
            None => self.state.positional.clone(),
        };
        if items.is_empty() {
            return Ok(0);
        }
        self.in_loop(|interp| {
            let mut status = 0;
            let mut show_menu = true;
            loop {
                if show_menu {
                    sys::print_err(&format_menu(&items));
                }
                let prompt = interp
                    .state
                    .vars
                    .get_scalar("PS3")
                    .unwrap_or(DEFAULT_PS3)
                    .to_string();
                sys::print_err(&prompt);
                let Some(reply) = sys::read_line(sys::STDIN).map_err(|err| ExecError::sys("read", err))? else {
                    sys::print_err("\n");
                    return Ok(1);
                };
                if reply.trim().is_empty() {
                    show_menu = true;
                    continue;
                }
                show_menu = false;
                let choice = reply
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|n| items.get(n))
                    .cloned()
                    .unwrap_or_default();
                interp.state.set_var("REPLY", reply)?;
                interp.state.set_var(&select.variable, choice)?;
                status = interp.execute_list(&select.body)?;
                if let LoopFlow::Exit = interp.loop_control() {
                    break;
                }
            }
            Ok(status)
        })
    }

    // =========================================================================
    // CASE, SUBSHELL, ARITHMETIC
    // =========================================================================

    fn execute_case(&mut self, case: &CaseCommand) -> ExecResult<i32> {
        let subject = self.expand_word_to_string(&case.subject)?;
        let mut status = 0;
        let mut fall_through = false;
        for item in &case.items {
            if !fall_through && !self.case_item_matches(&item.patterns, &subject)? {
                continue;
            }
            status = self.execute_list(&item.body)?;
            if self.state.pending.is_some() {
                break;
            }
            match item.terminator {
                CaseTerminator::Break => break,
                CaseTerminator::FallThrough => fall_through = true,
                CaseTerminator::ContinueMatching => fall_through = false,
            }
        }
        Ok(status)
    }

    fn case_item_matches(&mut self, patterns: &[crate::ast::types::Word], subject: &str) -> ExecResult<bool> {
        for pattern in patterns {
            let pattern = self.expand_pattern(pattern)?;
            if pattern_matches(&pattern, subject) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn execute_subshell(&mut self, list: &CommandList) -> ExecResult<i32> {
        match sys::fork().map_err(|err| ExecError::sys("fork", err))? {
            ForkResult::Child => {
                self.become_subshell(false);
                let status = self.run_list(list);
                self.exit_subshell(status)
            }
            ForkResult::Parent(pid) => {
                let status = sys::wait_for(pid).map_err(|err| ExecError::sys("waitpid", err))?;
                debug!("subshell {} exited with {}", pid, status);
                Ok(status)
            }
        }
    }

    /// `(( expr ))`: 0 when the value is non-zero. Errors are reported
    /// here and give status 1.
    fn execute_arith_command(&mut self, arith: &ArithCommand) -> i32 {
        self.state.current_line = arith.line;
        match self.eval_arith(&arith.expression) {
            Ok(0) => 1,
            Ok(_) => 0,
            Err(err) => {
                sys::print_err(&format!("plush: {}: {}\n", arith.expression.trim(), err));
                1
            }
        }
    }
}

fn format_menu(items: &[String]) -> String {
    let width = items.len().to_string().len();
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{:>width$}) {}\n", i + 1, item, width = width))
        .collect()
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}m{}.{:03}s", secs / 60, secs % 60, d.subsec_millis())
}

fn format_times(real: Duration, user: Duration, system: Duration) -> String {
    format!(
        "\nreal\t{}\nuser\t{}\nsys\t{}\n",
        format_duration(real),
        format_duration(user),
        format_duration(system)
    )
}
