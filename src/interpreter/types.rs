//! Interpreter Types
//!
//! Type definitions for the interpreter state: shell options, execution
//! limits, pending control flow, and the composed [`InterpreterState`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use rand::Rng;

use crate::interpreter::alias_expansion::AliasTable;
use crate::interpreter::errors::ExpansionError;
use crate::interpreter::expansion::process_substitution::ProcSubst;
use crate::interpreter::functions::FunctionTable;
use crate::interpreter::jobs::JobTable;
use crate::interpreter::traps::TrapTable;
use crate::interpreter::variables::VariableStore;
use crate::parser::types::DEFAULT_MAX_ALIAS_DEPTH;

/// Shell options (set -e, set -o pipefail, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOptions {
    /// set -e: Exit immediately if a pipeline exits with non-zero status
    pub errexit: bool,
    /// set -u: Treat unset variables as an error when substituting
    pub nounset: bool,
    /// set -o pipefail: A pipeline fails if any of its segments fails
    pub pipefail: bool,
    /// set -f: Disable filename expansion (globbing)
    pub noglob: bool,
    /// set -a: Export every variable that is assigned
    pub allexport: bool,
    /// set -x: Print commands and their arguments as they are executed
    pub xtrace: bool,
    /// set -C: Prevent `>` from overwriting existing files
    pub noclobber: bool,
    /// set -v: Print input lines as they are read
    pub verbose: bool,
    /// Reading commands from a terminal
    pub interactive: bool,
}

/// Long option names accepted by `set -o`, with their single-letter forms.
pub const OPTION_NAMES: &[(&str, Option<char>)] = &[
    ("allexport", Some('a')),
    ("errexit", Some('e')),
    ("noclobber", Some('C')),
    ("noglob", Some('f')),
    ("nounset", Some('u')),
    ("pipefail", None),
    ("verbose", Some('v')),
    ("xtrace", Some('x')),
];

impl ShellOptions {
    fn flag_mut(&mut self, name: &str) -> Option<&mut bool> {
        Some(match name {
            "allexport" => &mut self.allexport,
            "errexit" => &mut self.errexit,
            "noclobber" => &mut self.noclobber,
            "noglob" => &mut self.noglob,
            "nounset" => &mut self.nounset,
            "pipefail" => &mut self.pipefail,
            "verbose" => &mut self.verbose,
            "xtrace" => &mut self.xtrace,
            _ => return None,
        })
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        Some(match name {
            "allexport" => self.allexport,
            "errexit" => self.errexit,
            "noclobber" => self.noclobber,
            "noglob" => self.noglob,
            "nounset" => self.nounset,
            "pipefail" => self.pipefail,
            "verbose" => self.verbose,
            "xtrace" => self.xtrace,
            _ => return None,
        })
    }

    /// Set an option by long name; false when the name is unknown.
    pub fn set_by_name(&mut self, name: &str, value: bool) -> bool {
        match self.flag_mut(name) {
            Some(flag) => {
                *flag = value;
                true
            }
            None => false,
        }
    }

    /// Set an option by its `set -X` letter; false when the letter is unknown.
    pub fn set_by_letter(&mut self, letter: char, value: bool) -> bool {
        OPTION_NAMES
            .iter()
            .find(|(_, l)| *l == Some(letter))
            .is_some_and(|(name, _)| self.set_by_name(name, value))
    }

    /// Value of `$-`.
    pub fn flags(&self) -> String {
        let mut flags: String = OPTION_NAMES
            .iter()
            .filter_map(|(name, letter)| match (letter, self.get(name)) {
                (Some(l), Some(true)) => Some(*l),
                _ => None,
            })
            .collect();
        if self.interactive {
            flags.push('i');
        }
        flags
    }
}

/// Soft limits that turn runaway input into recoverable errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Longest logical line accepted by the parser, in bytes
    pub max_line_length: usize,
    /// Longest alias chain expanded for one word
    pub max_alias_depth: usize,
    /// Deepest function call nesting
    pub max_call_depth: usize,
    /// Deepest nesting of command substitutions and `eval`/`source`
    pub max_subst_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_line_length: 1 << 20,
            max_alias_depth: DEFAULT_MAX_ALIAS_DEPTH,
            max_call_depth: 1000,
            max_subst_depth: 64,
        }
    }
}

/// Control flow requested by a builtin, checked after every statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    /// Leave this many enclosing loops
    Break(u32),
    /// Skip to the next iteration of the n-th enclosing loop
    Continue(u32),
    /// Leave the current function or sourced file
    Return,
    /// Terminate the shell (or the current subshell) with a status
    Exit(i32),
}

/// Complete interpreter state.
#[derive(Debug)]
pub struct InterpreterState {
    // ---- Variables ----
    pub vars: VariableStore,
    /// `$1`, `$2`, ...
    pub positional: Vec<String>,
    /// `$0`
    pub script_name: String,

    // ---- Tables ----
    pub aliases: AliasTable,
    pub functions: FunctionTable,
    pub jobs: JobTable,
    pub traps: TrapTable,
    /// Name to path cache for PATH lookups, cleared when PATH changes
    pub command_cache: HashMap<String, PathBuf>,

    // ---- Execution Tracking ----
    /// Exit code of last executed command (`$?`)
    pub last_exit_code: i32,
    /// Status of the most recent command substitution in the current command
    pub last_subst_status: Option<i32>,
    /// Current line number being executed (for $LINENO)
    pub current_line: usize,
    pub options: ShellOptions,

    // ---- Control Flow ----
    pub pending: Option<ControlSignal>,
    /// True when executing the condition of if/while/until or a non-final
    /// `&&`/`||` element (errexit doesn't apply)
    pub in_condition: bool,
    /// Current loop nesting depth (for break/continue)
    pub loop_depth: u32,
    /// Current function call depth
    pub call_depth: usize,
    /// Nesting of `source`d files (return is valid there)
    pub source_depth: usize,
    /// Nesting of command substitutions, eval and source
    pub subst_depth: usize,
    /// Nesting of arithmetic variable evaluation
    pub arith_depth: usize,

    // ---- Process ----
    /// `$$`
    pub shell_pid: i32,
    /// `$!`
    pub last_background_pid: Option<i32>,
    /// Running in a forked child of the main shell
    pub in_subshell: bool,
    /// Start time for $SECONDS
    pub start_time: Instant,
    /// Live process substitutions for the current pipeline
    pub proc_substs: Vec<ProcSubst>,
    pub next_proc_subst: usize,
}

impl InterpreterState {
    pub fn new(options: ShellOptions, script_name: impl Into<String>) -> Self {
        Self {
            vars: VariableStore::new(),
            positional: Vec::new(),
            script_name: script_name.into(),
            aliases: AliasTable::default(),
            functions: FunctionTable::default(),
            jobs: JobTable::default(),
            traps: TrapTable::default(),
            command_cache: HashMap::new(),
            last_exit_code: 0,
            last_subst_status: None,
            current_line: 0,
            options,
            pending: None,
            in_condition: false,
            loop_depth: 0,
            call_depth: 0,
            source_depth: 0,
            subst_depth: 0,
            arith_depth: 0,
            shell_pid: std::process::id() as i32,
            last_background_pid: None,
            in_subshell: false,
            start_time: Instant::now(),
            proc_substs: Vec::new(),
            next_proc_subst: 0,
        }
    }

    /// Variables whose value is computed on every read.
    pub fn dynamic_var(&self, name: &str) -> Option<String> {
        match name {
            "RANDOM" => Some(rand::thread_rng().gen_range(0..32768).to_string()),
            "SECONDS" => Some(self.start_time.elapsed().as_secs().to_string()),
            "LINENO" => Some(self.current_line.to_string()),
            _ => None,
        }
    }

    /// Scalar value of a variable, dynamic variables included.
    pub fn scalar(&self, name: &str) -> Option<String> {
        self.dynamic_var(name)
            .or_else(|| self.vars.get_scalar(name).map(str::to_string))
    }

    pub(crate) fn after_assign(&mut self, name: &str) {
        if self.options.allexport {
            self.vars.export(name);
        }
        if name == "PATH" {
            self.command_cache.clear();
        }
    }

    /// Assign a scalar the way a shell assignment does: honours allexport
    /// and drops the command cache when PATH changes.
    pub fn set_var(&mut self, name: &str, value: impl Into<String>) -> Result<(), ExpansionError> {
        self.vars.set_scalar(name, value)?;
        self.after_assign(name);
        Ok(())
    }

    pub fn set_var_element(&mut self, name: &str, index: usize, value: String) -> Result<(), ExpansionError> {
        self.vars.set_element(name, index, value)?;
        self.after_assign(name);
        Ok(())
    }

    pub fn set_array(&mut self, name: &str, values: Vec<String>) -> Result<(), ExpansionError> {
        self.vars.set_array(name, values)?;
        self.after_assign(name);
        Ok(())
    }
}
