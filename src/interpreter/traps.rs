//! Signal Traps
//!
//! `trap` registers shell text to run when a signal arrives. The signal
//! handler only records the signal in a static array of atomic flags; the
//! interpreter drains those flags at safe points (top of the read loop,
//! after every list entry) and runs the trap text there. Signal 0 is the
//! `EXIT` pseudo-signal, run when the shell exits.

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace};

use crate::interpreter::expansion::parameter_ops::quote_value;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::sys::{self, Disposition};
use crate::interpreter::types::ControlSignal;

/// Highest signal number tracked, exclusive.
const SIGNAL_SLOTS: usize = 65;

#[allow(clippy::declare_interior_mutable_const)]
const NOT_PENDING: AtomicBool = AtomicBool::new(false);

static PENDING: [AtomicBool; SIGNAL_SLOTS] = [NOT_PENDING; SIGNAL_SLOTS];
static ANY_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn record_signal(signal: libc::c_int) {
    if let Some(flag) = usize::try_from(signal).ok().and_then(|s| PENDING.get(s)) {
        flag.store(true, Ordering::SeqCst);
        ANY_PENDING.store(true, Ordering::SeqCst);
    }
}

/// Signals received since the last call, in ascending order.
pub fn take_pending() -> Vec<i32> {
    if !ANY_PENDING.swap(false, Ordering::SeqCst) {
        return Vec::new();
    }
    PENDING
        .iter()
        .enumerate()
        .filter(|(_, flag)| flag.swap(false, Ordering::SeqCst))
        .map(|(signal, _)| signal as i32)
        .collect()
}

const SIGNALS: &[(&str, libc::c_int)] = &[
    ("HUP", libc::SIGHUP),
    ("INT", libc::SIGINT),
    ("QUIT", libc::SIGQUIT),
    ("ILL", libc::SIGILL),
    ("TRAP", libc::SIGTRAP),
    ("ABRT", libc::SIGABRT),
    ("BUS", libc::SIGBUS),
    ("FPE", libc::SIGFPE),
    ("KILL", libc::SIGKILL),
    ("USR1", libc::SIGUSR1),
    ("SEGV", libc::SIGSEGV),
    ("USR2", libc::SIGUSR2),
    ("PIPE", libc::SIGPIPE),
    ("ALRM", libc::SIGALRM),
    ("TERM", libc::SIGTERM),
    ("CHLD", libc::SIGCHLD),
    ("CONT", libc::SIGCONT),
    ("STOP", libc::SIGSTOP),
    ("TSTP", libc::SIGTSTP),
    ("TTIN", libc::SIGTTIN),
    ("TTOU", libc::SIGTTOU),
    ("URG", libc::SIGURG),
    ("XCPU", libc::SIGXCPU),
    ("XFSZ", libc::SIGXFSZ),
    ("VTALRM", libc::SIGVTALRM),
    ("PROF", libc::SIGPROF),
    ("WINCH", libc::SIGWINCH),
    ("SYS", libc::SIGSYS),
];

/// Parse `INT`, `SIGINT`, `int`, `2` or `EXIT`.
pub fn signal_number(spec: &str) -> Option<i32> {
    if let Ok(n) = spec.parse::<i32>() {
        return (0..SIGNAL_SLOTS as i32).contains(&n).then_some(n);
    }
    let upper = spec.to_ascii_uppercase();
    let name = upper.strip_prefix("SIG").unwrap_or(&upper);
    if name == "EXIT" {
        return Some(0);
    }
    SIGNALS.iter().find(|(n, _)| *n == name).map(|(_, s)| *s)
}

pub fn signal_name(signal: i32) -> String {
    if signal == 0 {
        return "EXIT".to_string();
    }
    SIGNALS
        .iter()
        .find(|(_, s)| *s == signal)
        .map_or_else(|| signal.to_string(), |(n, _)| format!("SIG{}", n))
}

/// `trap -l` listing.
pub fn signal_list() -> String {
    SIGNALS
        .iter()
        .map(|(name, num)| format!("{:2}) SIG{}", num, name))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrapAction {
    Command(String),
    Ignore,
}

#[derive(Debug, Clone, Default)]
pub struct TrapTable {
    actions: BTreeMap<i32, TrapAction>,
}

impl TrapTable {
    pub fn get(&self, signal: i32) -> Option<&TrapAction> {
        self.actions.get(&signal)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &TrapAction)> {
        self.actions.iter().map(|(s, a)| (*s, a))
    }

    /// Register an action and install the matching disposition.
    pub fn set(&mut self, signal: i32, action: TrapAction) -> io::Result<()> {
        if signal != 0 {
            let disposition = match action {
                TrapAction::Command(_) => Disposition::Handler(record_signal),
                TrapAction::Ignore => Disposition::Ignore,
            };
            sys::set_signal(signal, disposition)?;
        }
        debug!("trap {} = {:?}", signal_name(signal), action);
        self.actions.insert(signal, action);
        Ok(())
    }

    /// Forget the action for `signal` and restore `disposition`.
    pub fn reset(&mut self, signal: i32, disposition: Disposition) -> io::Result<()> {
        self.actions.remove(&signal);
        if signal != 0 {
            sys::set_signal(signal, disposition)?;
        }
        Ok(())
    }

    /// Subshells keep ignored signals; trapped ones revert to default.
    pub fn reset_for_subshell(&mut self) {
        let trapped: Vec<i32> = self
            .actions
            .iter()
            .filter(|(_, action)| matches!(action, TrapAction::Command(_)))
            .map(|(signal, _)| *signal)
            .collect();
        for signal in trapped {
            let _ = self.reset(signal, Disposition::Default);
        }
    }

    pub fn take_exit_action(&mut self) -> Option<String> {
        match self.actions.remove(&0) {
            Some(TrapAction::Command(text)) => Some(text),
            _ => None,
        }
    }

    /// Line printed by `trap` / `trap -p` for one entry.
    pub fn format_entry(&self, signal: i32) -> Option<String> {
        let text = match self.actions.get(&signal)? {
            TrapAction::Command(text) => text.as_str(),
            TrapAction::Ignore => "",
        };
        let name = signal_name(signal);
        Some(format!("trap -- {} {}", quote_value(text), name.trim_start_matches("SIG")))
    }
}

impl Interpreter {
    /// Run the trap text of every signal received since the last call.
    /// `$?` is preserved across trap actions.
    pub fn run_pending_traps(&mut self) {
        for signal in take_pending() {
            let Some(TrapAction::Command(text)) = self.state.traps.get(signal).cloned() else {
                continue;
            };
            trace!("running trap for {}", signal_name(signal));
            let saved = self.state.last_exit_code;
            self.execute_text(&text);
            if !matches!(self.state.pending, Some(ControlSignal::Exit(_))) {
                self.state.last_exit_code = saved;
            }
        }
    }

    /// Run the `EXIT` trap once, if one is set.
    pub fn run_exit_trap(&mut self) {
        if let Some(text) = self.state.traps.take_exit_action() {
            let saved = self.state.last_exit_code;
            self.state.pending = None;
            self.execute_text(&text);
            self.state.last_exit_code = saved;
        }
    }
}
