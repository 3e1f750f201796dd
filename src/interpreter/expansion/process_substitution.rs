//! Process Substitution
//!
//! `<(cmd)` and `>(cmd)` are replaced by the path of a named FIFO. A forked
//! child runs `cmd` with its stdout (for `<(`) or stdin (for `>(`) opened on
//! the FIFO. Every substitution is registered in the shell state and joined
//! after the owning command finishes: the child is waited for and the FIFO
//! is unlinked, on error paths too.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::interpreter::errors::ExpansionResult;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::sys::{self, ForkResult};

/// How long a finished command's substitutions get to exit on their own.
const JOIN_GRACE: Duration = Duration::from_millis(500);
const JOIN_POLL: Duration = Duration::from_millis(5);

/// A live process substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcSubst {
    pub pid: i32,
    pub path: PathBuf,
    /// `>(...)`: the child reads from the FIFO
    pub output: bool,
}

impl Interpreter {
    /// Start `command` behind a FIFO and return the FIFO path.
    pub fn process_substitution(&mut self, command: &str, output: bool) -> ExpansionResult<String> {
        let path = std::env::temp_dir().join(format!(
            "plush-{}-{}",
            sys::getpid(),
            self.state.next_proc_subst
        ));
        self.state.next_proc_subst += 1;
        sys::mkfifo(&path)?;

        match sys::fork() {
            Ok(ForkResult::Child) => {
                self.become_subshell(false);
                let (flags, target) = if output {
                    (libc::O_RDONLY, sys::STDIN)
                } else {
                    (libc::O_WRONLY, sys::STDOUT)
                };
                let status = match sys::open(&path, flags, 0)
                    .and_then(|fd| sys::dup2(fd, target).map(|_| sys::close(fd)))
                {
                    Ok(()) => self.execute_text(command),
                    Err(err) => {
                        sys::print_err(&format!("plush: {}: {}\n", path.display(), err));
                        1
                    }
                };
                self.exit_subshell(status)
            }
            Ok(ForkResult::Parent(pid)) => {
                debug!("process substitution pid {} on {}", pid, path.display());
                let display = path.to_string_lossy().into_owned();
                self.state.proc_substs.push(ProcSubst { pid, path, output });
                Ok(display)
            }
            Err(err) => {
                let _ = std::fs::remove_file(&path);
                Err(err.into())
            }
        }
    }

    /// Join every substitution registered after `mark`.
    pub fn join_process_substitutions(&mut self, mark: usize) {
        if self.state.proc_substs.len() <= mark {
            return;
        }
        for subst in self.state.proc_substs.split_off(mark) {
            join_one(&subst);
        }
    }
}

/// Release a child that may still be blocked opening its FIFO, give it a
/// moment to exit, then terminate it.
fn join_one(subst: &ProcSubst) {
    if let Ok(None) = sys::try_wait(subst.pid) {
        let flags = if subst.output {
            libc::O_WRONLY | libc::O_NONBLOCK
        } else {
            libc::O_RDONLY | libc::O_NONBLOCK
        };
        if let Ok(fd) = sys::open(&subst.path, flags, 0) {
            sys::close(fd);
        }
        let mut waited = Duration::ZERO;
        let mut finished = false;
        while waited < JOIN_GRACE {
            if !matches!(sys::try_wait(subst.pid), Ok(None)) {
                finished = true;
                break;
            }
            thread::sleep(JOIN_POLL);
            waited += JOIN_POLL;
        }
        if !finished {
            debug!("terminating process substitution {}", subst.pid);
            let _ = sys::kill(subst.pid, libc::SIGTERM);
            let _ = sys::wait_for(subst.pid);
        }
    }
    if let Err(err) = std::fs::remove_file(&subst.path) {
        warn!("cannot remove {}: {}", subst.path.display(), err);
    }
}
