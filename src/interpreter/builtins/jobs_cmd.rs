//! jobs, wait, kill - Background job builtins
//!
//! jobs [-p]                 - list jobs (pids only with -p)
//! wait [%job | pid ...]     - wait for jobs; all of them without operands
//! kill [-s SIG | -SIG] target ...
//! kill -l                   - list signal names

use crate::interpreter::builtins::{io_message, BuiltinResult};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::jobs::JobState;
use crate::interpreter::sys;
use crate::interpreter::traps::{signal_list, signal_number};

pub fn handle_jobs(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let pids_only = match args.first().map(String::as_str) {
        None => false,
        Some("-p") => true,
        Some(other) => {
            return BuiltinResult::failure(
                &format!("plush: jobs: {}: invalid option\njobs: usage: jobs [-p]\n", other),
                2,
            )
        }
    };

    let jobs = &mut interp.state.jobs;
    jobs.reap();
    let current = jobs.current_id();
    let mut stdout = String::new();
    for job in jobs.jobs() {
        if pids_only {
            stdout.push_str(&format!("{}\n", job.pid));
        } else {
            stdout.push_str(&job.describe(Some(job.id) == current));
            stdout.push('\n');
        }
    }
    // Finished jobs are reported once.
    jobs.take_finished();
    BuiltinResult::output(stdout)
}

pub fn handle_wait(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let jobs = &mut interp.state.jobs;
    if args.is_empty() {
        jobs.wait_all();
        return BuiltinResult::ok();
    }

    let mut stderr = String::new();
    let mut status = 0;
    for spec in args {
        status = match jobs.find(spec) {
            Some(index) => jobs.wait_index(index),
            None if spec.starts_with('%') => {
                stderr.push_str(&format!("plush: wait: {}: no such job\n", spec));
                127
            }
            None => match spec.parse::<i32>() {
                Ok(pid) => sys::wait_for(pid).unwrap_or_else(|_| {
                    stderr.push_str(&format!(
                        "plush: wait: pid {} is not a child of this shell\n",
                        pid
                    ));
                    127
                }),
                Err(_) => {
                    stderr.push_str(&format!("plush: wait: `{}': not a pid or valid job spec\n", spec));
                    2
                }
            },
        };
    }
    BuiltinResult {
        stdout: String::new(),
        stderr,
        exit_code: status,
    }
}

pub fn handle_kill(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let mut signal = libc::SIGTERM;
    let mut rest = args;
    match rest.first().map(String::as_str) {
        Some("-l") => return BuiltinResult::output(format!("{}\n", signal_list())),
        Some("-s") | Some("-n") => {
            let Some(spec) = rest.get(1) else {
                return BuiltinResult::failure("plush: kill: option requires an argument\n", 2);
            };
            match signal_number(spec) {
                Some(n) => signal = n,
                None => {
                    return BuiltinResult::failure(
                        &format!("plush: kill: {}: invalid signal specification\n", spec),
                        1,
                    )
                }
            }
            rest = &rest[2..];
        }
        Some("--") => rest = &rest[1..],
        Some(flag) if flag.starts_with('-') && flag.len() > 1 => {
            match signal_number(&flag[1..]) {
                Some(n) => signal = n,
                None => {
                    return BuiltinResult::failure(
                        &format!("plush: kill: {}: invalid signal specification\n", &flag[1..]),
                        1,
                    )
                }
            }
            rest = &rest[1..];
        }
        _ => {}
    }
    if rest.is_empty() {
        return BuiltinResult::failure(
            "kill: usage: kill [-s sigspec | -sigspec] pid | jobspec ... or kill -l\n",
            2,
        );
    }

    let jobs = &mut interp.state.jobs;
    jobs.reap();
    let mut stderr = String::new();
    for target in rest {
        let pid = if target.starts_with('%') {
            match jobs.find(target).map(|index| &jobs.jobs()[index]) {
                Some(job) if job.state == JobState::Running => job.pid,
                Some(_) => {
                    stderr.push_str(&format!("plush: kill: {}: job has terminated\n", target));
                    continue;
                }
                None => {
                    stderr.push_str(&format!("plush: kill: {}: no such job\n", target));
                    continue;
                }
            }
        } else {
            match target.parse::<i32>() {
                Ok(pid) => pid,
                Err(_) => {
                    stderr.push_str(&format!(
                        "plush: kill: {}: arguments must be process or job IDs\n",
                        target
                    ));
                    continue;
                }
            }
        };
        if let Err(err) = sys::kill(pid, signal) {
            stderr.push_str(&format!("plush: kill: ({}) - {}\n", pid, io_message(&err)));
        }
    }

    let exit_code = if stderr.is_empty() { 0 } else { 1 };
    BuiltinResult {
        stdout: String::new(),
        stderr,
        exit_code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::sys::ForkResult;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn spawn(code: i32, sleep_ms: u64) -> i32 {
        match sys::fork().unwrap() {
            ForkResult::Child => {
                std::thread::sleep(std::time::Duration::from_millis(sleep_ms));
                sys::exit_now(code)
            }
            ForkResult::Parent(pid) => pid,
        }
    }

    #[test]
    #[serial]
    fn test_wait_for_job_status() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let pid = spawn(5, 0);
        interp.state.jobs.add(pid, "exit 5");
        let listing = handle_jobs(&mut interp, &args(&["-p"])).stdout;
        assert!(listing == format!("{}\n", pid) || listing.is_empty());
        interp.state.jobs.add(spawn(6, 0), "exit 6");
        assert_eq!(handle_wait(&mut interp, &args(&["%%"])).exit_code, 6);
    }

    #[test]
    #[serial]
    fn test_wait_unknown() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let result = handle_wait(&mut interp, &args(&["%4"]));
        assert_eq!(result.exit_code, 127);
        assert_eq!(result.stderr, "plush: wait: %4: no such job\n");
        assert_eq!(handle_wait(&mut interp, &[]).exit_code, 0);
    }

    #[test]
    #[serial]
    fn test_kill_job() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let pid = spawn(0, 5000);
        interp.state.jobs.add(pid, "sleep 5");
        assert_eq!(handle_kill(&mut interp, &args(&["-KILL", "%1"])).exit_code, 0);
        assert_eq!(
            handle_wait(&mut interp, &args(&[&pid.to_string()])).exit_code,
            128 + libc::SIGKILL
        );
    }

    #[test]
    fn test_kill_usage() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(handle_kill(&mut interp, &[]).exit_code, 2);
        assert_eq!(handle_kill(&mut interp, &args(&["-BOGUS", "1"])).exit_code, 1);
        assert_eq!(handle_kill(&mut interp, &args(&["abc"])).exit_code, 1);
    }
}
