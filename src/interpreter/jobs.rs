//! Background Jobs
//!
//! A background pipeline is registered with the pid of its last process and
//! the unexpanded command text. Jobs are reaped with non-blocking waits
//! after every list entry and stay listed until reported or waited for; a
//! non-interactive shell only remembers the most recent finished ones.

use log::{debug, warn};

use crate::interpreter::sys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Done(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: usize,
    pub pid: i32,
    pub command: String,
    pub state: JobState,
}

impl Job {
    /// One line of `jobs` output.
    pub fn describe(&self, current: bool) -> String {
        let marker = if current { '+' } else { ' ' };
        let state = match self.state {
            JobState::Running => "Running".to_string(),
            JobState::Done(0) => "Done".to_string(),
            JobState::Done(status) => format!("Exit {}", status),
        };
        format!("[{}]{}  {:<22}{}", self.id, marker, state, self.command)
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    /// Register a launched job; returns its id.
    pub fn add(&mut self, pid: i32, command: impl Into<String>) -> usize {
        let id = self.jobs.iter().map(|j| j.id).max().unwrap_or(0) + 1;
        let command = command.into();
        debug!("job [{}] pid {}: {}", id, pid, command);
        self.jobs.push(Job {
            id,
            pid,
            command,
            state: JobState::Running,
        });
        id
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Id of the most recently started job.
    pub fn current_id(&self) -> Option<usize> {
        self.jobs.last().map(|j| j.id)
    }

    /// Poll every running job without blocking.
    pub fn reap(&mut self) {
        for job in self.jobs.iter_mut().filter(|j| j.state == JobState::Running) {
            match sys::try_wait(job.pid) {
                Ok(Some(status)) => {
                    debug!("job [{}] pid {} finished with {}", job.id, job.pid, status);
                    job.state = JobState::Done(status);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("waitpid({}) failed: {}", job.pid, err);
                    job.state = JobState::Done(127);
                }
            }
        }
    }

    /// Remove and return finished jobs.
    pub fn take_finished(&mut self) -> Vec<Job> {
        let (done, running) = std::mem::take(&mut self.jobs)
            .into_iter()
            .partition(|j| j.state != JobState::Running);
        self.jobs = running;
        done
    }

    /// Drop the oldest finished jobs until at most `keep` remain.
    pub fn forget_finished(&mut self, keep: usize) {
        let mut excess = self
            .jobs
            .iter()
            .filter(|j| j.state != JobState::Running)
            .count()
            .saturating_sub(keep);
        self.jobs.retain(|j| {
            if excess > 0 && j.state != JobState::Running {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }

    /// Find a job by `%id`, `%%`/`%+` or pid.
    pub fn find(&self, spec: &str) -> Option<usize> {
        let index = match spec.strip_prefix('%') {
            Some("%") | Some("+") | Some("") => self.jobs.len().checked_sub(1)?,
            Some(id) => {
                let id: usize = id.parse().ok()?;
                self.jobs.iter().position(|j| j.id == id)?
            }
            None => {
                let pid: i32 = spec.parse().ok()?;
                self.jobs.iter().position(|j| j.pid == pid)?
            }
        };
        Some(index)
    }

    /// Block until the job at `index` ends, remove it and return its status.
    pub fn wait_index(&mut self, index: usize) -> i32 {
        let job = self.jobs.remove(index);
        match job.state {
            JobState::Done(status) => status,
            JobState::Running => sys::wait_for(job.pid).unwrap_or_else(|err| {
                warn!("waitpid({}) failed: {}", job.pid, err);
                127
            }),
        }
    }

    /// Wait for every job; the table is empty afterwards.
    pub fn wait_all(&mut self) {
        while !self.jobs.is_empty() {
            self.wait_index(0);
        }
    }

    /// Drop all jobs without waiting; used by forked subshells, which are
    /// not the parent of these processes.
    pub fn clear(&mut self) {
        self.jobs.clear();
    }
}
