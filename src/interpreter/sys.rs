//! OS Plumbing
//!
//! Thin, safe wrappers over the `libc` calls the execution engine needs:
//! fork, pipes, descriptor duplication, waiting, exec, signal dispositions,
//! FIFOs and passwd lookups. Every call that can be interrupted is retried
//! on `EINTR`.
//!
//! Output written by the shell itself goes straight to file descriptors 1
//! and 2 with `write(2)`. Nothing is buffered in-process, so a fork never
//! duplicates pending output and in-process redirection (dup2 over fd 1)
//! applies to builtins immediately.

use std::ffi::{CStr, CString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::time::Duration;

pub const STDIN: RawFd = 0;
pub const STDOUT: RawFd = 1;
pub const STDERR: RawFd = 2;

/// Lowest descriptor used for saved copies of redirected fds.
pub const SAVED_FD_BASE: RawFd = 10;

fn check(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Run a syscall until it stops failing with EINTR.
fn retry<F>(mut call: F) -> io::Result<libc::c_int>
where
    F: FnMut() -> libc::c_int,
{
    loop {
        match check(call()) {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn cstring(bytes: &[u8]) -> io::Result<CString> {
    CString::new(bytes).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "nul byte in string"))
}

pub fn path_cstring(path: &Path) -> io::Result<CString> {
    cstring(path.as_os_str().as_bytes())
}

// =============================================================================
// PROCESSES
// =============================================================================

pub enum ForkResult {
    Child,
    Parent(libc::pid_t),
}

pub fn fork() -> io::Result<ForkResult> {
    // SAFETY: the shell is single-threaded; the child only calls
    // async-signal-safe functions or continues the interpreter loop.
    match unsafe { libc::fork() } {
        -1 => Err(io::Error::last_os_error()),
        0 => Ok(ForkResult::Child),
        pid => Ok(ForkResult::Parent(pid)),
    }
}

/// Leave the process immediately, without running Rust destructors or
/// atexit handlers inherited from the parent.
pub fn exit_now(code: i32) -> ! {
    // SAFETY: _exit never returns and touches no Rust state.
    unsafe { libc::_exit(code & 0xff) }
}

/// Raw wait status decoded into a shell exit status.
pub fn decode_status(raw: libc::c_int) -> i32 {
    if libc::WIFEXITED(raw) {
        libc::WEXITSTATUS(raw)
    } else if libc::WIFSIGNALED(raw) {
        128 + libc::WTERMSIG(raw)
    } else {
        raw & 0xff
    }
}

/// Block until `pid` terminates; returns its shell status.
pub fn wait_for(pid: libc::pid_t) -> io::Result<i32> {
    let mut raw: libc::c_int = 0;
    // SAFETY: raw is a valid out pointer.
    retry(|| unsafe { libc::waitpid(pid, &mut raw, 0) })?;
    Ok(decode_status(raw))
}

/// Check whether `pid` has terminated, without blocking.
pub fn try_wait(pid: libc::pid_t) -> io::Result<Option<i32>> {
    let mut raw: libc::c_int = 0;
    // SAFETY: raw is a valid out pointer.
    let ret = retry(|| unsafe { libc::waitpid(pid, &mut raw, libc::WNOHANG) })?;
    if ret == 0 {
        return Ok(None);
    }
    Ok(Some(decode_status(raw)))
}

pub fn kill(pid: libc::pid_t, signal: libc::c_int) -> io::Result<()> {
    // SAFETY: plain syscall.
    check(unsafe { libc::kill(pid, signal) }).map(|_| ())
}

pub fn getppid() -> i32 {
    // SAFETY: always succeeds.
    unsafe { libc::getppid() }
}

pub fn getpid() -> i32 {
    // SAFETY: always succeeds.
    unsafe { libc::getpid() }
}

pub fn isatty(fd: RawFd) -> bool {
    // SAFETY: plain syscall.
    unsafe { libc::isatty(fd) == 1 }
}

/// argv and envp converted to C strings for `execve`.
pub struct ExecImage {
    path: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
}

impl ExecImage {
    pub fn new(path: &Path, argv: &[String], env: &[(String, String)]) -> io::Result<Self> {
        let argv = argv
            .iter()
            .map(|a| cstring(a.as_bytes()))
            .collect::<io::Result<Vec<_>>>()?;
        let envp = env
            .iter()
            .map(|(k, v)| cstring(format!("{}={}", k, v).as_bytes()))
            .collect::<io::Result<Vec<_>>>()?;
        Ok(Self {
            path: path_cstring(path)?,
            argv,
            envp,
        })
    }

    /// Replace the process image; returns only on failure.
    pub fn exec(&self) -> io::Error {
        let mut argv: Vec<*const libc::c_char> = self.argv.iter().map(|a| a.as_ptr()).collect();
        argv.push(std::ptr::null());
        let mut envp: Vec<*const libc::c_char> = self.envp.iter().map(|e| e.as_ptr()).collect();
        envp.push(std::ptr::null());
        // SAFETY: argv and envp are null-terminated arrays of valid C strings
        // that outlive the call.
        unsafe {
            libc::execve(self.path.as_ptr(), argv.as_ptr(), envp.as_ptr());
        }
        io::Error::last_os_error()
    }
}

// =============================================================================
// FILE DESCRIPTORS
// =============================================================================

pub fn set_cloexec(fd: RawFd) -> io::Result<()> {
    // SAFETY: plain fcntl on an fd we own.
    let flags = check(unsafe { libc::fcntl(fd, libc::F_GETFD) })?;
    check(unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) }).map(|_| ())
}

/// A pipe whose both ends are close-on-exec: `(read, write)`.
pub fn pipe() -> io::Result<(RawFd, RawFd)> {
    let mut fds = [0 as libc::c_int; 2];
    // SAFETY: fds has room for two descriptors.
    check(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
    for fd in fds {
        if let Err(err) = set_cloexec(fd) {
            close(fds[0]);
            close(fds[1]);
            return Err(err);
        }
    }
    Ok((fds[0], fds[1]))
}

pub fn dup2(from: RawFd, to: RawFd) -> io::Result<()> {
    if from == to {
        return Ok(());
    }
    // SAFETY: plain syscall.
    retry(|| unsafe { libc::dup2(from, to) }).map(|_| ())
}

/// Copy `fd` to the lowest free descriptor at or above [`SAVED_FD_BASE`],
/// close-on-exec. `None` when `fd` is not open.
pub fn save_fd(fd: RawFd) -> io::Result<Option<RawFd>> {
    // SAFETY: plain fcntl.
    match check(unsafe { libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, SAVED_FD_BASE) }) {
        Ok(saved) => Ok(Some(saved)),
        Err(err) if err.raw_os_error() == Some(libc::EBADF) => Ok(None),
        Err(err) => Err(err),
    }
}

pub fn is_open(fd: RawFd) -> bool {
    // SAFETY: plain fcntl.
    unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
}

pub fn close(fd: RawFd) {
    // SAFETY: closing an fd we own; errors are not actionable.
    unsafe {
        libc::close(fd);
    }
}

/// open(2) with close-on-exec.
pub fn open(path: &Path, flags: libc::c_int, mode: libc::mode_t) -> io::Result<RawFd> {
    let cpath = path_cstring(path)?;
    // SAFETY: cpath is a valid C string.
    retry(|| unsafe { libc::open(cpath.as_ptr(), flags | libc::O_CLOEXEC, mode as libc::c_uint) })
}

pub fn write_all(fd: RawFd, mut bytes: &[u8]) -> io::Result<()> {
    while !bytes.is_empty() {
        // SAFETY: bytes is a valid buffer of the given length.
        let n = retry(|| unsafe {
            libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) as libc::c_int
        })?;
        bytes = &bytes[n as usize..];
    }
    Ok(())
}

/// Read one chunk; `Ok(0)` at end of file.
pub fn read(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    // SAFETY: buf is a valid writable buffer of the given length.
    let n = retry(|| unsafe {
        libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) as libc::c_int
    })?;
    Ok(n as usize)
}

pub fn read_to_end(fd: RawFd) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = read(fd, &mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

/// Read one line a byte at a time so nothing past the newline is taken
/// from a descriptor other processes share. The newline is not included;
/// `None` at end of input.
pub fn read_line(fd: RawFd) -> io::Result<Option<String>> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        if read(fd, &mut byte)? == 0 {
            if bytes.is_empty() {
                return Ok(None);
            }
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        bytes.push(byte[0]);
    }
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// Write to the shell's standard output; a closed pipe is not an error
/// worth reporting.
pub fn print_out(text: &str) {
    let _ = write_all(STDOUT, text.as_bytes());
}

pub fn print_err(text: &str) {
    let _ = write_all(STDERR, text.as_bytes());
}

pub fn mkfifo(path: &Path) -> io::Result<()> {
    let cpath = path_cstring(path)?;
    // SAFETY: cpath is a valid C string.
    check(unsafe { libc::mkfifo(cpath.as_ptr(), 0o600) }).map(|_| ())
}

/// access(2) with the real user id; `mode` is `R_OK`, `W_OK` or `X_OK`.
pub fn access(path: &Path, mode: libc::c_int) -> bool {
    let Ok(cpath) = path_cstring(path) else {
        return false;
    };
    // SAFETY: cpath is a valid C string.
    unsafe { libc::access(cpath.as_ptr(), mode) == 0 }
}

/// Is `path` executable by us?
pub fn is_executable(path: &Path) -> bool {
    access(path, libc::X_OK)
}

// =============================================================================
// SIGNALS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Default,
    Ignore,
    Handler(extern "C" fn(libc::c_int)),
}

pub fn set_signal(signal: libc::c_int, disposition: Disposition) -> io::Result<()> {
    // SAFETY: a zeroed sigaction is a valid starting value; the handler, if
    // any, only stores to atomics.
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = match disposition {
            Disposition::Default => libc::SIG_DFL,
            Disposition::Ignore => libc::SIG_IGN,
            Disposition::Handler(handler) => handler as usize,
        };
        libc::sigemptyset(&mut action.sa_mask);
        check(libc::sigaction(signal, &action, std::ptr::null_mut())).map(|_| ())
    }
}

// =============================================================================
// USERS AND ACCOUNTING
// =============================================================================

fn passwd_home(lookup: impl FnOnce(&mut libc::passwd, &mut [libc::c_char], &mut *mut libc::passwd) -> libc::c_int) -> Option<String> {
    // SAFETY: zeroed passwd is a valid out value; buffer sized generously.
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buf = vec![0 as libc::c_char; 16 * 1024];
    let mut result: *mut libc::passwd = std::ptr::null_mut();
    let rc = lookup(&mut pwd, &mut buf, &mut result);
    if rc != 0 || result.is_null() || pwd.pw_dir.is_null() {
        return None;
    }
    // SAFETY: pw_dir points into buf, which is still alive.
    let dir = unsafe { CStr::from_ptr(pwd.pw_dir) };
    Some(dir.to_string_lossy().into_owned())
}

/// Home directory of `user` from the passwd database.
pub fn home_dir_of(user: &str) -> Option<String> {
    let name = CString::new(user).ok()?;
    passwd_home(|pwd, buf, result| {
        // SAFETY: all pointers are valid for the duration of the call.
        unsafe { libc::getpwnam_r(name.as_ptr(), pwd, buf.as_mut_ptr(), buf.len(), result) }
    })
}

/// Home directory of the current user from the passwd database.
pub fn current_home_dir() -> Option<String> {
    // SAFETY: getuid always succeeds.
    let uid = unsafe { libc::getuid() };
    passwd_home(|pwd, buf, result| {
        // SAFETY: all pointers are valid for the duration of the call.
        unsafe { libc::getpwuid_r(uid, pwd, buf.as_mut_ptr(), buf.len(), result) }
    })
}

fn timeval(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec as u64) + Duration::from_micros(tv.tv_usec as u64)
}

/// User and system CPU time of this process plus its waited-for children.
pub fn cpu_times() -> (Duration, Duration) {
    let mut user = Duration::ZERO;
    let mut sys = Duration::ZERO;
    for who in [libc::RUSAGE_SELF, libc::RUSAGE_CHILDREN] {
        // SAFETY: zeroed rusage is a valid out value.
        let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
        if unsafe { libc::getrusage(who, &mut usage) } == 0 {
            user += timeval(usage.ru_utime);
            sys += timeval(usage.ru_stime);
        }
    }
    (user, sys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_decode_status() {
        // exit(3): status in the high byte
        assert_eq!(decode_status(3 << 8), 3);
        // killed by SIGTERM
        assert_eq!(decode_status(libc::SIGTERM), 128 + libc::SIGTERM);
    }

    #[test]
    #[serial]
    fn test_pipe_round_trip() {
        let (r, w) = pipe().unwrap();
        write_all(w, b"hello").unwrap();
        close(w);
        assert_eq!(read_to_end(r).unwrap(), b"hello");
        close(r);
    }

    #[test]
    #[serial]
    fn test_fork_and_wait() {
        match fork().unwrap() {
            ForkResult::Child => exit_now(7),
            ForkResult::Parent(pid) => assert_eq!(wait_for(pid).unwrap(), 7),
        }
    }

    #[test]
    #[serial]
    fn test_save_fd_above_base() {
        let (r, w) = pipe().unwrap();
        let saved = save_fd(w).unwrap().unwrap();
        assert!(saved >= SAVED_FD_BASE);
        close(saved);
        close(r);
        close(w);
        assert_eq!(save_fd(w).unwrap(), None);
    }
}
