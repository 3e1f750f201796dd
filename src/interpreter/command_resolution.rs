//! Command Resolution
//!
//! Decides what a command name refers to, in dispatch order: builtin,
//! shell function, then an external program found on `PATH` (or
//! [`DEFAULT_PATH`] when it is unset). `PATH` lookups are cached by name;
//! the cache is dropped whenever `PATH` is assigned.
//!
//! Also holds the last step of running an external program in a forked
//! child: `execve`, with the status and message conventions for failures
//! (127 not found, 126 not executable) and the fallback of running a file
//! without a `#!` line as a shell script.

use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::interpreter::errors::ExecError;
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::sys::{self, ExecImage};

/// Search path used when `PATH` is unset.
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin:/usr/local/sbin:/usr/sbin:/sbin";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Builtin,
    Function,
    External(PathBuf),
    NotFound,
}

/// Search a `PATH` value for `name`. An empty component means the current
/// directory. A file that exists but is not executable is returned when no
/// executable match exists, so the caller reports 126 rather than 127.
pub fn search_path(path_var: &str, name: &str) -> Option<PathBuf> {
    let mut not_executable = None;
    for dir in path_var.split(':') {
        let dir = if dir.is_empty() { "." } else { dir };
        let candidate = Path::new(dir).join(name);
        if !candidate.is_file() {
            continue;
        }
        if sys::is_executable(&candidate) {
            return Some(candidate);
        }
        not_executable.get_or_insert(candidate);
    }
    not_executable
}

impl Interpreter {
    pub fn resolve_command(&mut self, name: &str) -> Resolved {
        if self.is_builtin(name) {
            Resolved::Builtin
        } else if self.state.functions.contains(name) {
            Resolved::Function
        } else {
            match self.find_in_path(name) {
                Some(path) => Resolved::External(path),
                None => Resolved::NotFound,
            }
        }
    }

    /// Path of external command `name`, consulting the cache first.
    pub fn find_in_path(&mut self, name: &str) -> Option<PathBuf> {
        if name.is_empty() {
            return None;
        }
        if name.contains('/') {
            return Some(PathBuf::from(name));
        }
        if let Some(cached) = self.state.command_cache.get(name) {
            if cached.is_file() {
                trace!("command cache hit: {} -> {}", name, cached.display());
                return Some(cached.clone());
            }
        }
        let path_var = self.state.vars.get_scalar("PATH").unwrap_or(DEFAULT_PATH);
        let found = search_path(path_var, name)?;
        if sys::is_executable(&found) {
            self.state.command_cache.insert(name.to_string(), found.clone());
        }
        Some(found)
    }

    /// Replace the current (forked) process with `path`. Never returns.
    pub fn exec_external(&mut self, name: &str, path: Option<PathBuf>, argv: &[String]) -> ! {
        let Some(path) = path else {
            sys::print_err(&format!("plush: {}\n", ExecError::NotFound(name.to_string())));
            sys::exit_now(127)
        };
        let env = self.state.vars.exported_pairs();
        let error = match ExecImage::new(&path, argv, &env) {
            Ok(image) => image.exec(),
            Err(err) => err,
        };
        if error.raw_os_error() == Some(libc::ENOEXEC) {
            debug!("{} has no interpreter line; running it as a script", path.display());
            self.run_as_script(&path, argv)
        }
        let err = ExecError::NotExecutable {
            path: path.display().to_string(),
            source: error,
        };
        sys::print_err(&format!("plush: {}\n", err));
        sys::exit_now(err.exit_status())
    }

    fn run_as_script(&mut self, path: &Path, argv: &[String]) -> ! {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(source) => {
                let err = ExecError::NotExecutable {
                    path: path.display().to_string(),
                    source,
                };
                sys::print_err(&format!("plush: {}\n", err));
                sys::exit_now(126)
            }
        };
        self.state.script_name = path.display().to_string();
        self.state.positional = argv.get(1..).unwrap_or_default().to_vec();
        self.state.functions = Default::default();
        let status = self.execute_text(&text);
        self.exit_subshell(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;
    use std::os::unix::fs::PermissionsExt;

    fn write_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_search_path_prefers_executable() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write_file(a.path(), "tool", 0o644);
        let exe = write_file(b.path(), "tool", 0o755);
        let path_var = format!("{}:{}", a.path().display(), b.path().display());
        assert_eq!(search_path(&path_var, "tool"), Some(exe));
    }

    #[test]
    fn test_search_path_not_executable_only() {
        let a = tempfile::tempdir().unwrap();
        let plain = write_file(a.path(), "data", 0o644);
        let path_var = a.path().display().to_string();
        assert_eq!(search_path(&path_var, "data"), Some(plain));
        assert_eq!(search_path(&path_var, "missing"), None);
    }

    #[test]
    fn test_resolution_order_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let exe = write_file(dir.path(), "echo", 0o755);
        write_file(dir.path(), "mytool", 0o755);
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.state.set_var("PATH", dir.path().display().to_string()).unwrap();

        assert_eq!(interp.resolve_command("echo"), Resolved::Builtin);
        assert_eq!(
            interp.resolve_command("mytool"),
            Resolved::External(dir.path().join("mytool"))
        );
        assert!(interp.state.command_cache.contains_key("mytool"));
        assert_eq!(interp.find_in_path("echo"), Some(exe));
        assert_eq!(interp.resolve_command("nosuchcmd123"), Resolved::NotFound);

        interp.execute_text("mytool() { :; }");
        assert_eq!(interp.resolve_command("mytool"), Resolved::Function);

        interp.state.set_var("PATH", "/nonexistent").unwrap();
        assert!(interp.state.command_cache.is_empty());
    }

    #[test]
    fn test_unset_path_uses_default_search_path() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(interp.state.vars.get_scalar("PATH"), None);
        let found = interp.find_in_path("sh").unwrap();
        assert!(DEFAULT_PATH.split(':').any(|dir| found.starts_with(dir)));

        interp.state.set_var("PATH", "/nonexistent").unwrap();
        assert_eq!(interp.find_in_path("sh"), None);
    }

    #[test]
    fn test_slash_names_bypass_path() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        assert_eq!(
            interp.find_in_path("./script.sh"),
            Some(PathBuf::from("./script.sh"))
        );
    }
}
