//! cd, pwd - Working directory builtins
//!
//! Supports:
//! - cd [dir] - change to directory (HOME when omitted)
//! - cd - - change to OLDPWD and print it
//! - cd -L / -P - logical (default) or physical path
//! - CDPATH search for relative names not starting with `.` or `/`
//! - pwd [-L|-P]

use std::path::Path;

use crate::interpreter::builtins::{io_message, BuiltinResult};
use crate::interpreter::interpreter::Interpreter;

/// Handle the cd builtin command
pub fn handle_cd(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let mut physical = false;
    let mut rest = args;
    while let Some(arg) = rest.first() {
        match arg.as_str() {
            "--" => {
                rest = &rest[1..];
                break;
            }
            "-L" => physical = false,
            "-P" => physical = true,
            "-" => break,
            a if a.starts_with('-') && a.len() > 1 => {
                return BuiltinResult::failure(
                    &format!("plush: cd: {}: invalid option\ncd: usage: cd [-L|-P] [dir]\n", a),
                    2,
                );
            }
            _ => break,
        }
        rest = &rest[1..];
    }
    if rest.len() > 1 {
        return BuiltinResult::failure("plush: cd: too many arguments\n", 1);
    }

    let vars = &interp.state.vars;
    let mut print_path = false;
    let mut target = match rest.first().map(String::as_str) {
        None => match vars.get_scalar("HOME") {
            Some(home) if !home.is_empty() => home.to_string(),
            _ => return BuiltinResult::failure("plush: cd: HOME not set\n", 1),
        },
        Some("-") => match vars.get_scalar("OLDPWD") {
            Some(old) if !old.is_empty() => {
                print_path = true;
                old.to_string()
            }
            _ => return BuiltinResult::failure("plush: cd: OLDPWD not set\n", 1),
        },
        Some(dir) => dir.to_string(),
    };

    let searchable = !target.starts_with('/')
        && target != "."
        && target != ".."
        && !target.starts_with("./")
        && !target.starts_with("../");
    if searchable {
        if let Some(cdpath) = vars.get_scalar("CDPATH") {
            for dir in cdpath.split(':').filter(|d| !d.is_empty()) {
                let candidate = format!("{}/{}", dir.trim_end_matches('/'), target);
                if Path::new(&candidate).is_dir() {
                    target = candidate;
                    print_path = true;
                    break;
                }
            }
        }
    }

    let current = logical_cwd(interp);
    let logical = if target.starts_with('/') {
        normalize_path(&target)
    } else {
        normalize_path(&format!("{}/{}", current, target))
    };

    if let Err(err) = std::env::set_current_dir(&logical) {
        return BuiltinResult::failure(
            &format!("plush: cd: {}: {}\n", target, io_message(&err)),
            1,
        );
    }

    let new_pwd = if physical {
        match std::env::current_dir() {
            Ok(dir) => dir.to_string_lossy().into_owned(),
            Err(_) => logical,
        }
    } else {
        logical
    };

    let state = &mut interp.state;
    if let Err(err) = state.set_var("OLDPWD", current) {
        return BuiltinResult::failure(&format!("plush: cd: {}\n", err), 1);
    }
    if let Err(err) = state.set_var("PWD", new_pwd.clone()) {
        return BuiltinResult::failure(&format!("plush: cd: {}\n", err), 1);
    }

    if print_path {
        BuiltinResult::output(format!("{}\n", new_pwd))
    } else {
        BuiltinResult::ok()
    }
}

/// Handle the pwd builtin command
pub fn handle_pwd(interp: &mut Interpreter, args: &[String]) -> BuiltinResult {
    let mut physical = false;
    for arg in args {
        match arg.as_str() {
            "-L" => physical = false,
            "-P" => physical = true,
            other => {
                return BuiltinResult::failure(
                    &format!("plush: pwd: {}: invalid option\n", other),
                    2,
                )
            }
        }
    }
    if physical {
        return match std::env::current_dir() {
            Ok(dir) => BuiltinResult::output(format!("{}\n", dir.display())),
            Err(err) => BuiltinResult::failure(&format!("plush: pwd: {}\n", io_message(&err)), 1),
        };
    }
    BuiltinResult::output(format!("{}\n", logical_cwd(interp)))
}

/// `$PWD` when it still names the current directory, else the physical path.
fn logical_cwd(interp: &Interpreter) -> String {
    let physical = std::env::current_dir()
        .map(|d| d.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "/".to_string());
    match interp.state.vars.get_scalar("PWD") {
        Some(pwd) if pwd.starts_with('/') && same_file(pwd, &physical) => pwd.to_string(),
        _ => physical,
    }
}

fn same_file(a: &str, b: &str) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(x), Ok(y)) => x.dev() == y.dev() && x.ino() == y.ino(),
        _ => false,
    }
}

/// Normalize a path by resolving . and .. components
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}
