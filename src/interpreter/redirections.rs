//! Redirection Handling
//!
//! Applies a segment's redirections to the file descriptors of the current
//! process:
//! - `<`, `>`, `>>`, `>|`, `<>`: open a file onto an fd
//! - `&>`, `&>>`: one open shared by stdout and stderr
//! - `<&N`, `>&N`, `>&-`: duplicate or close
//! - `<<`, `<<-`, `<<<`: body written to an unlinked temporary file
//!
//! Builtins, functions and compound commands run in the shell process, so
//! their redirections go through [`SavedFds`]: every fd is copied above
//! [`sys::SAVED_FD_BASE`] before it is first replaced and put back after the
//! command. Forked children apply redirections without saving.
//!
//! An output target named by two redirections in the same command with the
//! same append mode (`>f 2>f`) is opened once and duplicated, so the two
//! streams share one file offset instead of truncating each other.

use std::io::{Seek, SeekFrom, Write};
use std::os::unix::io::{IntoRawFd, RawFd};
use std::path::Path;

use log::{debug, trace};

use crate::ast::types::{Redirection, RedirectionOp};
use crate::interpreter::errors::{ExecError, ExpansionError, ExecResult};
use crate::interpreter::interpreter::Interpreter;
use crate::interpreter::sys;

/// Descriptors replaced by in-process redirections, with their saved copies.
#[derive(Debug, Default)]
pub struct SavedFds {
    /// (fd, copy) in the order first replaced; `None` when fd was closed
    saved: Vec<(RawFd, Option<RawFd>)>,
}

impl SavedFds {
    fn remember(&mut self, fd: RawFd) -> ExecResult<()> {
        if self.saved.iter().any(|(saved, _)| *saved == fd) {
            return Ok(());
        }
        let copy = sys::save_fd(fd).map_err(|e| ExecError::sys("save descriptor", e))?;
        self.saved.push((fd, copy));
        Ok(())
    }

    /// Put every descriptor back, most recent first.
    pub fn restore(self) {
        for (fd, copy) in self.saved.into_iter().rev() {
            match copy {
                Some(copy) => {
                    if let Err(err) = sys::dup2(copy, fd) {
                        debug!("restoring fd {} failed: {}", fd, err);
                    }
                    sys::close(copy);
                }
                None => sys::close(fd),
            }
        }
    }
}

/// Output files opened by the current redirection list.
#[derive(Default)]
struct OpenedOutputs {
    /// (path, append, fd it was placed on)
    entries: Vec<(String, bool, RawFd)>,
}

impl OpenedOutputs {
    fn find(&self, path: &str, append: bool) -> Option<RawFd> {
        self.entries
            .iter()
            .find(|(p, a, _)| p == path && *a == append)
            .map(|(_, _, fd)| *fd)
    }

    fn record(&mut self, path: &str, append: bool, fd: RawFd) {
        self.forget(fd);
        self.entries.push((path.to_string(), append, fd));
    }

    fn forget(&mut self, fd: RawFd) {
        self.entries.retain(|(_, _, placed)| *placed != fd);
    }
}

fn open_flags(op: RedirectionOp) -> libc::c_int {
    match op {
        RedirectionOp::Input => libc::O_RDONLY,
        RedirectionOp::ReadWrite => libc::O_RDWR | libc::O_CREAT,
        RedirectionOp::Append | RedirectionOp::AppendAll => libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
        _ => libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
    }
}

/// Parse the target of `>&` / `<&`: a descriptor number, `-`, or a
/// descriptor followed by `-` (move).
enum DupTarget {
    Close,
    Fd { fd: RawFd, close_source: bool },
    File,
}

fn parse_dup_target(target: &str) -> DupTarget {
    if target == "-" {
        return DupTarget::Close;
    }
    let (digits, close_source) = match target.strip_suffix('-') {
        Some(rest) => (rest, true),
        None => (target, false),
    };
    match digits.parse::<RawFd>() {
        Ok(fd) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            DupTarget::Fd { fd, close_source }
        }
        _ => DupTarget::File,
    }
}

fn place(fd: RawFd, target: RawFd) -> ExecResult<()> {
    if fd != target {
        sys::dup2(fd, target).map_err(|e| ExecError::sys("dup2", e))?;
        sys::close(fd);
    }
    Ok(())
}

impl Interpreter {
    /// Apply `redirections` in order. With `saved`, every replaced fd is
    /// recorded so [`SavedFds::restore`] can undo the whole list.
    pub fn apply_redirections(
        &mut self,
        redirections: &[Redirection],
        mut saved: Option<&mut SavedFds>,
    ) -> ExecResult<()> {
        let mut opened = OpenedOutputs::default();
        for redirection in redirections {
            let fd = redirection.effective_fd();
            if let Some(saved) = saved.as_deref_mut() {
                saved.remember(fd)?;
                if matches!(redirection.op, RedirectionOp::OutputAll | RedirectionOp::AppendAll) {
                    saved.remember(sys::STDERR)?;
                }
            }
            if let (Some(saved), RedirectionOp::DupOutput) = (saved.as_deref_mut(), redirection.op) {
                // `>&file` behaves like `&>file`
                saved.remember(sys::STDERR)?;
            }
            self.apply_one(redirection, fd, &mut opened)?;
        }
        Ok(())
    }

    fn redirect_target(&mut self, redirection: &Redirection) -> ExecResult<String> {
        let target = self.expand_word_to_string(&redirection.target)?;
        if target.is_empty() && !redirection.target.quoted {
            return Err(ExpansionError::AmbiguousRedirect(redirection.target.text.clone()).into());
        }
        Ok(target)
    }

    fn open_target(&mut self, path: &str, op: RedirectionOp) -> ExecResult<RawFd> {
        let clobbering = matches!(op, RedirectionOp::Output | RedirectionOp::OutputAll);
        if clobbering && self.state.options.noclobber {
            if let Ok(meta) = std::fs::metadata(path) {
                if meta.is_file() {
                    return Err(ExecError::Clobber(path.to_string()).into());
                }
            }
        }
        let fd = sys::open(Path::new(path), open_flags(op), 0o666).map_err(|source| ExecError::Redirect {
            target: path.to_string(),
            source,
        })?;
        trace!("opened {} as fd {}", path, fd);
        Ok(fd)
    }

    fn apply_one(&mut self, redirection: &Redirection, fd: RawFd, opened: &mut OpenedOutputs) -> ExecResult<()> {
        match redirection.op {
            RedirectionOp::Input | RedirectionOp::ReadWrite => {
                let path = self.redirect_target(redirection)?;
                let file = self.open_target(&path, redirection.op)?;
                place(file, fd)?;
                opened.forget(fd);
            }
            RedirectionOp::Output | RedirectionOp::Clobber | RedirectionOp::Append => {
                let path = self.redirect_target(redirection)?;
                let append = redirection.op == RedirectionOp::Append;
                match opened.find(&path, append) {
                    Some(existing) if existing != fd => {
                        sys::dup2(existing, fd).map_err(|e| ExecError::sys("dup2", e))?;
                    }
                    _ => {
                        let file = self.open_target(&path, redirection.op)?;
                        place(file, fd)?;
                    }
                }
                opened.record(&path, append, fd);
            }
            RedirectionOp::OutputAll | RedirectionOp::AppendAll => {
                let path = self.redirect_target(redirection)?;
                self.redirect_both(&path, redirection.op, opened)?;
            }
            RedirectionOp::DupInput | RedirectionOp::DupOutput => {
                let target = self.redirect_target(redirection)?;
                match parse_dup_target(&target) {
                    DupTarget::Close => sys::close(fd),
                    DupTarget::Fd { fd: source, close_source } => {
                        if !sys::is_open(source) {
                            return Err(ExecError::BadDescriptor(source.to_string()).into());
                        }
                        sys::dup2(source, fd).map_err(|e| ExecError::sys("dup2", e))?;
                        if close_source && source != fd {
                            sys::close(source);
                        }
                    }
                    DupTarget::File if redirection.op == RedirectionOp::DupOutput && redirection.fd.is_none() => {
                        self.redirect_both(&target, RedirectionOp::OutputAll, opened)?;
                        return Ok(());
                    }
                    DupTarget::File => {
                        return Err(ExecError::BadDescriptor(target).into());
                    }
                }
                opened.forget(fd);
            }
            RedirectionOp::HereDoc | RedirectionOp::HereString => {
                let body = match (&redirection.heredoc, redirection.op) {
                    (Some(doc), RedirectionOp::HereDoc) if doc.expand => self.expand_heredoc(&doc.body)?,
                    (Some(doc), RedirectionOp::HereDoc) => doc.body.clone(),
                    (None, RedirectionOp::HereDoc) => String::new(),
                    _ => {
                        let mut text = self.expand_word_to_string(&redirection.target)?;
                        text.push('\n');
                        text
                    }
                };
                let file = here_document_fd(&body)?;
                place(file, fd)?;
                opened.forget(fd);
            }
        }
        Ok(())
    }

    fn redirect_both(&mut self, path: &str, op: RedirectionOp, opened: &mut OpenedOutputs) -> ExecResult<()> {
        let file = self.open_target(path, op)?;
        place(file, sys::STDOUT)?;
        sys::dup2(sys::STDOUT, sys::STDERR).map_err(|e| ExecError::sys("dup2", e))?;
        let append = op == RedirectionOp::AppendAll;
        opened.record(path, append, sys::STDOUT);
        opened.forget(sys::STDERR);
        Ok(())
    }
}

/// Write `body` to an anonymous temporary file and return a descriptor
/// positioned at its start.
fn here_document_fd(body: &str) -> ExecResult<RawFd> {
    let io_err = |e| ExecError::sys("here-document", e);
    let mut file = tempfile::tempfile().map_err(io_err)?;
    file.write_all(body.as_bytes()).map_err(io_err)?;
    file.seek(SeekFrom::Start(0)).map_err(io_err)?;
    trace!("here-document of {} bytes", body.len());
    Ok(file.into_raw_fd())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{HereDoc, Word};
    use crate::interpreter::types::ShellOptions;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn redirect(fd: Option<i32>, op: RedirectionOp, target: &str) -> Redirection {
        Redirection::new(fd, op, Word::from_raw(target))
    }

    #[test]
    #[serial]
    fn test_output_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let (r, w) = sys::pipe().unwrap();
        // Run against a scratch fd so the harness's stdout is untouched.
        let fd = 40;
        sys::dup2(w, fd).unwrap();

        let mut saved = SavedFds::default();
        let redirs = vec![redirect(Some(fd), RedirectionOp::Output, path.to_str().unwrap())];
        interp.apply_redirections(&redirs, Some(&mut saved)).unwrap();
        sys::write_all(fd, b"to file").unwrap();
        saved.restore();
        sys::write_all(fd, b"to pipe").unwrap();
        sys::close(fd);
        sys::close(w);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "to file");
        assert_eq!(sys::read_to_end(r).unwrap(), b"to pipe");
        sys::close(r);
    }

    #[test]
    #[serial]
    fn test_noclobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists");
        std::fs::write(&path, "keep").unwrap();
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.state.options.noclobber = true;
        let fd = 41;

        let mut saved = SavedFds::default();
        let err = interp
            .apply_redirections(
                &[redirect(Some(fd), RedirectionOp::Output, path.to_str().unwrap())],
                Some(&mut saved),
            )
            .unwrap_err();
        saved.restore();
        assert!(err.to_string().contains("cannot overwrite existing file"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep");

        let mut saved = SavedFds::default();
        interp
            .apply_redirections(
                &[redirect(Some(fd), RedirectionOp::Clobber, path.to_str().unwrap())],
                Some(&mut saved),
            )
            .unwrap();
        saved.restore();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    #[serial]
    fn test_heredoc_expands_body() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        interp.state.vars.set_scalar("NAME", "world").unwrap();
        let fd = 42;
        let mut redir = redirect(Some(fd), RedirectionOp::HereDoc, "EOF");
        redir.heredoc = Some(HereDoc {
            body: "hello $NAME\n".into(),
            expand: true,
        });
        let mut saved = SavedFds::default();
        interp.apply_redirections(&[redir], Some(&mut saved)).unwrap();
        let text = sys::read_to_end(fd).unwrap();
        saved.restore();
        assert_eq!(String::from_utf8(text).unwrap(), "hello world\n");
    }

    #[test]
    #[serial]
    fn test_here_string() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let fd = 43;
        let mut saved = SavedFds::default();
        interp
            .apply_redirections(&[redirect(Some(fd), RedirectionOp::HereString, "'a b'")], Some(&mut saved))
            .unwrap();
        let text = sys::read_to_end(fd).unwrap();
        saved.restore();
        assert_eq!(text, b"a b\n");
    }

    #[test]
    #[serial]
    fn test_shared_target_opened_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("both");
        let p = path.to_str().unwrap();
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let (a, b) = (44, 45);
        let mut saved = SavedFds::default();
        interp
            .apply_redirections(
                &[
                    redirect(Some(a), RedirectionOp::Output, p),
                    redirect(Some(b), RedirectionOp::Output, p),
                ],
                Some(&mut saved),
            )
            .unwrap();
        sys::write_all(a, b"one ").unwrap();
        sys::write_all(b, b"two").unwrap();
        saved.restore();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one two");
    }

    #[test]
    fn test_missing_input_file() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let err = interp
            .apply_redirections(&[redirect(Some(46), RedirectionOp::Input, "/no/such/file")], None)
            .unwrap_err();
        assert!(err.to_string().starts_with("/no/such/file: "));
        assert_eq!(err.exit_status(), 1);
    }

    #[test]
    fn test_ambiguous_redirect() {
        let mut interp = Interpreter::new(ShellOptions::default(), "plush");
        let err = interp
            .apply_redirections(&[redirect(Some(47), RedirectionOp::Output, "$EMPTY")], None)
            .unwrap_err();
        assert!(err.to_string().contains("ambiguous redirect"));
    }

    #[test]
    fn test_parse_dup_target() {
        assert!(matches!(parse_dup_target("-"), DupTarget::Close));
        assert!(matches!(
            parse_dup_target("2"),
            DupTarget::Fd { fd: 2, close_source: false }
        ));
        assert!(matches!(
            parse_dup_target("3-"),
            DupTarget::Fd { fd: 3, close_source: true }
        ));
        assert!(matches!(parse_dup_target("file"), DupTarget::File));
    }
}
