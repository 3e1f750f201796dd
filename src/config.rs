//! Command-line configuration
//!
//! [`ShellConfig`] is the parsed command line. It turns into the
//! interpreter's [`ShellOptions`] and [`ExecutionLimits`] and tells the
//! driver where its input comes from.

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;
use thiserror::Error;

use crate::interpreter::types::{ExecutionLimits, ShellOptions};

/// Overrides the soft line-length limit.
pub const MAX_LINE_LENGTH_ENV: &str = "PLUSH_MAX_LINE_LENGTH";
/// Log level used when `--log-level` is absent.
pub const LOG_LEVEL_ENV: &str = "PLUSH_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}: invalid option name")]
    UnknownOption(String),

    #[error("{name}: invalid number: {value}")]
    InvalidNumber { name: String, value: String },

    #[error("{0}: invalid log level")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "plush", version, about = "A small POSIX-like command shell")]
pub struct ShellConfig {
    /// Read commands from COMMAND instead of a script or stdin
    #[arg(short = 'c', value_name = "COMMAND")]
    pub command: Option<String>,

    /// Exit on the first failing command (set -e)
    #[arg(short = 'e')]
    pub errexit: bool,

    /// Treat unset variables as an error (set -u)
    #[arg(short = 'u')]
    pub nounset: bool,

    /// Trace commands before running them (set -x)
    #[arg(short = 'x')]
    pub xtrace: bool,

    /// Echo input lines as they are read (set -v)
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Force interactive mode
    #[arg(short = 'i')]
    pub interactive: bool,

    /// Enable a named option, as with `set -o`
    #[arg(short = 'o', value_name = "OPTION")]
    pub set_options: Vec<String>,

    /// Log level: off, error, warn, info, debug or trace
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Write log records to PATH instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Longest accepted input line, in bytes
    #[arg(long, value_name = "N")]
    pub max_line_length: Option<usize>,

    /// Script to run; with -c, the value of $0
    pub script: Option<String>,

    /// Positional parameters
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Where the shell reads its commands from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(String),
    Script(PathBuf),
    Stdin,
}

impl ShellConfig {
    pub fn input(&self) -> Input {
        match (&self.command, &self.script) {
            (Some(command), _) => Input::Command(command.clone()),
            (None, Some(script)) => Input::Script(PathBuf::from(script)),
            (None, None) => Input::Stdin,
        }
    }

    /// `$0`: the script path, the name given after `-c COMMAND`, or the
    /// shell's own name.
    pub fn script_name(&self) -> String {
        self.script.clone().unwrap_or_else(|| "plush".to_string())
    }

    pub fn options(&self) -> Result<ShellOptions, ConfigError> {
        let mut options = ShellOptions {
            errexit: self.errexit,
            nounset: self.nounset,
            xtrace: self.xtrace,
            verbose: self.verbose,
            interactive: self.interactive,
            ..ShellOptions::default()
        };
        for name in &self.set_options {
            if !options.set_by_name(name, true) {
                return Err(ConfigError::UnknownOption(name.clone()));
            }
        }
        Ok(options)
    }

    pub fn limits(&self) -> Result<ExecutionLimits, ConfigError> {
        self.limits_with_env(std::env::var(MAX_LINE_LENGTH_ENV).ok())
    }

    fn limits_with_env(&self, env_value: Option<String>) -> Result<ExecutionLimits, ConfigError> {
        let mut limits = ExecutionLimits::default();
        if let Some(length) = self.max_line_length {
            limits.max_line_length = length;
        } else if let Some(value) = env_value {
            limits.max_line_length = value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                name: MAX_LINE_LENGTH_ENV.to_string(),
                value,
            })?;
        }
        Ok(limits)
    }

    /// Requested log level, `None` when logging stays off.
    pub fn log_level(&self) -> Result<Option<LevelFilter>, ConfigError> {
        let requested = self
            .log_level
            .clone()
            .or_else(|| std::env::var(LOG_LEVEL_ENV).ok());
        match requested {
            None => Ok(None),
            Some(level) => level
                .parse::<LevelFilter>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidLogLevel(level)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> ShellConfig {
        ShellConfig::try_parse_from(std::iter::once("plush").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_input_selection() {
        assert_eq!(parse(&["-c", "echo hi"]).input(), Input::Command("echo hi".into()));
        assert_eq!(parse(&["run.sh", "a"]).input(), Input::Script("run.sh".into()));
        assert_eq!(parse(&[]).input(), Input::Stdin);
    }

    #[test]
    fn test_positional_arguments() {
        let config = parse(&["-c", "echo $1", "name", "one", "-two"]);
        assert_eq!(config.script_name(), "name");
        assert_eq!(config.args, vec!["one".to_string(), "-two".to_string()]);
    }

    #[test]
    fn test_options() {
        let options = parse(&["-e", "-x", "-o", "pipefail"]).options().unwrap();
        assert!(options.errexit && options.xtrace && options.pipefail);
        assert!(!options.nounset);
        assert!(matches!(
            parse(&["-o", "bogus"]).options(),
            Err(ConfigError::UnknownOption(name)) if name == "bogus"
        ));
    }

    #[test]
    fn test_limits() {
        let config = parse(&[]);
        assert_eq!(
            config.limits_with_env(None).unwrap().max_line_length,
            ExecutionLimits::default().max_line_length
        );
        assert_eq!(config.limits_with_env(Some("64".into())).unwrap().max_line_length, 64);
        assert!(config.limits_with_env(Some("lots".into())).is_err());
        let flagged = parse(&["--max-line-length", "10"]);
        assert_eq!(flagged.limits_with_env(Some("64".into())).unwrap().max_line_length, 10);
    }

    #[test]
    fn test_log_level() {
        assert_eq!(parse(&["--log-level", "debug"]).log_level().unwrap(), Some(LevelFilter::Debug));
        assert!(parse(&["--log-level", "loud"]).log_level().is_err());
    }
}
