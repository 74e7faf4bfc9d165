//! External Process Runner
//!
//! Every external tool (dump/restore, ssh, nextflow, bcftools, the
//! validators) is started through the [`ProcessRunner`] capability so that
//! callers can be exercised against a fake that records invocations.

use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};

use log::debug;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::error::{ReleaseError, Result};

/// Characters that never need quoting on a shell command line.
fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-./:=,@+%".contains(c)
}

/// Quotes a word for a POSIX shell, leaving plain words untouched.
pub fn shell_quote(word: &str) -> String {
    if !word.is_empty() && word.chars().all(is_shell_safe) {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// A program and its arguments, ready to be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Builds a command from a path-valued program.
    pub fn from_path(program: &Path) -> Self {
        Self::new(program.display().to_string())
    }

    /// Runs a pipeline or redirection through `bash -c`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("bash").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends a `--name value` pair.
    pub fn option(self, name: &str, value: impl Into<String>) -> Self {
        self.arg(name).arg(value)
    }

    /// Value following the first occurrence of `name`, if any.
    pub fn option_value(&self, name: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == name)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Capability to start external processes.
pub trait ProcessRunner: Send + Sync {
    /// Runs a command to completion and returns its exit status.
    fn run(&self, command: &CommandSpec) -> Result<i32>;

    /// Starts a command in the background and returns its process id.
    fn spawn_detached(&self, command: &CommandSpec) -> Result<u32>;

    /// Sends the termination signal to a process started by this runner.
    fn terminate(&self, pid: u32) -> Result<()>;

    /// Runs a command and turns a nonzero exit status into an error.
    fn run_checked(&self, command: &CommandSpec) -> Result<()> {
        match self.run(command)? {
            0 => Ok(()),
            code => Err(ReleaseError::command_failed(command.program.clone(), code)),
        }
    }
}

/// Runs commands as real OS processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &CommandSpec) -> Result<i32> {
        debug!("Running: {}", command);
        let status = command.to_command().status()?;
        // Killed by a signal: no exit code
        Ok(status.code().unwrap_or(-1))
    }

    fn spawn_detached(&self, command: &CommandSpec) -> Result<u32> {
        debug!("Spawning in background: {}", command);
        let child = command.to_command().stdin(Stdio::null()).spawn()?;
        Ok(child.id())
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        let raw = i32::try_from(pid).map_err(|_| ReleaseError::Signal {
            pid,
            reason: "pid out of range".to_string(),
        })?;

        kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|e| ReleaseError::Signal {
            pid,
            reason: e.to_string(),
        })
    }
}
