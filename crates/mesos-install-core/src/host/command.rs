//! External command invocation.
//!
//! Every package-manager, archive and init-system call goes through the
//! [`CommandRunner`] seam so the workflow can be exercised against a fake host.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use tracing::debug;

/// A fully specified command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
        }
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

    /// Append a path argument.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().to_string())
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn failure(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.stdout = stdout.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// A command exited unsuccessfully.
#[derive(Debug, Clone, thiserror::Error)]
#[error("command `{command}` failed with {status}: {stderr}")]
pub struct CommandError {
    pub command: String,
    pub status: String,
    pub stderr: String,
}

impl CommandError {
    fn new(spec: &CommandSpec, output: &CommandOutput) -> Self {
        let status = match output.code {
            Some(code) => format!("exit code {}", code),
            None => "signal".to_string(),
        };
        Self {
            command: spec.to_string(),
            status,
            stderr: output.stderr.trim().to_string(),
        }
    }
}

/// Runs external commands on the host.
pub trait CommandRunner {
    /// Run the command and capture its output.
    ///
    /// A non-zero exit is not an error here; it is reported through
    /// [`CommandOutput::code`]. Only failure to spawn is an error.
    fn run(&self, spec: &CommandSpec) -> anyhow::Result<CommandOutput>;

    /// Run the command and fail on a non-zero exit.
    fn run_checked(&self, spec: &CommandSpec) -> anyhow::Result<CommandOutput> {
        let output = self.run(spec)?;
        if !output.is_success() {
            return Err(CommandError::new(spec, &output).into());
        }
        Ok(output)
    }

    /// Run the command and report whether it exited zero.
    fn succeeds(&self, spec: &CommandSpec) -> anyhow::Result<bool> {
        Ok(self.run(spec)?.is_success())
    }
}

/// Runs commands with [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> anyhow::Result<CommandOutput> {
        debug!(command = %spec, cwd = ?spec.cwd, "running command");

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let output = cmd
            .output()
            .with_context(|| format!("Failed to run {}", spec))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
