//! Command runner abstraction used for SSH invocations.

use std::ffi::OsString;
use std::fmt;
use std::process::Command;

use thiserror::Error;

use crate::driver::DriverError;

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Converts a failed run into a [`DriverError::Command`].
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Command`] unless the exit code is zero.
    pub fn into_result(self, program: &str) -> Result<Self, DriverError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(DriverError::Command {
            program: program.to_owned(),
            status: self
                .code
                .map_or_else(|| String::from("no exit status"), |code| format!("status {code}")),
            stderr: self.stderr.trim().to_owned(),
        })
    }
}

/// Raised when a command cannot be started.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("failed to spawn {program}: {message}")]
pub struct SpawnError {
    /// Program that could not be started.
    pub program: String,
    /// Operating system error text.
    pub message: String,
}

impl From<SpawnError> for DriverError {
    fn from(value: SpawnError) -> Self {
        Self::Command {
            program: value.program,
            status: String::from("spawn failure"),
            stderr: value.message,
        }
    }
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner: fmt::Debug + Send + Sync {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SpawnError>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SpawnError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| SpawnError {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
