//! SSH invocation building shared by drivers and the CLI.
//!
//! Drivers describe how to reach their host with an [`SshTarget`]; the
//! resulting [`SshCommand`] is plain data so it can cross the plugin boundary
//! and be executed by the parent process. File copies reuse the same target
//! through [`scp_command`].

mod runner;
mod scp;

use std::ffi::OsString;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shell_escape::unix::escape;

use crate::driver::DriverError;

pub use runner::{CommandOutput, CommandRunner, ProcessCommandRunner, SpawnError};
pub use scp::{ScpEndpoint, scp_command};

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

const SSH_BIN: &str = "ssh";

/// Client options applied to every connection. Hosts are short-lived and
/// re-addressed often, so host keys are not pinned.
const SSH_OPTIONS: [&str; 7] = [
    "StrictHostKeyChecking=no",
    "UserKnownHostsFile=/dev/null",
    "LogLevel=quiet",
    "ConnectionAttempts=3",
    "ConnectTimeout=10",
    "ControlMaster=no",
    "ControlPath=none",
];

/// Connection details for one host.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SshTarget {
    /// Hostname or IP address.
    pub host: String,
    /// TCP port of the SSH daemon.
    pub port: u16,
    /// Remote user.
    pub user: String,
    /// Private key file, when the host needs a specific identity.
    pub identity_file: Option<String>,
}

impl SshTarget {
    /// Builds the SSH invocation that runs `remote_args` on this host, or an
    /// interactive session when `remote_args` is empty.
    #[must_use]
    pub fn command(&self, remote_args: &[String]) -> SshCommand {
        let mut args = Vec::with_capacity(SSH_OPTIONS.len() * 2 + remote_args.len() + 6);
        for option in SSH_OPTIONS {
            args.push(String::from("-o"));
            args.push(option.to_owned());
        }
        if let Some(identity) = self.identity_file.as_deref().filter(|path| !path.is_empty()) {
            args.push(String::from("-o"));
            args.push(String::from("IdentitiesOnly=yes"));
            args.push(String::from("-i"));
            args.push(expand_tilde(identity));
        }
        args.push(String::from("-p"));
        args.push(self.port.to_string());
        args.push(format!("{}@{}", self.user, self.host));
        args.extend(remote_args.iter().cloned());

        SshCommand {
            program: SSH_BIN.to_owned(),
            args,
        }
    }

    /// Runs a shell command on the host through `runner`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Command`] when SSH cannot be spawned or the
    /// remote command exits unsuccessfully.
    pub fn run(
        &self,
        runner: &dyn CommandRunner,
        remote_command: &str,
    ) -> Result<CommandOutput, DriverError> {
        let command = self.command(&[remote_command.to_owned()]);
        tracing::debug!(command = %command.render(), "running remote command");
        runner
            .run(&command.program, &command.os_args())?
            .into_result(&command.program)
    }

    /// Runs a shell command on the host from tokio's blocking pool, so a
    /// long remote command does not stall the runtime's workers.
    ///
    /// # Errors
    ///
    /// As [`SshTarget::run`], plus [`DriverError::Io`] when the blocking task
    /// panics or is cancelled.
    pub async fn run_async(
        self,
        runner: Arc<dyn CommandRunner>,
        remote_command: String,
    ) -> Result<CommandOutput, DriverError> {
        tokio::task::spawn_blocking(move || self.run(runner.as_ref(), &remote_command))
            .await
            .map_err(|err| DriverError::Io(format!("remote command task failed: {err}")))?
    }
}

/// A fully-resolved SSH invocation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SshCommand {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

impl SshCommand {
    /// Arguments as `OsString`s for process spawning.
    #[must_use]
    pub fn os_args(&self) -> Vec<OsString> {
        self.args.iter().map(OsString::from).collect()
    }

    /// Renders the invocation as a copy-pasteable shell line.
    #[must_use]
    pub fn render(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|part| escape(part.as_str().into()).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Expands a leading `~/` prefix to the user's home directory.
///
/// The input is returned unchanged when `HOME` is unset.
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}
