//! Output of the commands that print something for the user or their shell.
//!
//! Rendering is kept apart from the binary so the exact text can be tested
//! without spawning processes.

mod env;
mod filter;
mod listing;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::machine::{DriverLoader, Machine, MachineError};
use crate::state::State;

pub use env::{EnvSettings, Shell, UnknownShellError, render_unset};
pub use filter::{FilterError, ListFilter};
pub use listing::{render_names, render_table};

/// Failures while preparing command output.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Raised by the underlying host operation.
    #[error(transparent)]
    Machine(#[from] MachineError),
    /// Raised when connection settings are requested for a stopped host.
    #[error("{name} is not running. Please start it with docker-machine start {name}")]
    NotRunning {
        /// Host name.
        name: String,
    },
}

/// Client-side TLS material referenced by `config`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsPaths {
    /// CA certificate.
    pub ca_cert: Utf8PathBuf,
    /// Client certificate.
    pub client_cert: Utf8PathBuf,
    /// Client private key.
    pub client_key: Utf8PathBuf,
}

impl TlsPaths {
    /// The standard file names inside `cert_dir`.
    #[must_use]
    pub fn in_dir(cert_dir: &Utf8Path) -> Self {
        Self {
            ca_cert: cert_dir.join("ca.pem"),
            client_cert: cert_dir.join("cert.pem"),
            client_key: cert_dir.join("key.pem"),
        }
    }
}

/// Name and Docker URL of a running host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    /// Host name.
    pub name: String,
    /// Docker daemon URL.
    pub url: String,
}

/// Resolves the Docker URL of `name` (or the active host), requiring the
/// host to be running.
///
/// # Errors
///
/// Returns [`CommandError::NotRunning`] for a host in any other state, or
/// the underlying [`MachineError`].
pub async fn connection<L: DriverLoader + 'static>(
    machine: &Machine<L>,
    name: Option<&str>,
) -> Result<Connection, CommandError> {
    let host = machine.resolve_host(name)?;
    let state = machine.state(Some(&host.name)).await?;
    if state != State::Running {
        return Err(CommandError::NotRunning { name: host.name });
    }
    let url = machine.url(Some(&host.name)).await?;
    Ok(Connection {
        name: host.name,
        url,
    })
}

/// Renders the Docker client flags for a connection, as printed by `config`.
#[must_use]
pub fn render_client_flags(connection: &Connection, tls: &TlsPaths) -> String {
    format!(
        "--tlsverify --tlscacert={:?} --tlscert={:?} --tlskey={:?} -H={}",
        tls.ca_cert.as_str(),
        tls.client_cert.as_str(),
        tls.client_key.as_str(),
        connection.url
    )
}

#[cfg(test)]
mod tests;
