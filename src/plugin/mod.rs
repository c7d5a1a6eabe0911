//! Drivers running as separate executables.
//!
//! The CLI side finds `docker-machine-driver-<name>`, starts it, reads the
//! listener address it prints on its first stdout line and talks to it over
//! [`crate::rpc`]. The plugin side is [`serve_driver`].

mod discovery;
mod launcher;
mod serve;

use std::io;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::rpc::RpcError;

pub use discovery::{PluginSearch, binary_name};
pub use launcher::PluginLauncher;
pub use serve::serve_driver;

/// Environment variable that marks a process as launched by the CLI.
pub const PLUGIN_ENV_KEY: &str = "MACHINE_PLUGIN_TOKEN";
/// Expected value of [`PLUGIN_ENV_KEY`].
pub const PLUGIN_ENV_VALUE: &str = "42";
/// Environment variable enabling debug output in plugins.
pub const DEBUG_ENV_KEY: &str = "MACHINE_DEBUG";
/// Time a plugin has to announce its address.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Prefix of every plugin binary name.
pub const BINARY_PREFIX: &str = "docker-machine-driver-";

/// Failures while finding or starting a driver plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Raised when no plugin binary matches the driver name.
    #[error(
        "Driver \"{driver}\" not found. Do you have the plugin binary accessible in your PATH?"
    )]
    NotFound {
        /// Requested driver name.
        driver: String,
    },
    /// Raised when the plugin process cannot be started.
    #[error("failed to start driver plugin {binary}: {source}")]
    Spawn {
        /// Path of the binary.
        binary: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Raised when the plugin closes stdout before announcing an address.
    #[error("driver plugin {driver} exited before announcing its address")]
    HandshakeEof {
        /// Driver name.
        driver: String,
    },
    /// Raised when the address line does not arrive in time.
    #[error("timed out after {timeout:?} waiting for driver plugin {driver} to start")]
    HandshakeTimeout {
        /// Driver name.
        driver: String,
        /// Time waited.
        timeout: Duration,
    },
    /// Raised when the first stdout line is not a socket address.
    #[error("driver plugin {driver} announced an invalid address: {line:?}")]
    InvalidAddress {
        /// Driver name.
        driver: String,
        /// Line received.
        line: String,
    },
    /// Raised when reading the plugin's stdout fails.
    #[error("failed to read from driver plugin {driver}: {source}")]
    Io {
        /// Driver name.
        driver: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// Raised when the RPC connection cannot be established.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

#[cfg(test)]
mod tests;
