//! Error type shared by every driver.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wait::WaitError;

/// Errors raised by driver operations.
///
/// The type is serialisable so a plugin can return it over RPC and the
/// caller receives the same variant it would have seen in-process.
#[derive(Clone, Debug, Error, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum DriverError {
    /// The driver cannot perform the requested operation.
    #[error("{0}")]
    NotSupported(String),
    /// A mandatory option was not supplied.
    #[error("{0}")]
    MissingOption(String),
    /// An option was supplied but cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The provider API rejected a request.
    #[error(
        "provider error{}: {message}",
        .status.map_or_else(String::new, |code| format!(" (status {code})"))
    )]
    Provider {
        /// HTTP status returned by the provider, when known.
        status: Option<u16>,
        /// Message returned by the provider.
        message: String,
    },
    /// A poll loop gave up before the resource reached the wanted state.
    #[error("timeout waiting for {action}")]
    Timeout {
        /// Operation being waited on.
        action: String,
    },
    /// The resource has no address yet.
    #[error("IP address is not set")]
    MissingAddress,
    /// An external command exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Command {
        /// Program that was executed.
        program: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },
    /// The RPC transport failed.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// Local file access failed.
    #[error("i/o error: {0}")]
    Io(String),
}

impl DriverError {
    /// Builds a [`DriverError::Provider`] without a status code.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            status: None,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidConfig(value.to_string())
    }
}

impl From<WaitError<Self>> for DriverError {
    fn from(value: WaitError<Self>) -> Self {
        match value {
            WaitError::Timeout { action, .. } => Self::Timeout { action },
            WaitError::Check(err) => err,
        }
    }
}
