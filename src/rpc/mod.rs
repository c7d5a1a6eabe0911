//! Driver calls across a process boundary.
//!
//! [`RpcServerDriver`] exposes a concrete [`Driver`](crate::driver::Driver)
//! on a loopback TCP listener; [`RpcClientDriver`] implements the same trait
//! by forwarding every call to such a server.

mod client;
mod protocol;
mod server;

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::driver::DriverError;

pub use client::{RpcClientDriver, RpcConnection};
pub use protocol::{API_VERSION, Method, RpcRequest, RpcResponse, write_message};
pub use server::{RpcServerDriver, ServeOutcome};

/// Interval between client heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(200);

/// How long a server waits for a heartbeat before shutting itself down.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport failures between client and plugin.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Raised when the socket fails.
    #[error("rpc transport error: {0}")]
    Io(#[from] io::Error),
    /// Raised when a message cannot be encoded or decoded.
    #[error("malformed rpc message: {0}")]
    Codec(#[from] serde_json::Error),
    /// Raised when the peer closes the connection mid-call.
    #[error("connection closed by driver plugin")]
    Disconnected,
    /// Raised when a response answers a different request.
    #[error("response id {got} does not match request id {expected}")]
    MismatchedResponse {
        /// Id sent.
        expected: String,
        /// Id received.
        got: String,
    },
    /// Raised when the plugin answers a handshake call with a driver error.
    #[error("driver plugin rejected the call: {0}")]
    Remote(DriverError),
    /// Raised when the plugin speaks another protocol revision.
    #[error("Driver binary uses an incompatible API version ({0})")]
    IncompatibleVersion(i64),
}

impl From<RpcError> for DriverError {
    fn from(value: RpcError) -> Self {
        match value {
            RpcError::Remote(err) => err,
            other => Self::Rpc(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests;
