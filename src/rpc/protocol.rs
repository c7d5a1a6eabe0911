//! Wire messages exchanged between a CLI process and a driver plugin.
//!
//! Each message is one JSON object followed by a newline.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use super::RpcError;
use crate::driver::DriverError;

/// Protocol revision spoken by this build.
pub const API_VERSION: i64 = 1;

/// Remote procedures a plugin serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// Returns [`API_VERSION`].
    GetVersion,
    /// Keeps the plugin alive.
    Heartbeat,
    /// Shuts the plugin down after replying.
    Close,
    /// Returns the driver's name.
    DriverName,
    /// Returns the driver's creation flags.
    GetCreateFlags,
    /// Returns the persisted driver JSON.
    GetConfigRaw,
    /// Replaces the persisted driver JSON.
    SetConfigRaw,
    /// Applies creation options.
    SetConfigFromFlags,
    /// Validates before creation.
    PreCreateCheck,
    /// Returns the managed host's name.
    GetMachineName,
    /// Provisions the resource.
    Create,
    /// Deletes the resource.
    Remove,
    /// Powers on.
    Start,
    /// Powers off.
    Stop,
    /// Reboots.
    Restart,
    /// Forces power off.
    Kill,
    /// Upgrades Docker.
    Upgrade,
    /// Returns the address.
    #[serde(rename = "GetIP")]
    GetIp,
    /// Returns the Docker URL.
    #[serde(rename = "GetURL")]
    GetUrl,
    /// Returns the power state.
    GetState,
    /// Returns the SSH invocation for the given arguments.
    #[serde(rename = "GetSSHCommand")]
    GetSshCommand,
    /// Returns the SSH connection details.
    #[serde(rename = "GetSSHTarget")]
    GetSshTarget,
}

/// A call from client to plugin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Correlates the response with this request.
    pub id: String,
    /// Procedure to run.
    pub method: Method,
    /// Method arguments; `null` when the method takes none.
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Builds a request with a fresh id.
    #[must_use]
    pub fn new(method: Method, params: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method,
            params,
        }
    }
}

/// The plugin's answer to an [`RpcRequest`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Id of the request being answered.
    pub id: String,
    /// Successful return value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Driver failure, carried unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DriverError>,
}

impl RpcResponse {
    /// Wraps a dispatch outcome.
    #[must_use]
    pub fn from_result(id: String, outcome: Result<Value, DriverError>) -> Self {
        match outcome {
            Ok(value) => Self {
                id,
                result: Some(value),
                error: None,
            },
            Err(err) => Self {
                id,
                result: None,
                error: Some(err),
            },
        }
    }

    /// Converts back into the driver-level result. A response with neither
    /// field carries `null`.
    ///
    /// # Errors
    ///
    /// Returns the carried [`DriverError`].
    pub fn into_result(self) -> Result<Value, DriverError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Writes one message and its terminating newline.
///
/// # Errors
///
/// Returns [`RpcError`] when encoding or writing fails.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), RpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
