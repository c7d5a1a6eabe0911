//! Error types for the Scaleway driver.

use scaleway_rs::ScalewayError;
use thiserror::Error;

use crate::driver::DriverError;
use crate::wait::WaitError;

/// Errors raised while talking to the Scaleway Instances API.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScalewayDriverError {
    /// Raised when a mandatory option is empty.
    #[error("{0}")]
    Config(String),
    /// Raised when the requested image label cannot be resolved.
    #[error("image '{label}' (arch {arch}) not found in zone {zone}")]
    ImageNotFound {
        /// Image label passed by the caller.
        label: String,
        /// Architecture requested by the caller.
        arch: String,
        /// Zone used for the lookup.
        zone: String,
    },
    /// Raised when the server type is not available in the selected zone.
    #[error("instance type '{instance_type}' not available in zone {zone}")]
    InstanceTypeUnavailable {
        /// Requested commercial type.
        instance_type: String,
        /// Target zone.
        zone: String,
    },
    /// Raised when an operation runs before the server exists.
    #[error("no Scaleway server has been created for this host")]
    NotCreated,
    /// Raised when the API no longer knows the server.
    #[error("server {server_id} not found")]
    ServerNotFound {
        /// Provider server identifier.
        server_id: String,
    },
    /// Raised when a wait loop exceeds its timeout.
    #[error("timeout waiting for {action} on server {server_id}")]
    Timeout {
        /// Action being waited on.
        action: String,
        /// Provider server identifier.
        server_id: String,
    },
    /// Raised when the server reached `running` but never exposed an address.
    #[error("server {server_id} missing public IPv4 address")]
    MissingPublicIp {
        /// Provider server identifier.
        server_id: String,
    },
    /// Raised when deletion leaves the server visible in the API.
    #[error("server {server_id} still present after removal")]
    ResidualResource {
        /// Provider server identifier.
        server_id: String,
    },
    /// Raised when the server's state forbids an action.
    #[error("server {server_id} in state {state} does not allow {action}")]
    ActionNotAllowed {
        /// Provider server identifier.
        server_id: String,
        /// Action that was refused.
        action: String,
        /// Current state reported by the provider.
        state: String,
    },
    /// Wrapper for provider level failures.
    #[error("{message}")]
    Provider {
        /// Message returned by the provider SDK.
        message: String,
    },
}

impl ScalewayDriverError {
    pub(crate) fn from_wait(error: WaitError<Self>, server_id: &str) -> Self {
        match error {
            WaitError::Timeout { action, .. } => Self::Timeout {
                action,
                server_id: server_id.to_owned(),
            },
            WaitError::Check(err) => err,
        }
    }
}

impl From<ScalewayError> for ScalewayDriverError {
    fn from(value: ScalewayError) -> Self {
        Self::Provider {
            message: value.to_string(),
        }
    }
}

impl From<ScalewayDriverError> for DriverError {
    fn from(value: ScalewayDriverError) -> Self {
        match value {
            ScalewayDriverError::Config(message) => Self::MissingOption(message),
            ScalewayDriverError::Timeout { action, server_id } => Self::Timeout {
                action: format!("{action} on server {server_id}"),
            },
            ScalewayDriverError::ImageNotFound { .. }
            | ScalewayDriverError::InstanceTypeUnavailable { .. }
            | ScalewayDriverError::NotCreated => Self::InvalidConfig(value.to_string()),
            ScalewayDriverError::ServerNotFound { .. }
            | ScalewayDriverError::MissingPublicIp { .. }
            | ScalewayDriverError::ResidualResource { .. }
            | ScalewayDriverError::ActionNotAllowed { .. }
            | ScalewayDriverError::Provider { .. } => Self::provider(value.to_string()),
        }
    }
}
