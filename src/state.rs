//! Power state reported by drivers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalised power state of a host's backing resource.
///
/// Each driver maps its provider's native status onto one of these values.
/// The mapping is owned by the driver and is not required to agree across
/// providers.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum State {
    /// The state is unknown or the provider reported an unmapped status.
    #[default]
    None,
    /// The resource is booting.
    Starting,
    /// The resource is up.
    Running,
    /// The resource is suspended in memory.
    Paused,
    /// The resource is suspended to disk.
    Saved,
    /// The resource is shutting down.
    Stopping,
    /// The resource is powered off.
    Stopped,
    /// The state could not be determined because the driver failed.
    Error,
}

impl State {
    /// Returns the label used in listings and over the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Paused => "Paused",
            Self::Saved => "Saved",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a string does not name a [`State`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown state '{0}'")]
pub struct ParseStateError(pub String);

impl FromStr for State {
    type Err = ParseStateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "" | "None" => Ok(Self::None),
            "Starting" => Ok(Self::Starting),
            "Running" => Ok(Self::Running),
            "Paused" => Ok(Self::Paused),
            "Saved" => Ok(Self::Saved),
            "Stopping" => Ok(Self::Stopping),
            "Stopped" => Ok(Self::Stopped),
            "Error" => Ok(Self::Error),
            other => Err(ParseStateError(other.to_owned())),
        }
    }
}
