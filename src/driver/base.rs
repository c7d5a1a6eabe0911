//! Fields every driver persists.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use super::DriverError;
use crate::ssh::{DEFAULT_SSH_PORT, SshTarget};

/// Common driver state flattened into each driver's JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseDriver {
    /// Name of the host the driver manages.
    #[serde(rename = "MachineName")]
    pub machine_name: String,
    /// Directory holding the host's configuration and key material.
    #[serde(rename = "StorePath")]
    pub store_path: Utf8PathBuf,
    /// Last known address of the backing resource.
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
    /// User for SSH connections.
    #[serde(rename = "SSHUser")]
    pub ssh_user: String,
    /// Port for SSH connections.
    #[serde(rename = "SSHPort")]
    pub ssh_port: u16,
    /// Private key used for SSH connections.
    #[serde(rename = "SSHKeyPath")]
    pub ssh_key_path: String,
}

impl Default for BaseDriver {
    fn default() -> Self {
        Self {
            machine_name: String::new(),
            store_path: Utf8PathBuf::new(),
            ip_address: String::new(),
            ssh_user: String::from("root"),
            ssh_port: DEFAULT_SSH_PORT,
            ssh_key_path: String::new(),
        }
    }
}

impl BaseDriver {
    /// Creates the base fields for a host about to be created.
    #[must_use]
    pub fn new(machine_name: impl Into<String>, store_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            machine_name: machine_name.into(),
            store_path: store_path.into(),
            ..Self::default()
        }
    }

    /// Returns the recorded IP address.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MissingAddress`] when no address is recorded.
    pub fn ip(&self) -> Result<String, DriverError> {
        if self.ip_address.is_empty() {
            return Err(DriverError::MissingAddress);
        }
        Ok(self.ip_address.clone())
    }

    /// Path of a file inside the host's store directory.
    #[must_use]
    pub fn store_file(&self, name: &str) -> Utf8PathBuf {
        self.store_path.join(name)
    }

    /// Connection details for SSH.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MissingAddress`] when no address is recorded.
    pub fn ssh_target(&self) -> Result<SshTarget, DriverError> {
        Ok(SshTarget {
            host: self.ip()?,
            port: self.ssh_port,
            user: self.ssh_user.clone(),
            identity_file: Some(self.ssh_key_path.clone()).filter(|path| !path.is_empty()),
        })
    }

    /// Docker daemon URL on the recorded address.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::MissingAddress`] when no address is recorded.
    pub fn docker_url(&self) -> Result<String, DriverError> {
        Ok(format!("tcp://{}:{DOCKER_PORT}", self.ip()?))
    }
}

/// Port the Docker daemon listens on for TLS connections.
pub const DOCKER_PORT: u16 = 2376;
