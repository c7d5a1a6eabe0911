//! Persisted host record.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One named host as stored in `<storage>/<name>/config.json`.
///
/// `driver` stays opaque JSON here; the plugin named by `driver_name` decodes
/// it into its own type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Host {
    /// Host name, also the name of its store directory.
    #[serde(rename = "Name")]
    pub name: String,
    /// Name of the driver managing the host.
    #[serde(rename = "DriverName")]
    pub driver_name: String,
    /// Driver-specific configuration.
    #[serde(rename = "Driver", default)]
    pub driver: Value,
    /// TLS files in effect when the host was created.
    #[serde(
        rename = "AuthOptions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub auth_options: Option<AuthOptions>,
}

/// TLS file locations stored with a host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOptions {
    /// CA certificate.
    #[serde(rename = "CaCertPath")]
    pub ca_cert_path: Utf8PathBuf,
    /// CA private key.
    #[serde(rename = "PrivateKeyPath")]
    pub ca_key_path: Utf8PathBuf,
    /// Client certificate.
    #[serde(rename = "ClientCertPath")]
    pub client_cert_path: Utf8PathBuf,
    /// Client private key.
    #[serde(rename = "ClientKeyPath")]
    pub client_key_path: Utf8PathBuf,
}

impl Host {
    /// Builds a host record.
    #[must_use]
    pub fn new(name: impl Into<String>, driver_name: impl Into<String>, driver: Value) -> Self {
        Self {
            name: name.into(),
            driver_name: driver_name.into(),
            driver,
            auth_options: None,
        }
    }
}

/// Returns `true` when `name` is non-empty and made only of ASCII letters,
/// digits, `-` and `.`.
#[must_use]
pub fn is_valid_host_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '.')
}
