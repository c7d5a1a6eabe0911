//! Configuration loading via `ortho-config`.
//!
//! Values merge defaults, `machine.toml`, and `MACHINE_*` environment
//! variables; the CLI's global flags are applied on top by
//! [`MachineConfig::resolve`].

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::commands::TlsPaths;
use crate::host::AuthOptions;

/// Program name used for configuration discovery.
pub const APP_NAME: &str = "docker-machine";

/// Storage location relative to the home directory.
const DEFAULT_STORAGE_DIR: &str = ".docker/machine";

/// Directory under the storage path holding the default TLS files.
const CERT_DIR: &str = "certs";

/// Layered settings shared by every command.
#[derive(Clone, Debug, Default, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "MACHINE",
    discovery(
        app_name = "docker-machine",
        env_var = "MACHINE_CONFIG_PATH",
        config_file_name = "machine.toml",
        dotfile_name = ".machine.toml",
        project_file_name = "machine.toml"
    )
)]
pub struct MachineConfig {
    /// Root of the host store. Defaults to `~/.docker/machine`.
    pub storage_path: Option<String>,
    /// CA certificate handed to Docker clients. Defaults to
    /// `<storage_path>/certs/ca.pem`.
    pub tls_ca_cert: Option<String>,
    /// CA private key recorded with each created host. Defaults to
    /// `<storage_path>/certs/ca-key.pem`.
    pub tls_ca_key: Option<String>,
    /// Client certificate handed to Docker clients. Defaults to
    /// `<storage_path>/certs/cert.pem`.
    pub tls_client_cert: Option<String>,
    /// Client private key handed to Docker clients. Defaults to
    /// `<storage_path>/certs/key.pem`.
    pub tls_client_key: Option<String>,
    /// Directory searched for driver plugins before the executable's own
    /// directory and `PATH`.
    pub plugin_dir: Option<String>,
    /// Enables debug logging.
    #[ortho_config(default = false)]
    pub debug: bool,
    /// Seconds to wait for a plugin to report its address.
    #[ortho_config(default = 10)]
    pub handshake_timeout_secs: u64,
}

/// Global flag values that override the loaded configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalOverrides {
    /// `--storage-path`.
    pub storage_path: Option<String>,
    /// `--tls-ca-cert`.
    pub tls_ca_cert: Option<String>,
    /// `--tls-ca-key`.
    pub tls_ca_key: Option<String>,
    /// `--tls-client-cert`.
    pub tls_client_cert: Option<String>,
    /// `--tls-client-key`.
    pub tls_client_key: Option<String>,
    /// `--plugin-dir`.
    pub plugin_dir: Option<String>,
    /// `--debug`.
    pub debug: bool,
}

/// Fully resolved settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineSettings {
    /// Root of the host store.
    pub storage_path: Utf8PathBuf,
    /// TLS material referenced by `config`.
    pub tls: TlsPaths,
    /// CA private key.
    pub tls_ca_key: Utf8PathBuf,
    /// Extra plugin directory.
    pub plugin_dir: Option<Utf8PathBuf>,
    /// Whether debug logging is on.
    pub debug: bool,
    /// Plugin handshake timeout.
    pub handshake_timeout: Duration,
}

impl MachineConfig {
    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from(APP_NAME)])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies `overrides` and fills in defaults. `home` is the user's home
    /// directory, used for the default storage path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no storage path can be
    /// determined, or [`ConfigError::InvalidValue`] for a zero handshake
    /// timeout.
    pub fn resolve(
        self,
        overrides: GlobalOverrides,
        home: Option<&str>,
    ) -> Result<MachineSettings, ConfigError> {
        if self.handshake_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "handshake_timeout_secs must be greater than zero",
            )));
        }

        let storage_path = overrides
            .storage_path
            .or(self.storage_path)
            .filter(|path| !path.trim().is_empty())
            .map(Utf8PathBuf::from)
            .or_else(|| {
                home.filter(|dir| !dir.is_empty())
                    .map(|dir| Utf8PathBuf::from(dir).join(DEFAULT_STORAGE_DIR))
            })
            .ok_or_else(|| {
                ConfigError::MissingField(String::from(concat!(
                    "missing storage path: pass --storage-path, set MACHINE_STORAGE_PATH ",
                    "or add storage_path to machine.toml",
                )))
            })?;

        let cert_dir = storage_path.join(CERT_DIR);
        let defaults = TlsPaths::in_dir(&cert_dir);
        let tls = TlsPaths {
            ca_cert: path(overrides.tls_ca_cert, self.tls_ca_cert).unwrap_or(defaults.ca_cert),
            client_cert: path(overrides.tls_client_cert, self.tls_client_cert)
                .unwrap_or(defaults.client_cert),
            client_key: path(overrides.tls_client_key, self.tls_client_key)
                .unwrap_or(defaults.client_key),
        };

        let tls_ca_key = path(overrides.tls_ca_key, self.tls_ca_key)
            .unwrap_or_else(|| cert_dir.join("ca-key.pem"));

        Ok(MachineSettings {
            storage_path,
            tls,
            tls_ca_key,
            plugin_dir: path(overrides.plugin_dir, self.plugin_dir),
            debug: overrides.debug || self.debug,
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
        })
    }
}

impl MachineSettings {
    /// TLS paths recorded in the configuration of each created host.
    #[must_use]
    pub fn auth_options(&self) -> AuthOptions {
        AuthOptions {
            ca_cert_path: self.tls.ca_cert.clone(),
            ca_key_path: self.tls_ca_key.clone(),
            client_cert_path: self.tls.client_cert.clone(),
            client_key_path: self.tls.client_key.clone(),
        }
    }
}

fn path(flag: Option<String>, configured: Option<String>) -> Option<Utf8PathBuf> {
    flag.or(configured)
        .filter(|value| !value.is_empty())
        .map(Utf8PathBuf::from)
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is out of range.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
