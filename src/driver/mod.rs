//! The capability contract every provider backend implements.
//!
//! The rest of the crate only talks to hosts through [`Driver`], whether the
//! implementation lives in this process or behind an RPC connection to a
//! plugin binary.

mod base;
mod error;
mod options;

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ssh::{SshCommand, SshTarget};
use crate::state::State;

pub use base::{BaseDriver, DOCKER_PORT};
pub use error::DriverError;
pub use options::{DriverOptions, FlagSpec, FlagValue};

/// Boxed future returned by [`Driver`] methods.
pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DriverError>> + Send + 'a>>;

/// Lifecycle and inspection operations for one host's backing resource.
///
/// Operations a provider cannot perform fail with
/// [`DriverError::NotSupported`] rather than doing nothing.
pub trait Driver: Send + Sync {
    /// Name of the driver, for example `generic`.
    fn driver_name(&self) -> &str;

    /// Options accepted by [`Driver::set_config_from_flags`].
    fn create_flags(&self) -> DriverFuture<'_, Vec<FlagSpec>>;

    /// Serialises the driver's persisted fields.
    fn config_raw(&self) -> DriverFuture<'_, Value>;

    /// Replaces the driver's persisted fields.
    fn set_config_raw(&mut self, raw: Value) -> DriverFuture<'_, ()>;

    /// Validates and applies creation options.
    fn set_config_from_flags<'a>(&'a mut self, options: &'a DriverOptions)
    -> DriverFuture<'a, ()>;

    /// Checks that creation can succeed before any resource is allocated.
    fn pre_create_check(&self) -> DriverFuture<'_, ()> {
        ready(Ok(()))
    }

    /// Name of the host this driver manages.
    fn machine_name(&self) -> DriverFuture<'_, String>;

    /// Provisions the backing resource.
    fn create(&mut self) -> DriverFuture<'_, ()>;

    /// Deletes the backing resource and anything the driver allocated for it.
    fn remove(&mut self) -> DriverFuture<'_, ()>;

    /// Powers the resource on.
    fn start(&mut self) -> DriverFuture<'_, ()>;

    /// Powers the resource off gracefully.
    fn stop(&mut self) -> DriverFuture<'_, ()>;

    /// Reboots the resource.
    fn restart(&mut self) -> DriverFuture<'_, ()>;

    /// Powers the resource off without waiting for a clean shutdown.
    fn kill(&mut self) -> DriverFuture<'_, ()>;

    /// Upgrades the Docker engine on the resource.
    fn upgrade(&mut self) -> DriverFuture<'_, ()>;

    /// Address of the resource.
    fn ip(&self) -> DriverFuture<'_, String>;

    /// Docker daemon URL of the resource.
    fn url(&self) -> DriverFuture<'_, String>;

    /// Current power state.
    fn state(&self) -> DriverFuture<'_, State>;

    /// SSH invocation running `args` on the resource.
    fn ssh_command<'a>(&'a self, args: &'a [String]) -> DriverFuture<'a, SshCommand>;

    /// Where and as whom to connect for file copies.
    fn ssh_target(&self) -> DriverFuture<'_, SshTarget> {
        ready(Err(DriverError::NotSupported(format!(
            "the {} driver does not support file copies",
            self.driver_name()
        ))))
    }

    /// Releases whatever the handle holds. In-process drivers hold nothing.
    fn close(&mut self) -> DriverFuture<'_, ()> {
        ready(Ok(()))
    }
}

/// Wraps an already computed result as a [`DriverFuture`].
pub fn ready<'a, T: Send + 'a>(result: Result<T, DriverError>) -> DriverFuture<'a, T> {
    Box::pin(std::future::ready(result))
}

/// Serialises a driver's persisted fields.
///
/// # Errors
///
/// Returns [`DriverError::InvalidConfig`] when serialisation fails.
pub fn encode_config<T: Serialize + ?Sized>(driver: &T) -> Result<Value, DriverError> {
    serde_json::to_value(driver).map_err(DriverError::from)
}

/// Deserialises a driver's persisted fields.
///
/// # Errors
///
/// Returns [`DriverError::InvalidConfig`] when `raw` does not match `T`.
pub fn decode_config<T: DeserializeOwned>(raw: Value) -> Result<T, DriverError> {
    serde_json::from_value(raw).map_err(DriverError::from)
}

#[cfg(test)]
mod tests;
