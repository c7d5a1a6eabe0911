//! Turning a driver name and its JSON into a live [`Driver`].

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;

use crate::driver::{Driver, DriverError};
use crate::plugin::{PluginError, PluginLauncher};

/// Boxed future returned by [`DriverLoader::load`].
pub type LoadFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Box<dyn Driver>, LoadError>> + Send + 'a>>;

/// Failures while obtaining a driver.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Raised when the plugin cannot be started.
    #[error(transparent)]
    Plugin(#[from] PluginError),
    /// Raised when the driver rejects its configuration.
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Source of drivers for the command layer.
///
/// Callers must [`Driver::close`] every driver they load.
pub trait DriverLoader: Send + Sync {
    /// Returns a `driver_name` driver for `machine_name`, configured with
    /// `raw`.
    fn load<'a>(&'a self, driver_name: &'a str, machine_name: &'a str, raw: Value)
    -> LoadFuture<'a>;
}

/// Runs each driver in its own plugin process.
#[derive(Clone, Debug)]
pub struct PluginLoader {
    launcher: PluginLauncher,
}

impl PluginLoader {
    /// Loads drivers through `launcher`.
    #[must_use]
    pub const fn new(launcher: PluginLauncher) -> Self {
        Self { launcher }
    }
}

impl DriverLoader for PluginLoader {
    fn load<'a>(
        &'a self,
        driver_name: &'a str,
        machine_name: &'a str,
        raw: Value,
    ) -> LoadFuture<'a> {
        Box::pin(async move {
            let mut client = self.launcher.launch(driver_name, machine_name).await?;
            if let Err(err) = client.set_config_raw(raw).await {
                if let Err(close_err) = client.close().await {
                    tracing::debug!(error = %close_err, "closing rejected plugin failed");
                }
                return Err(err.into());
            }
            Ok(Box::new(client) as Box<dyn Driver>)
        })
    }
}
