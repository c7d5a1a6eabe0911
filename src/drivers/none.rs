//! Driver for hosts that already run Docker and need no provisioning.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::driver::{
    BaseDriver, Driver, DriverError, DriverFuture, DriverOptions, FlagSpec, decode_config,
    encode_config, ready,
};
use crate::ssh::SshCommand;
use crate::state::State;

/// Name of the driver.
pub const DRIVER_NAME: &str = "none";

/// Tracks a pre-existing Docker daemon by URL.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoneDriver {
    #[serde(flatten)]
    base: BaseDriver,
    #[serde(rename = "URL")]
    url: String,
}

impl NoneDriver {
    /// Creates a driver for `machine_name` with no URL yet.
    #[must_use]
    pub fn new(machine_name: &str, store_path: &str) -> Self {
        Self {
            base: BaseDriver::new(machine_name, store_path),
            url: String::new(),
        }
    }

    fn unsupported<T>(verb: &str) -> Result<T, DriverError> {
        Err(DriverError::NotSupported(format!(
            "hosts without a driver cannot be {verb}"
        )))
    }

    fn apply_options(&mut self, options: &DriverOptions) -> Result<(), DriverError> {
        let url = options.string("url");
        if url.is_empty() {
            return Err(DriverError::MissingOption(String::from(
                "--url option is required when no driver is selected",
            )));
        }
        let parsed = Url::parse(&url)
            .map_err(|err| DriverError::InvalidConfig(format!("invalid --url '{url}': {err}")))?;

        self.base.ip_address = parsed
            .host_str()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .unwrap_or_default()
            .to_owned();
        self.url = url;
        Ok(())
    }
}

impl Driver for NoneDriver {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    fn create_flags(&self) -> DriverFuture<'_, Vec<FlagSpec>> {
        ready(Ok(vec![FlagSpec::string(
            "url",
            "URL of host when no driver is selected",
            "",
        )]))
    }

    fn config_raw(&self) -> DriverFuture<'_, Value> {
        ready(encode_config(self))
    }

    fn set_config_raw(&mut self, raw: Value) -> DriverFuture<'_, ()> {
        ready(decode_config(raw).map(|decoded| *self = decoded))
    }

    fn set_config_from_flags<'a>(
        &'a mut self,
        options: &'a DriverOptions,
    ) -> DriverFuture<'a, ()> {
        ready(self.apply_options(options))
    }

    fn machine_name(&self) -> DriverFuture<'_, String> {
        ready(Ok(self.base.machine_name.clone()))
    }

    fn create(&mut self) -> DriverFuture<'_, ()> {
        ready(Ok(()))
    }

    fn remove(&mut self) -> DriverFuture<'_, ()> {
        ready(Ok(()))
    }

    fn start(&mut self) -> DriverFuture<'_, ()> {
        ready(Self::unsupported("started"))
    }

    fn stop(&mut self) -> DriverFuture<'_, ()> {
        ready(Self::unsupported("stopped"))
    }

    fn restart(&mut self) -> DriverFuture<'_, ()> {
        ready(Self::unsupported("restarted"))
    }

    fn kill(&mut self) -> DriverFuture<'_, ()> {
        ready(Self::unsupported("killed"))
    }

    fn upgrade(&mut self) -> DriverFuture<'_, ()> {
        ready(Self::unsupported("upgraded"))
    }

    fn ip(&self) -> DriverFuture<'_, String> {
        ready(self.base.ip())
    }

    fn url(&self) -> DriverFuture<'_, String> {
        ready(Ok(self.url.clone()))
    }

    fn state(&self) -> DriverFuture<'_, State> {
        ready(Ok(State::Running))
    }

    fn ssh_command<'a>(&'a self, _args: &'a [String]) -> DriverFuture<'a, SshCommand> {
        ready(Err(DriverError::NotSupported(String::from(
            "hosts without a driver do not support SSH",
        ))))
    }
}
