//! Driver for existing machines reachable over SSH.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::driver::{
    BaseDriver, Driver, DriverError, DriverFuture, DriverOptions, FlagSpec, decode_config,
    encode_config, ready,
};
use crate::files;
use crate::ssh::{
    CommandRunner, DEFAULT_SSH_PORT, ProcessCommandRunner, SshCommand, SshTarget, expand_tilde,
};
use crate::state::State;

/// Name of the driver.
pub const DRIVER_NAME: &str = "generic";

const DEFAULT_SOURCE_KEY: &str = "~/.ssh/id_rsa";
const STATE_DIAL_TIMEOUT: Duration = Duration::from_secs(1);
const INSTALL_DOCKER: &str = "curl -sSL https://get.docker.com | sudo sh";

fn default_runner() -> Arc<dyn CommandRunner> {
    Arc::new(ProcessCommandRunner)
}

/// Manages a machine the user already owns: nothing is provisioned, power
/// control goes through `shutdown` over SSH.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GenericDriver {
    #[serde(flatten)]
    base: BaseDriver,
    /// Key the user supplied; copied into the store on creation.
    #[serde(rename = "SSHKey")]
    source_key: String,
    #[serde(skip, default = "default_runner")]
    runner: Arc<dyn CommandRunner>,
}

impl Default for GenericDriver {
    fn default() -> Self {
        Self {
            base: BaseDriver::default(),
            source_key: DEFAULT_SOURCE_KEY.to_owned(),
            runner: default_runner(),
        }
    }
}

impl GenericDriver {
    /// Creates a driver for `machine_name` storing files under `store_path`.
    #[must_use]
    pub fn new(machine_name: &str, store_path: &str) -> Self {
        Self {
            base: BaseDriver::new(machine_name, store_path),
            ..Self::default()
        }
    }

    /// Replaces the runner used for SSH commands.
    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    fn apply_options(&mut self, options: &DriverOptions) -> Result<(), DriverError> {
        self.base.ip_address = options.string("generic-ip-address");
        self.base.ssh_user = options.string("generic-ssh-user");
        self.source_key = options.string("generic-ssh-key");
        let port = options.int("generic-ssh-port");
        self.base.ssh_port = u16::try_from(port).map_err(|_| {
            DriverError::InvalidConfig(format!("--generic-ssh-port {port} is out of range"))
        })?;

        if self.base.ip_address.is_empty() {
            return Err(DriverError::MissingOption(String::from(
                "generic driver requires the --generic-ip-address option",
            )));
        }
        if self.source_key.is_empty() {
            return Err(DriverError::MissingOption(String::from(
                "generic driver requires the --generic-ssh-key option",
            )));
        }
        Ok(())
    }

    fn source_key_path(&self) -> String {
        expand_tilde(&self.source_key)
    }

    fn import_key(&mut self) -> Result<(), DriverError> {
        tracing::info!("Importing SSH key...");
        let source = self.source_key_path();
        let key = files::read(Utf8Path::new(&source))
            .map_err(|err| DriverError::Io(format!("unable to copy ssh key: {err}")))?;
        let destination = self.base.store_file("id_rsa");
        files::write_private(&destination, &key)
            .map_err(|err| DriverError::Io(format!("unable to copy ssh key: {err}")))?;
        self.base.ssh_key_path = destination.into_string();
        tracing::debug!(ip = %self.base.ip_address, "generic host registered");
        Ok(())
    }

    async fn run_remote(&self, command: &str) -> Result<(), DriverError> {
        self.base
            .ssh_target()?
            .run_async(Arc::clone(&self.runner), command.to_owned())
            .await
            .map(drop)
    }

    async fn dial_state(&self) -> State {
        let address = (self.base.ip_address.as_str(), self.base.ssh_port);
        match timeout(STATE_DIAL_TIMEOUT, TcpStream::connect(address)).await {
            Ok(Ok(_)) => State::Running,
            _ => State::Stopped,
        }
    }
}

impl Driver for GenericDriver {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    fn create_flags(&self) -> DriverFuture<'_, Vec<FlagSpec>> {
        ready(Ok(vec![
            FlagSpec::string("generic-ip-address", "IP Address of machine", ""),
            FlagSpec::string("generic-ssh-user", "SSH user", "root"),
            FlagSpec::string("generic-ssh-key", "SSH private key path", DEFAULT_SOURCE_KEY),
            FlagSpec::int("generic-ssh-port", "SSH port", i64::from(DEFAULT_SSH_PORT)),
        ]))
    }

    fn config_raw(&self) -> DriverFuture<'_, Value> {
        ready(encode_config(self))
    }

    fn set_config_raw(&mut self, raw: Value) -> DriverFuture<'_, ()> {
        let result = decode_config::<Self>(raw).map(|decoded| {
            let runner = Arc::clone(&self.runner);
            *self = decoded.with_runner(runner);
        });
        ready(result)
    }

    fn set_config_from_flags<'a>(
        &'a mut self,
        options: &'a DriverOptions,
    ) -> DriverFuture<'a, ()> {
        ready(self.apply_options(options))
    }

    fn pre_create_check(&self) -> DriverFuture<'_, ()> {
        let source = self.source_key_path();
        ready(files::read(Utf8Path::new(&source)).map(drop).map_err(|err| {
            DriverError::InvalidConfig(format!("cannot read ssh key {source}: {err}"))
        }))
    }

    fn machine_name(&self) -> DriverFuture<'_, String> {
        ready(Ok(self.base.machine_name.clone()))
    }

    fn create(&mut self) -> DriverFuture<'_, ()> {
        ready(self.import_key())
    }

    fn remove(&mut self) -> DriverFuture<'_, ()> {
        ready(Ok(()))
    }

    fn start(&mut self) -> DriverFuture<'_, ()> {
        ready(Err(DriverError::NotSupported(String::from(
            "generic driver does not support start",
        ))))
    }

    fn stop(&mut self) -> DriverFuture<'_, ()> {
        ready(Err(DriverError::NotSupported(String::from(
            "generic driver does not support stop",
        ))))
    }

    fn restart(&mut self) -> DriverFuture<'_, ()> {
        tracing::debug!("Restarting...");
        Box::pin(self.run_remote("sudo shutdown -r now"))
    }

    fn kill(&mut self) -> DriverFuture<'_, ()> {
        tracing::debug!("Killing...");
        Box::pin(self.run_remote("sudo shutdown -P now"))
    }

    fn upgrade(&mut self) -> DriverFuture<'_, ()> {
        Box::pin(self.run_remote(INSTALL_DOCKER))
    }

    fn ip(&self) -> DriverFuture<'_, String> {
        ready(self.base.ip())
    }

    fn url(&self) -> DriverFuture<'_, String> {
        ready(self.base.docker_url())
    }

    fn state(&self) -> DriverFuture<'_, State> {
        Box::pin(async move { Ok(self.dial_state().await) })
    }

    fn ssh_command<'a>(&'a self, args: &'a [String]) -> DriverFuture<'a, SshCommand> {
        ready(self.base.ssh_target().map(|target| target.command(args)))
    }

    fn ssh_target(&self) -> DriverFuture<'_, SshTarget> {
        ready(self.base.ssh_target())
    }
}
