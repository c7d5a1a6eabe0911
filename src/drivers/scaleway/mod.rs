//! Scaleway driver provisioning hosts through the Instances API.

mod error;
mod lifecycle;
mod types;

use std::sync::Arc;
use std::time::Duration;

use scaleway_rs::ScalewayApi;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::driver::{
    BaseDriver, Driver, DriverError, DriverFuture, DriverOptions, FlagSpec, decode_config,
    encode_config, ready,
};
use crate::ssh::{CommandRunner, DEFAULT_SSH_PORT, ProcessCommandRunner, SshCommand, SshTarget};
use crate::state::State;
use crate::wait::PollSchedule;

pub use error::ScalewayDriverError;

/// Name of the driver.
pub const DRIVER_NAME: &str = "scaleway";

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const WAIT_TIMEOUT: Duration = Duration::from_secs(300);
const INSTALL_DOCKER: &str = "curl -sSL https://get.docker.com | sudo sh";

fn default_runner() -> Arc<dyn CommandRunner> {
    Arc::new(ProcessCommandRunner)
}

const fn default_schedule() -> PollSchedule {
    PollSchedule::new(POLL_INTERVAL, WAIT_TIMEOUT)
}

/// Maps a Scaleway server status onto [`State`].
///
/// Statuses outside the documented set map to [`State::None`].
#[must_use]
pub fn server_state(status: &str) -> State {
    match status {
        "running" => State::Running,
        "starting" => State::Starting,
        "stopping" => State::Stopping,
        "stopped" | "stopped in place" => State::Stopped,
        _ => State::None,
    }
}

/// Metadata for a mandatory option, used to generate actionable errors.
struct FieldMetadata {
    description: &'static str,
    flag: &'static str,
    env_var: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, flag: &'static str, env_var: &'static str) -> Self {
        Self {
            description,
            flag,
            env_var,
        }
    }
}

/// Manages one Scaleway server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ScalewayDriver {
    #[serde(flatten)]
    base: BaseDriver,
    secret_key: String,
    project_id: String,
    organization_id: Option<String>,
    zone: String,
    commercial_type: String,
    image: String,
    architecture: String,
    #[serde(rename = "EnableIPv6")]
    enable_ipv6: bool,
    server_id: Option<String>,
    #[serde(skip, default = "default_runner")]
    runner: Arc<dyn CommandRunner>,
    #[serde(skip, default = "default_schedule")]
    schedule: PollSchedule,
}

impl Default for ScalewayDriver {
    fn default() -> Self {
        Self {
            base: BaseDriver::default(),
            secret_key: String::new(),
            project_id: String::new(),
            organization_id: None,
            zone: String::from("fr-par-1"),
            commercial_type: String::from("DEV1-S"),
            image: String::from("Ubuntu 24.04 Noble Numbat"),
            architecture: String::from("x86_64"),
            enable_ipv6: false,
            server_id: None,
            runner: default_runner(),
            schedule: default_schedule(),
        }
    }
}

impl ScalewayDriver {
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

    /// Overrides the interval and timeout of wait loops.
    #[must_use]
    pub const fn with_schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    fn api(&self) -> ScalewayApi {
        ScalewayApi::new(&self.secret_key)
    }

    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ScalewayDriverError> {
        if value.trim().is_empty() {
            return Err(ScalewayDriverError::Config(format!(
                "missing {}: pass --{} or set {}",
                metadata.description, metadata.flag, metadata.env_var
            )));
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ScalewayDriverError> {
        Self::require_field(
            &self.secret_key,
            &FieldMetadata::new(
                "Scaleway API secret key",
                "scaleway-secret-key",
                "SCW_SECRET_KEY",
            ),
        )?;
        Self::require_field(
            &self.project_id,
            &FieldMetadata::new(
                "Scaleway project ID",
                "scaleway-project-id",
                "SCW_DEFAULT_PROJECT_ID",
            ),
        )?;
        Self::require_field(
            &self.zone,
            &FieldMetadata::new("availability zone", "scaleway-zone", "SCW_DEFAULT_ZONE"),
        )?;
        Self::require_field(
            &self.commercial_type,
            &FieldMetadata::new(
                "instance type",
                "scaleway-instance-type",
                "SCW_DEFAULT_INSTANCE_TYPE",
            ),
        )?;
        Self::require_field(
            &self.image,
            &FieldMetadata::new("VM image", "scaleway-image", "SCW_DEFAULT_IMAGE"),
        )?;
        Self::require_field(
            &self.architecture,
            &FieldMetadata::new(
                "CPU architecture",
                "scaleway-architecture",
                "SCW_DEFAULT_ARCHITECTURE",
            ),
        )
    }

    fn apply_options(&mut self, options: &DriverOptions) -> Result<(), ScalewayDriverError> {
        self.secret_key = options.string("scaleway-secret-key");
        self.project_id = options.string("scaleway-project-id");
        self.organization_id =
            Some(options.string("scaleway-organization-id")).filter(|org| !org.is_empty());
        self.zone = options.string("scaleway-zone");
        self.commercial_type = options.string("scaleway-instance-type");
        self.image = options.string("scaleway-image");
        self.architecture = options.string("scaleway-architecture");
        self.enable_ipv6 = options.bool("scaleway-ipv6");
        self.base.ssh_user = options.string("scaleway-ssh-user");
        self.base.ssh_key_path = options.string("scaleway-ssh-key");
        let port = options.int("scaleway-ssh-port");
        self.base.ssh_port = u16::try_from(port).map_err(|_| {
            ScalewayDriverError::Config(format!("--scaleway-ssh-port {port} is out of range"))
        })?;
        self.validate()
    }

    fn current_server_id(&self) -> Result<String, ScalewayDriverError> {
        self.server_id.clone().ok_or(ScalewayDriverError::NotCreated)
    }

    async fn run_remote(&self, command: &str) -> Result<(), DriverError> {
        self.base
            .ssh_target()?
            .run_async(Arc::clone(&self.runner), command.to_owned())
            .await
            .map(drop)
    }
}

impl Driver for ScalewayDriver {
    fn driver_name(&self) -> &str {
        DRIVER_NAME
    }

    fn create_flags(&self) -> DriverFuture<'_, Vec<FlagSpec>> {
        ready(Ok(vec![
            FlagSpec::string("scaleway-secret-key", "Scaleway API secret key", "")
                .env("SCW_SECRET_KEY"),
            FlagSpec::string("scaleway-project-id", "Scaleway project ID", "")
                .env("SCW_DEFAULT_PROJECT_ID"),
            FlagSpec::string("scaleway-organization-id", "Scaleway organization ID", "")
                .env("SCW_DEFAULT_ORGANIZATION_ID"),
            FlagSpec::string("scaleway-zone", "Availability zone", "fr-par-1")
                .env("SCW_DEFAULT_ZONE"),
            FlagSpec::string("scaleway-instance-type", "Commercial instance type", "DEV1-S")
                .env("SCW_DEFAULT_INSTANCE_TYPE"),
            FlagSpec::string(
                "scaleway-image",
                "Image label resolved to an image ID",
                "Ubuntu 24.04 Noble Numbat",
            )
            .env("SCW_DEFAULT_IMAGE"),
            FlagSpec::string("scaleway-architecture", "CPU architecture", "x86_64")
                .env("SCW_DEFAULT_ARCHITECTURE"),
            FlagSpec::bool("scaleway-ipv6", "Enable IPv6 on the server"),
            FlagSpec::string("scaleway-ssh-user", "SSH user", "root"),
            FlagSpec::string("scaleway-ssh-key", "SSH private key path", ""),
            FlagSpec::int("scaleway-ssh-port", "SSH port", i64::from(DEFAULT_SSH_PORT)),
        ]))
    }

    fn config_raw(&self) -> DriverFuture<'_, Value> {
        ready(encode_config(self))
    }

    fn set_config_raw(&mut self, raw: Value) -> DriverFuture<'_, ()> {
        let result = decode_config::<Self>(raw).map(|decoded| {
            let runner = Arc::clone(&self.runner);
            let schedule = self.schedule;
            *self = decoded.with_runner(runner).with_schedule(schedule);
        });
        ready(result)
    }

    fn set_config_from_flags<'a>(
        &'a mut self,
        options: &'a DriverOptions,
    ) -> DriverFuture<'a, ()> {
        ready(self.apply_options(options).map_err(DriverError::from))
    }

    fn pre_create_check(&self) -> DriverFuture<'_, ()> {
        ready(self.validate().map_err(DriverError::from))
    }

    fn machine_name(&self) -> DriverFuture<'_, String> {
        ready(Ok(self.base.machine_name.clone()))
    }

    fn create(&mut self) -> DriverFuture<'_, ()> {
        Box::pin(async move { self.provision().await.map_err(DriverError::from) })
    }

    fn remove(&mut self) -> DriverFuture<'_, ()> {
        Box::pin(async move { self.destroy().await.map_err(DriverError::from) })
    }

    fn start(&mut self) -> DriverFuture<'_, ()> {
        Box::pin(async move {
            tracing::info!("Starting instance...");
            self.power_on().await.map_err(DriverError::from)
        })
    }

    fn stop(&mut self) -> DriverFuture<'_, ()> {
        Box::pin(async move {
            tracing::info!("Stopping instance...");
            self.power_off().await.map_err(DriverError::from)
        })
    }

    fn restart(&mut self) -> DriverFuture<'_, ()> {
        Box::pin(async move {
            tracing::info!("Rebooting instance...");
            self.reboot().await.map_err(DriverError::from)
        })
    }

    fn kill(&mut self) -> DriverFuture<'_, ()> {
        self.stop()
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
        Box::pin(async move {
            let server_id = self.current_server_id()?;
            tracing::debug!(%server_id, "retrieving server state");
            let snapshot = self
                .fetch_server(&self.api(), &server_id)
                .await?
                .ok_or(ScalewayDriverError::ServerNotFound { server_id })?;
            Ok(server_state(snapshot.status.as_str()))
        })
    }

    fn ssh_command<'a>(&'a self, args: &'a [String]) -> DriverFuture<'a, SshCommand> {
        ready(self.base.ssh_target().map(|target| target.command(args)))
    }

    fn ssh_target(&self) -> DriverFuture<'_, SshTarget> {
        ready(self.base.ssh_target())
    }
}

#[cfg(test)]
mod tests;
