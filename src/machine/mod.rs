//! Host lifecycle commands on top of the store and a driver source.
//!
//! [`Machine`] never names a concrete driver: every host's driver comes from
//! a [`DriverLoader`], normally a plugin process, and is closed once the
//! command is done with it.

mod loader;
mod options;

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tokio::task::JoinSet;

use crate::driver::{Driver, DriverError};
use crate::host::{AuthOptions, Host, is_valid_host_name};
use crate::ssh::{ScpEndpoint, SshCommand, scp_command};
use crate::state::State;
use crate::store::{Store, StoreError};

pub use loader::{DriverLoader, LoadError, LoadFuture, PluginLoader};
pub use options::{parse_override, resolve_options};

const CHECK_PROVIDER_AFTER_FAILURE: &str = concat!(
    "You will want to check the provider to make sure the machine and ",
    "associated resources were properly removed."
);

/// Failures surfaced by [`Machine`] operations.
#[derive(Debug, Error)]
pub enum MachineError {
    /// Raised by the host store.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Raised when a driver cannot be obtained.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// Raised by a driver operation.
    #[error(transparent)]
    Driver(#[from] DriverError),
    /// Raised when no host is named and none is active.
    #[error("No machine name specified and no active host is set")]
    NoActiveHost,
    /// Raised when a `-o` value is not `key=value`.
    #[error("invalid driver option {0:?}: expected key=value")]
    InvalidOverride(String),
    /// Raised when a `-o` key is not a flag of the selected driver.
    #[error("unknown option \"{key}\" for driver {driver}")]
    UnknownOption {
        /// Offending key.
        key: String,
        /// Selected driver.
        driver: String,
    },
    /// Raised when an action failed on at least one host.
    #[error("failed to {action} {failed} of {total} machine(s)")]
    ActionFailed {
        /// Action attempted.
        action: Action,
        /// Hosts that failed.
        failed: usize,
        /// Hosts targeted.
        total: usize,
    },
    /// Raised when a driver refused to remove a host and `force` was off.
    #[error("There was an error removing a machine. To force remove it, pass the -f option.")]
    RemoveFailed,
    /// Raised when an `scp` argument has more than one `:`.
    #[error("The input was malformed: {0:?}")]
    MalformedCopyPath(String),
}

/// State-changing operations run against existing hosts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Power on.
    Start,
    /// Power off.
    Stop,
    /// Reboot.
    Restart,
    /// Force power off.
    Kill,
    /// Upgrade Docker.
    Upgrade,
}

impl Action {
    /// Command name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Kill => "kill",
            Self::Upgrade => "upgrade",
        }
    }

    async fn apply(self, driver: &mut dyn Driver) -> Result<(), DriverError> {
        match self {
            Self::Start => driver.start().await,
            Self::Stop => driver.stop().await,
            Self::Restart => driver.restart().await,
            Self::Kill => driver.kill().await,
            Self::Upgrade => driver.upgrade().await,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments of [`Machine::create`].
#[derive(Clone, Debug, Default)]
pub struct CreateRequest {
    /// Name of the new host.
    pub name: String,
    /// Driver to create it with.
    pub driver: String,
    /// `-o key=value` overrides, already split.
    pub overrides: Vec<(String, String)>,
}

/// One row of `ls`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostSummary {
    /// Host name.
    pub name: String,
    /// Whether the host is the active one.
    pub active: bool,
    /// Driver managing the host.
    pub driver_name: String,
    /// Power state; [`State::Error`] when it could not be fetched.
    pub state: State,
    /// Docker URL, empty unless the host is running.
    pub url: String,
    /// Why the state or URL is missing.
    pub error: Option<String>,
}

/// Command orchestration over a [`Store`] and a [`DriverLoader`].
pub struct Machine<L> {
    store: Store,
    loader: Arc<L>,
    auth_options: Option<AuthOptions>,
}

impl<L: DriverLoader + 'static> Machine<L> {
    /// Creates the command layer.
    #[must_use]
    pub fn new(store: Store, loader: L) -> Self {
        Self {
            store,
            loader: Arc::new(loader),
            auth_options: None,
        }
    }

    /// Records `auth_options` on every host created from now on.
    #[must_use]
    pub fn with_auth_options(mut self, auth_options: AuthOptions) -> Self {
        self.auth_options = Some(auth_options);
        self
    }

    /// Host store.
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Loads `name`, or the active host when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::NoActiveHost`] or a store error.
    pub fn resolve_host(&self, name: Option<&str>) -> Result<Host, MachineError> {
        match name {
            Some(explicit) => Ok(self.store.load(explicit)?),
            None => self.store.get_active()?.ok_or(MachineError::NoActiveHost),
        }
    }

    fn resolve_hosts(&self, names: &[String]) -> Result<Vec<Host>, MachineError> {
        if names.is_empty() {
            return self.resolve_host(None).map(|host| vec![host]);
        }
        names
            .iter()
            .map(|name| self.resolve_host(Some(name)))
            .collect()
    }

    /// Creates a host, persists the driver's resulting configuration and
    /// makes it the active host.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError`] when the name is invalid or taken, the
    /// options do not resolve, or the driver fails. A failed creation leaves
    /// no host behind in the store.
    pub async fn create(&self, request: &CreateRequest) -> Result<Host, MachineError> {
        let CreateRequest {
            name,
            driver: driver_name,
            overrides,
        } = request;
        if !is_valid_host_name(name) {
            return Err(StoreError::InvalidName { name: name.clone() }.into());
        }
        if self.store.exists(name)? {
            return Err(StoreError::AlreadyExists { name: name.clone() }.into());
        }

        let raw = json!({
            "MachineName": name,
            "StorePath": self.store.host_dir(name),
        });
        let mut driver = self.loader.load(driver_name, name, raw).await?;
        let created = self
            .provision(driver.as_mut(), name, driver_name, overrides)
            .await;
        close_driver(driver.as_mut()).await;

        let host = created?;
        tracing::info!("\"{name}\" has been created and is now the active machine.");
        let eval = format!("eval \"$(docker-machine env {name})\"");
        tracing::info!("To point your Docker client at it, run this in your shell: {eval}");
        Ok(host)
    }

    async fn provision(
        &self,
        driver: &mut dyn Driver,
        name: &str,
        driver_name: &str,
        overrides: &[(String, String)],
    ) -> Result<Host, MachineError> {
        let flags = driver.create_flags().await?;
        let options = resolve_options(driver_name, &flags, overrides, |var| {
            std::env::var(var).ok()
        })?;
        driver.set_config_from_flags(&options).await?;
        driver.pre_create_check().await?;

        let mut host = Host::new(name, driver_name, Value::Null);
        host.auth_options.clone_from(&self.auth_options);
        self.store.create(&host)?;
        let outcome = async {
            tracing::info!("Creating machine...");
            driver.create().await?;
            host.driver = driver.config_raw().await?;
            self.store.save(&host)?;
            self.store.set_active(name)?;
            Ok::<_, MachineError>(())
        }
        .await;

        if let Err(err) = outcome {
            tracing::error!("Error creating machine: {err}");
            tracing::warn!("{CHECK_PROVIDER_AFTER_FAILURE}");
            if let Err(cleanup) = self.store.remove(name) {
                tracing::debug!(error = %cleanup, "failed to remove partial host");
            }
            return Err(err);
        }
        Ok(host)
    }

    async fn open(&self, host: &Host) -> Result<Box<dyn Driver>, MachineError> {
        Ok(self
            .loader
            .load(&host.driver_name, &host.name, host.driver.clone())
            .await?)
    }

    /// Runs `action` on every named host, or on the active host when `names`
    /// is empty. Hosts are processed concurrently; each driver's updated
    /// configuration is saved.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::ActionFailed`] when any host fails; each
    /// failure is logged.
    pub async fn run_action(&self, action: Action, names: &[String]) -> Result<(), MachineError> {
        let hosts = self.resolve_hosts(names)?;
        let total = hosts.len();
        let mut tasks = JoinSet::new();
        for host in hosts {
            let store = self.store.clone();
            let loader = Arc::clone(&self.loader);
            tasks.spawn(async move {
                let name = host.name.clone();
                (name, apply_action(&store, loader.as_ref(), host, action).await)
            });
        }

        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((name, Err(err))) => {
                    tracing::error!("Error running {action} on {name}: {err}");
                    failed += 1;
                }
                Err(err) => {
                    tracing::error!("{action} task failed: {err}");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            return Err(MachineError::ActionFailed {
                action,
                failed,
                total,
            });
        }
        Ok(())
    }

    /// Fetches state and URL of every host concurrently.
    ///
    /// Rows come back sorted by name. A host whose driver fails gets
    /// [`State::Error`] and the failure text instead of aborting the list.
    ///
    /// # Errors
    ///
    /// Returns a store error when the hosts cannot be listed.
    pub async fn list(&self) -> Result<Vec<HostSummary>, MachineError> {
        let hosts = self.store.list()?;
        let active = self.store.get_active()?.map(|host| host.name);
        let mut tasks = JoinSet::new();
        for host in hosts {
            let loader = Arc::clone(&self.loader);
            let is_active = active.as_deref() == Some(host.name.as_str());
            tasks.spawn(async move { summarise(loader.as_ref(), host, is_active).await });
        }

        let mut rows = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(row) => rows.push(row),
                Err(err) => tracing::error!("ls task failed: {err}"),
            }
        }
        rows.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));
        Ok(rows)
    }

    /// Removes hosts: the driver deletes its resource, then the store entry
    /// goes. With `force`, driver failures are logged and the store entry is
    /// removed anyway. A host that fails is logged and the remaining names are
    /// still processed.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::RemoveFailed`] when any host could not be
    /// removed.
    pub async fn remove(&self, names: &[String], force: bool) -> Result<(), MachineError> {
        let mut failed = false;
        for name in names {
            match self.remove_one(name, force).await {
                Ok(()) => tracing::info!("Successfully removed {name}"),
                Err(err) => {
                    tracing::error!("Error removing machine {name}: {err}");
                    failed = true;
                }
            }
        }
        if failed {
            return Err(MachineError::RemoveFailed);
        }
        Ok(())
    }

    async fn remove_one(&self, name: &str, force: bool) -> Result<(), MachineError> {
        let host = self.store.load(name)?;
        if let Err(err) = self.remove_resource(&host).await {
            if !force {
                return Err(err);
            }
            tracing::warn!("Error removing {name}, removing it anyway: {err}");
        }
        let was_active = self.store.is_active(name)?;
        self.store.remove(name)?;
        if was_active {
            self.store.remove_active()?;
        }
        Ok(())
    }

    async fn remove_resource(&self, host: &Host) -> Result<(), MachineError> {
        let mut driver = self.open(host).await?;
        let removed = driver.remove().await;
        close_driver(driver.as_mut()).await;
        Ok(removed?)
    }

    async fn query<T, F>(&self, name: Option<&str>, fetch: F) -> Result<T, MachineError>
    where
        F: for<'d> FnOnce(&'d dyn Driver) -> crate::driver::DriverFuture<'d, T>,
    {
        let host = self.resolve_host(name)?;
        let mut driver = self.open(&host).await?;
        let fetched = fetch(driver.as_ref()).await;
        close_driver(driver.as_mut()).await;
        Ok(fetched?)
    }

    /// Address of a host.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError`] when the host or its address is unavailable.
    pub async fn ip(&self, name: Option<&str>) -> Result<String, MachineError> {
        self.query(name, |driver| driver.ip()).await
    }

    /// Docker URL of a host.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError`] when the host or its URL is unavailable.
    pub async fn url(&self, name: Option<&str>) -> Result<String, MachineError> {
        self.query(name, |driver| driver.url()).await
    }

    /// Current state of a host.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError`] when the host or driver is unavailable.
    pub async fn state(&self, name: Option<&str>) -> Result<State, MachineError> {
        self.query(name, |driver| driver.state()).await
    }

    /// SSH invocation running `args` on a host.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError`] when the driver cannot build one.
    pub async fn ssh_command(
        &self,
        name: Option<&str>,
        args: &[String],
    ) -> Result<SshCommand, MachineError> {
        let host = self.resolve_host(name)?;
        let mut driver = self.open(&host).await?;
        let command = driver.ssh_command(args).await;
        close_driver(driver.as_mut()).await;
        Ok(command?)
    }

    /// `scp` invocation copying `source` to `destination`, where either side
    /// may be `machine:path`.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::MalformedCopyPath`] for an argument with more
    /// than one `:`, a store error for an unknown machine, or the driver's
    /// error when it cannot describe an SSH target.
    pub async fn scp_command(
        &self,
        source: &str,
        destination: &str,
        recursive: bool,
    ) -> Result<SshCommand, MachineError> {
        let from = self.copy_endpoint(source).await?;
        let to = self.copy_endpoint(destination).await?;
        Ok(scp_command(&from, &to, recursive))
    }

    async fn copy_endpoint(&self, raw: &str) -> Result<ScpEndpoint, MachineError> {
        let (name, path) = match raw.split_once(':') {
            None => return Ok(ScpEndpoint::Local(raw.to_owned())),
            Some((_, path)) if path.contains(':') => {
                return Err(MachineError::MalformedCopyPath(raw.to_owned()));
            }
            Some(parts) => parts,
        };
        let host = self.store.load(name)?;
        let mut driver = self.open(&host).await?;
        let target = driver.ssh_target().await;
        close_driver(driver.as_mut()).await;
        Ok(ScpEndpoint::Remote {
            target: target?,
            path: path.to_owned(),
        })
    }

    /// Stored record of a host.
    ///
    /// # Errors
    ///
    /// Returns a store error when the host does not exist.
    pub fn inspect(&self, name: Option<&str>) -> Result<Host, MachineError> {
        self.resolve_host(name)
    }

    /// Active host, if any.
    ///
    /// # Errors
    ///
    /// Returns a store error when the marker cannot be read.
    pub fn active(&self) -> Result<Option<Host>, MachineError> {
        Ok(self.store.get_active()?)
    }

    /// Makes `name` the active host.
    ///
    /// # Errors
    ///
    /// Returns a store error when the host does not exist.
    pub fn set_active(&self, name: &str) -> Result<(), MachineError> {
        Ok(self.store.set_active(name)?)
    }
}

async fn close_driver(driver: &mut dyn Driver) {
    if let Err(err) = driver.close().await {
        tracing::debug!(error = %err, "failed to close driver");
    }
}

async fn apply_action<L: DriverLoader>(
    store: &Store,
    loader: &L,
    mut host: Host,
    action: Action,
) -> Result<(), MachineError> {
    let mut driver = loader
        .load(&host.driver_name, &host.name, host.driver.clone())
        .await?;
    let outcome = async {
        action.apply(driver.as_mut()).await?;
        host.driver = driver.config_raw().await?;
        store.save(&host)?;
        Ok::<_, MachineError>(())
    }
    .await;
    close_driver(driver.as_mut()).await;
    outcome
}

async fn summarise<L: DriverLoader>(loader: &L, host: Host, active: bool) -> HostSummary {
    let mut row = HostSummary {
        name: host.name.clone(),
        active,
        driver_name: host.driver_name.clone(),
        state: State::Error,
        url: String::new(),
        error: None,
    };
    let mut driver = match loader
        .load(&host.driver_name, &host.name, host.driver)
        .await
    {
        Ok(driver) => driver,
        Err(err) => {
            row.error = Some(err.to_string());
            return row;
        }
    };
    match driver.state().await {
        Ok(state) => {
            row.state = state;
            if state == State::Running {
                match driver.url().await {
                    Ok(url) => row.url = url,
                    Err(err) => row.error = Some(err.to_string()),
                }
            }
        }
        Err(err) => row.error = Some(err.to_string()),
    }
    close_driver(driver.as_mut()).await;
    row
}
