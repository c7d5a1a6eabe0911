//! Core library for the `docker-machine` tool.
//!
//! Hosts are provisioned through drivers that implement [`driver::Driver`].
//! The CLI never links a provider directly: each driver runs as a plugin
//! binary, launched on demand and spoken to over a line-delimited JSON RPC
//! connection, while hosts and the active-host marker live in a filesystem
//! [`store::Store`].

pub mod commands;
pub mod config;
pub mod driver;
pub mod drivers;
pub mod files;
pub mod host;
pub mod logging;
pub mod machine;
pub mod plugin;
pub mod rpc;
pub mod ssh;
pub mod state;
pub mod store;
pub mod test_support;
pub mod wait;

pub use config::{ConfigError, GlobalOverrides, MachineConfig, MachineSettings};
pub use driver::{Driver, DriverError, DriverOptions, FlagSpec, FlagValue};
pub use host::Host;
pub use machine::{Action, CreateRequest, HostSummary, Machine, MachineError, PluginLoader};
pub use plugin::{PluginError, PluginLauncher, PluginSearch, serve_driver};
pub use state::State;
pub use store::{Store, StoreError};
