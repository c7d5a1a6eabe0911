//! Command-line interface definitions for the `docker-machine` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `docker-machine` binary.
#[derive(Debug, Parser)]
#[command(
    name = "docker-machine",
    about = "Create and manage machines running Docker",
    version,
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Options shared by every subcommand.
    #[command(flatten)]
    pub(crate) globals: GlobalArgs,
    /// Subcommand to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Global options. Unset options fall back to `machine.toml` and
/// `MACHINE_*` environment variables.
#[derive(Debug, Args)]
pub(crate) struct GlobalArgs {
    /// Directory holding machine state (default `~/.docker/machine`).
    #[arg(long, short = 's', global = true, value_name = "PATH")]
    pub(crate) storage_path: Option<String>,
    /// CA certificate handed to Docker clients.
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) tls_ca_cert: Option<String>,
    /// Private key of the CA, recorded with each created machine.
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) tls_ca_key: Option<String>,
    /// Client certificate handed to Docker clients.
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) tls_client_cert: Option<String>,
    /// Client private key handed to Docker clients.
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) tls_client_key: Option<String>,
    /// Directory searched first for driver plugins.
    #[arg(long, global = true, value_name = "DIR")]
    pub(crate) plugin_dir: Option<String>,
    /// Enable debug output.
    #[arg(long, short = 'D', global = true)]
    pub(crate) debug: bool,
}

/// Subcommands of `docker-machine`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Print the active machine, or make the named machine active.
    #[command(name = "active")]
    Active(OptionalMachine),
    /// Create a machine.
    #[command(name = "create")]
    Create(CreateCommand),
    /// Print a machine's stored configuration as JSON.
    #[command(name = "inspect")]
    Inspect(OptionalMachine),
    /// Print a machine's IP address.
    #[command(name = "ip")]
    Ip(OptionalMachine),
    /// Forcefully power off machines.
    #[command(name = "kill")]
    Kill(Machines),
    /// List machines.
    #[command(name = "ls")]
    Ls(LsCommand),
    /// Restart machines.
    #[command(name = "restart")]
    Restart(Machines),
    /// Remove machines.
    #[command(name = "rm")]
    Rm(RmCommand),
    /// Start machines.
    #[command(name = "start")]
    Start(Machines),
    /// Stop machines.
    #[command(name = "stop")]
    Stop(Machines),
    /// Upgrade Docker on machines.
    #[command(name = "upgrade")]
    Upgrade(Machines),
    /// Print a machine's Docker URL.
    #[command(name = "url")]
    Url(OptionalMachine),
    /// Log into or run a command on a machine over SSH.
    #[command(name = "ssh")]
    Ssh(SshCommandArgs),
    /// Copy files between machines and this host.
    #[command(name = "scp")]
    Scp(ScpCommand),
    /// Print the Docker client flags for a machine.
    #[command(name = "config")]
    Config(OptionalMachine),
    /// Print the shell commands that point Docker at a machine.
    #[command(name = "env")]
    Env(EnvCommand),
}

/// A single machine, defaulting to the active one.
#[derive(Debug, Args)]
pub(crate) struct OptionalMachine {
    /// Machine name (defaults to the active machine).
    pub(crate) name: Option<String>,
}

/// Any number of machines, defaulting to the active one.
#[derive(Debug, Args)]
pub(crate) struct Machines {
    /// Machine names (defaults to the active machine).
    pub(crate) names: Vec<String>,
}

/// Arguments for `docker-machine create`.
#[derive(Debug, Args)]
pub(crate) struct CreateCommand {
    /// Driver to create the machine with.
    #[arg(long, short = 'd', default_value = "none")]
    pub(crate) driver: String,
    /// Driver option as `key=value`, for example `-o url=tcp://10.0.0.2:2376`.
    /// Repeat for several options.
    #[arg(long = "driver-opt", short = 'o', value_name = "KEY=VALUE")]
    pub(crate) options: Vec<String>,
    /// Name of the new machine.
    pub(crate) name: String,
}

/// Arguments for `docker-machine ls`.
#[derive(Debug, Args)]
pub(crate) struct LsCommand {
    /// Print machine names only.
    #[arg(long, short = 'q')]
    pub(crate) quiet: bool,
    /// Show only machines matching KEY=VALUE, where KEY is driver, state or
    /// name (a regular expression). Repeatable.
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    pub(crate) filters: Vec<String>,
}

/// Arguments for `docker-machine rm`.
#[derive(Debug, Args)]
pub(crate) struct RmCommand {
    /// Remove local state even when the driver fails to remove the machine.
    #[arg(long, short = 'f')]
    pub(crate) force: bool,
    /// Machines to remove.
    #[arg(required = true)]
    pub(crate) names: Vec<String>,
}

/// Arguments for `docker-machine ssh`.
#[derive(Debug, Args)]
pub(crate) struct SshCommandArgs {
    /// Machine to connect to.
    pub(crate) name: String,
    /// Command to run instead of an interactive shell (use -- to separate
    /// flags).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub(crate) command: Vec<String>,
}

/// Arguments for `docker-machine scp`.
#[derive(Debug, Args)]
pub(crate) struct ScpCommand {
    /// Copy directories recursively.
    #[arg(long, short = 'r')]
    pub(crate) recursive: bool,
    /// Source path, as `machine:path` for a remote file.
    pub(crate) source: String,
    /// Destination path, as `machine:path` for a remote file.
    pub(crate) destination: String,
}

/// Arguments for `docker-machine env`.
#[derive(Debug, Args)]
pub(crate) struct EnvCommand {
    /// Shell syntax to print (detected from `$SHELL` when omitted).
    #[arg(long, value_parser = ["bash", "sh", "zsh", "fish", "powershell", "cmd"])]
    pub(crate) shell: Option<String>,
    /// Print commands that unset the variables instead.
    #[arg(long, short = 'u')]
    pub(crate) unset: bool,
    /// Machine name (defaults to the active machine).
    pub(crate) name: Option<String>,
}
