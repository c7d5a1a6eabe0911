//! Binary entry point for the `docker-machine` CLI.

use std::env;
use std::io::{self, Write};
use std::process;

use clap::Parser;
use shell_escape::unix::escape;
use thiserror::Error;

use docker_machine::commands::{
    self, CommandError, EnvSettings, FilterError, ListFilter, Shell, UnknownShellError,
    render_client_flags, render_names, render_table, render_unset,
};
use docker_machine::machine::parse_override;
use docker_machine::ssh::SshCommand;
use docker_machine::{
    Action, ConfigError, CreateRequest, GlobalOverrides, Machine, MachineConfig, MachineError,
    PluginLauncher, PluginLoader, PluginSearch, Store, logging,
};

mod cli;

use cli::{Cli, Command, CreateCommand, EnvCommand, GlobalArgs, SshCommandArgs};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Machine(#[from] MachineError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Shell(#[from] UnknownShellError),
    #[error("failed to encode host: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("child process terminated without an exit status")]
    MissingExitCode,
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    let Cli { globals, command } = cli;
    let settings = MachineConfig::load_without_cli_args()?
        .resolve(global_overrides(globals), env::var("HOME").ok().as_deref())?;
    if let Err(err) = logging::init(settings.debug) {
        writeln!(io::stderr(), "{err}").ok();
    }

    let launcher = PluginLauncher::new(PluginSearch::standard(settings.plugin_dir.as_deref()))
        .with_handshake_timeout(settings.handshake_timeout)
        .with_debug(settings.debug);
    let machine = Machine::new(
        Store::new(settings.storage_path.clone()),
        PluginLoader::new(launcher),
    )
    .with_auth_options(settings.auth_options());

    match command {
        Command::Active(args) => active(&machine, args.name.as_deref()),
        Command::Create(args) => create(&machine, args).await,
        Command::Inspect(args) => {
            let host = machine.inspect(args.name.as_deref())?;
            emit(&format!("{}\n", serde_json::to_string_pretty(&host)?));
            Ok(0)
        }
        Command::Ip(args) => {
            emit(&format!("{}\n", machine.ip(args.name.as_deref()).await?));
            Ok(0)
        }
        Command::Url(args) => {
            emit(&format!("{}\n", machine.url(args.name.as_deref()).await?));
            Ok(0)
        }
        Command::Kill(args) => run_action(&machine, Action::Kill, &args.names).await,
        Command::Restart(args) => run_action(&machine, Action::Restart, &args.names).await,
        Command::Start(args) => run_action(&machine, Action::Start, &args.names).await,
        Command::Stop(args) => run_action(&machine, Action::Stop, &args.names).await,
        Command::Upgrade(args) => run_action(&machine, Action::Upgrade, &args.names).await,
        Command::Ls(args) => {
            let filter = ListFilter::parse(&args.filters)?;
            let rows = filter.apply(machine.list().await?);
            emit(&if args.quiet {
                render_names(&rows)
            } else {
                render_table(&rows)
            });
            Ok(0)
        }
        Command::Rm(args) => {
            machine.remove(&args.names, args.force).await?;
            Ok(0)
        }
        Command::Ssh(args) => ssh(&machine, &args).await,
        Command::Scp(args) => {
            let invocation = machine
                .scp_command(&args.source, &args.destination, args.recursive)
                .await?;
            run_attached(&invocation).await
        }
        Command::Config(args) => {
            let connection = commands::connection(&machine, args.name.as_deref()).await?;
            emit(&format!("{}\n", render_client_flags(&connection, &settings.tls)));
            Ok(0)
        }
        Command::Env(args) => env_command(&machine, &args).await,
    }
}

fn global_overrides(globals: GlobalArgs) -> GlobalOverrides {
    GlobalOverrides {
        storage_path: globals.storage_path,
        tls_ca_cert: globals.tls_ca_cert,
        tls_ca_key: globals.tls_ca_key,
        tls_client_cert: globals.tls_client_cert,
        tls_client_key: globals.tls_client_key,
        plugin_dir: globals.plugin_dir,
        debug: globals.debug,
    }
}

fn active(machine: &Machine<PluginLoader>, name: Option<&str>) -> Result<i32, CliError> {
    if let Some(target) = name {
        machine.set_active(target)?;
        return Ok(0);
    }
    let host = machine.active()?.ok_or(MachineError::NoActiveHost)?;
    emit(&format!("{}\n", host.name));
    Ok(0)
}

async fn create(machine: &Machine<PluginLoader>, args: CreateCommand) -> Result<i32, CliError> {
    let overrides = args
        .options
        .iter()
        .map(|raw| parse_override(raw))
        .collect::<Result<Vec<_>, _>>()?;
    machine
        .create(&CreateRequest {
            name: args.name,
            driver: args.driver,
            overrides,
        })
        .await?;
    Ok(0)
}

async fn run_action(
    machine: &Machine<PluginLoader>,
    action: Action,
    names: &[String],
) -> Result<i32, CliError> {
    machine.run_action(action, names).await?;
    Ok(0)
}

async fn ssh(machine: &Machine<PluginLoader>, args: &SshCommandArgs) -> Result<i32, CliError> {
    validate_command_args(&args.command)?;
    let remote = if args.command.is_empty() {
        Vec::new()
    } else {
        vec![render_remote_command(&args.command)]
    };
    let invocation = machine.ssh_command(Some(&args.name), &remote).await?;
    run_attached(&invocation).await
}

/// Runs `invocation` on this terminal and returns its exit code.
async fn run_attached(invocation: &SshCommand) -> Result<i32, CliError> {
    tracing::debug!(command = %invocation.render(), "running {}", invocation.program);
    let status = tokio::process::Command::new(&invocation.program)
        .args(&invocation.args)
        .status()
        .await
        .map_err(|source| CliError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;
    status.code().ok_or(CliError::MissingExitCode)
}

async fn env_command(machine: &Machine<PluginLoader>, args: &EnvCommand) -> Result<i32, CliError> {
    let shell = match args.shell.as_deref() {
        Some(explicit) => explicit.parse::<Shell>()?,
        None => Shell::detect(env::var("SHELL").ok().as_deref()),
    };
    if args.unset {
        emit(&render_unset(shell));
        return Ok(0);
    }

    let connection = commands::connection(machine, args.name.as_deref()).await?;
    let cert_path = machine.store().host_dir(&connection.name);
    emit(&EnvSettings::new(connection, cert_path).render(shell));
    Ok(0)
}

fn emit(text: &str) {
    write!(io::stdout(), "{text}").ok();
}

fn render_remote_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    if args.iter().any(|arg| arg.contains('\0')) {
        return Err(CliError::InvalidCommand(String::from(
            "command arguments must not contain NUL bytes",
        )));
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
