//! Log output for the CLI and plugin processes.
//!
//! The CLI logs to stderr so stdout stays reserved for command output.
//! Plugins log info and above to stdout and debug output to stderr; the CLI
//! relays the two streams at those levels.

use std::io;

use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding a full filter directive, for example
/// `docker_machine=trace`.
pub const LOG_ENV: &str = "MACHINE_LOG";

/// Raised when the global subscriber cannot be installed.
#[derive(Debug, Error)]
#[error("failed to initialise logging: {0}")]
pub struct LoggingError(String);

/// Builds the filter: `MACHINE_LOG` when set and valid, otherwise `debug`
/// or `info`.
#[must_use]
pub fn filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

/// Installs the global subscriber.
///
/// Debug mode adds levels and targets to each line; the default output is
/// bare messages.
///
/// # Errors
///
/// Returns [`LoggingError`] when a subscriber is already installed.
pub fn init(debug: bool) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(filter(debug))
        .with_writer(io::stderr)
        .without_time()
        .with_level(debug)
        .with_target(debug)
        .try_init()
        .map_err(|err| LoggingError(err.to_string()))
}

/// Installs the global subscriber of a plugin process.
///
/// Call it only after the address handshake has been written, since info
/// lines go to stdout.
///
/// # Errors
///
/// Returns [`LoggingError`] when a subscriber is already installed.
pub fn init_plugin(debug: bool) -> Result<(), LoggingError> {
    plugin_subscriber(filter(debug), debug, io::stdout, io::stderr)
        .try_init()
        .map_err(|err| LoggingError(err.to_string()))
}

fn plugin_subscriber<O, E>(
    env_filter: EnvFilter,
    debug: bool,
    out: O,
    err: E,
) -> impl Subscriber + Send + Sync + 'static
where
    O: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    E: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(out.with_max_level(Level::INFO).or_else(err))
        .with_ansi(false)
        .without_time()
        .with_level(debug)
        .with_target(debug)
        .finish()
}
