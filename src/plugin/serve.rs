//! Entry point shared by the plugin binaries.

use std::env;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;

use super::{DEBUG_ENV_KEY, PLUGIN_ENV_KEY, PLUGIN_ENV_VALUE};
use crate::driver::Driver;
use crate::logging;
use crate::rpc::{RpcServerDriver, ServeOutcome};

const NOT_STANDALONE: &str = "This is a Docker Machine plugin binary.
Plugin binaries are not intended to be invoked directly.
Please use this plugin through the main 'docker-machine' binary.";

/// Serves `driver` until the CLI closes it or stops sending heartbeats.
///
/// Prints the listener address as the first stdout line. Once it is out,
/// info logging follows on stdout and debug logging on stderr, and the CLI
/// relays both into its own log.
pub async fn serve_driver(driver: Box<dyn Driver>) -> ExitCode {
    if env::var(PLUGIN_ENV_KEY).ok().as_deref() != Some(PLUGIN_ENV_VALUE) {
        report(NOT_STANDALONE);
        return ExitCode::FAILURE;
    }

    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => {
            report(&format!("Error binding listener: {err}"));
            return ExitCode::FAILURE;
        }
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => {
            report(&format!("Error reading listener address: {err}"));
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = io::stdout();
    if let Err(err) = writeln!(stdout, "{addr}").and_then(|()| stdout.flush()) {
        report(&format!("Error announcing address: {err}"));
        return ExitCode::FAILURE;
    }

    let debug = env::var_os(DEBUG_ENV_KEY).is_some_and(|value| !value.is_empty());
    if let Err(err) = logging::init_plugin(debug) {
        report(&err.to_string());
    }

    match Arc::new(RpcServerDriver::new(driver)).serve(listener).await {
        Ok(ServeOutcome::Closed) => ExitCode::SUCCESS,
        Ok(ServeOutcome::HeartbeatLost) => {
            tracing::debug!("exiting after losing the parent process");
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(&format!("Error serving plugin server: {err}"));
            ExitCode::FAILURE
        }
    }
}

fn report(message: &str) {
    writeln!(io::stderr(), "{message}").ok();
}
