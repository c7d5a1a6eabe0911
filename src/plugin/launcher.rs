//! Starting a plugin process and connecting to it.

use std::net::SocketAddr;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;

use super::{
    DEBUG_ENV_KEY, DEFAULT_HANDSHAKE_TIMEOUT, PLUGIN_ENV_KEY, PLUGIN_ENV_VALUE, PluginError,
    PluginSearch,
};
use crate::rpc::RpcClientDriver;

/// Starts driver plugins.
#[derive(Clone, Debug)]
pub struct PluginLauncher {
    search: PluginSearch,
    handshake_timeout: Duration,
    debug: bool,
}

impl PluginLauncher {
    /// Creates a launcher searching `search`.
    #[must_use]
    pub const fn new(search: PluginSearch) -> Self {
        Self {
            search,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            debug: false,
        }
    }

    /// Overrides how long a plugin may take to announce its address.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    /// Passes debug mode on to plugins.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Starts the plugin for `driver` and returns a connected driver handle.
    ///
    /// Plugin output is forwarded to the log, prefixed with `machine_name`.
    /// The process is killed if the handle is dropped without closing.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError`] when the binary is missing, fails to start,
    /// does not complete the handshake or refuses the RPC connection.
    pub async fn launch(
        &self,
        driver: &str,
        machine_name: &str,
    ) -> Result<RpcClientDriver, PluginError> {
        let binary = self.search.find(driver)?;
        tracing::debug!(%binary, "launching driver plugin");

        let mut command = Command::new(binary.as_std_path());
        command
            .env(PLUGIN_ENV_KEY, PLUGIN_ENV_VALUE)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.debug {
            command.env(DEBUG_ENV_KEY, "1");
        }
        let mut child = command.spawn().map_err(|source| PluginError::Spawn {
            binary: binary.clone(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| PluginError::HandshakeEof {
            driver: driver.to_owned(),
        })?;
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, machine_name.to_owned(), OutputStream::Stderr);
        }

        let mut reader = BufReader::new(stdout);
        let addr = self.read_address(driver, &mut reader).await?;
        forward_lines(reader, machine_name.to_owned(), OutputStream::Stdout);

        tracing::debug!(%addr, driver, "plugin server listening");
        let client = RpcClientDriver::connect(addr).await?;
        Ok(client.with_process(child))
    }

    async fn read_address<R>(
        &self,
        driver: &str,
        reader: &mut BufReader<R>,
    ) -> Result<SocketAddr, PluginError>
    where
        R: AsyncRead + Unpin,
    {
        let mut line = String::new();
        let read = timeout(self.handshake_timeout, reader.read_line(&mut line))
            .await
            .map_err(|_| PluginError::HandshakeTimeout {
                driver: driver.to_owned(),
                timeout: self.handshake_timeout,
            })?
            .map_err(|source| PluginError::Io {
                driver: driver.to_owned(),
                source,
            })?;
        if read == 0 {
            return Err(PluginError::HandshakeEof {
                driver: driver.to_owned(),
            });
        }
        let announced = line.trim();
        announced
            .parse::<SocketAddr>()
            .map_err(|_| PluginError::InvalidAddress {
                driver: driver.to_owned(),
                line: announced.to_owned(),
            })
    }
}

#[derive(Clone, Copy, Debug)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// Logs every line of a plugin stream until it closes.
fn forward_lines<R>(stream: R, machine_name: String, kind: OutputStream)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match kind {
                    OutputStream::Stdout => tracing::info!("({machine_name}) {line}"),
                    OutputStream::Stderr => tracing::debug!("({machine_name}) DBG | {line}"),
                },
                Ok(None) => break,
                Err(err) => {
                    tracing::debug!(error = %err, "({machine_name}) output stream failed");
                    break;
                }
            }
        }
    });
}
