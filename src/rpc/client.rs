//! Client side of the driver protocol.

use std::net::SocketAddr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};

use super::protocol::{API_VERSION, Method, RpcRequest, RpcResponse, write_message};
use super::{HEARTBEAT_INTERVAL, RpcError};
use crate::driver::{
    Driver, DriverError, DriverFuture, DriverOptions, FlagSpec, decode_config, encode_config,
    ready,
};
use crate::ssh::{SshCommand, SshTarget};
use crate::state::State;

const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// One request/response stream to a plugin.
#[derive(Debug)]
pub struct RpcConnection {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl RpcConnection {
    /// Connects to a plugin listening on `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Io`] when the connection is refused.
    pub async fn connect(addr: SocketAddr) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half).lines(),
            writer,
        })
    }

    /// Sends one request and waits for its response.
    ///
    /// The outer error is a transport failure; the inner one is the driver's
    /// own error, carried across unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the exchange fails.
    pub async fn call(
        &mut self,
        method: Method,
        params: Value,
    ) -> Result<Result<Value, DriverError>, RpcError> {
        let request = RpcRequest::new(method, params);
        write_message(&mut self.writer, &request).await?;
        let line = self
            .reader
            .next_line()
            .await?
            .ok_or(RpcError::Disconnected)?;
        let response: RpcResponse = serde_json::from_str(&line)?;
        if response.id != request.id {
            return Err(RpcError::MismatchedResponse {
                expected: request.id,
                got: response.id,
            });
        }
        Ok(response.into_result())
    }
}

/// A [`Driver`] whose every method runs inside a plugin process.
///
/// Created by [`RpcClientDriver::connect`], which checks the protocol version
/// and starts a heartbeat on a second connection. [`Driver::close`] asks the
/// plugin to exit and reaps the attached process.
pub struct RpcClientDriver {
    driver_name: String,
    connection: Mutex<RpcConnection>,
    heartbeat: Option<JoinHandle<()>>,
    process: Option<Child>,
}

impl RpcClientDriver {
    /// Connects to the plugin at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::IncompatibleVersion`] when the plugin speaks
    /// another protocol revision, or a transport error.
    pub async fn connect(addr: SocketAddr) -> Result<Self, RpcError> {
        let mut connection = RpcConnection::connect(addr).await?;
        let version: i64 = expect_value(connection.call(Method::GetVersion, Value::Null).await?)?;
        if version != API_VERSION {
            return Err(RpcError::IncompatibleVersion(version));
        }
        tracing::debug!(%addr, version, "using API version");
        let driver_name: String =
            expect_value(connection.call(Method::DriverName, Value::Null).await?)?;

        let heartbeat_connection = RpcConnection::connect(addr).await?;
        Ok(Self {
            driver_name,
            connection: Mutex::new(connection),
            heartbeat: Some(tokio::spawn(send_heartbeats(heartbeat_connection))),
            process: None,
        })
    }

    /// Ties the plugin process to this handle so [`Driver::close`] can reap
    /// it.
    #[must_use]
    pub fn with_process(mut self, child: Child) -> Self {
        self.process = Some(child);
        self
    }

    fn call<'a, T>(&'a self, method: Method, params: Value) -> DriverFuture<'a, T>
    where
        T: DeserializeOwned + Send + 'a,
    {
        Box::pin(async move {
            let value = self.connection.lock().await.call(method, params).await??;
            decode_config(value)
        })
    }

    fn call_with<'a, T, P>(&'a self, method: Method, params: &P) -> DriverFuture<'a, T>
    where
        T: DeserializeOwned + Send + 'a,
        P: serde::Serialize + ?Sized,
    {
        match encode_config(params) {
            Ok(value) => self.call(method, value),
            Err(err) => ready(Err(err)),
        }
    }

    async fn reap(&mut self) {
        let Some(mut child) = self.process.take() else {
            return;
        };
        match timeout(REAP_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(%status, "driver plugin exited"),
            Ok(Err(err)) => tracing::warn!(error = %err, "failed to wait for driver plugin"),
            Err(_) => {
                tracing::warn!("driver plugin did not exit after close, killing it");
                if let Err(err) = child.kill().await {
                    tracing::warn!(error = %err, "failed to kill driver plugin");
                }
            }
        }
    }
}

impl Drop for RpcClientDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.abort();
        }
    }
}

fn expect_value<T: DeserializeOwned>(outcome: Result<Value, DriverError>) -> Result<T, RpcError> {
    Ok(serde_json::from_value(outcome.map_err(RpcError::Remote)?)?)
}

async fn send_heartbeats(mut connection: RpcConnection) {
    let mut ticker = interval(HEARTBEAT_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(err) = connection.call(Method::Heartbeat, Value::Null).await {
            tracing::debug!(error = %err, "heartbeat stopped");
            return;
        }
    }
}

impl Driver for RpcClientDriver {
    fn driver_name(&self) -> &str {
        &self.driver_name
    }

    fn create_flags(&self) -> DriverFuture<'_, Vec<FlagSpec>> {
        self.call(Method::GetCreateFlags, Value::Null)
    }

    fn config_raw(&self) -> DriverFuture<'_, Value> {
        self.call(Method::GetConfigRaw, Value::Null)
    }

    fn set_config_raw(&mut self, raw: Value) -> DriverFuture<'_, ()> {
        self.call(Method::SetConfigRaw, raw)
    }

    fn set_config_from_flags<'a>(
        &'a mut self,
        options: &'a DriverOptions,
    ) -> DriverFuture<'a, ()> {
        self.call_with(Method::SetConfigFromFlags, options)
    }

    fn pre_create_check(&self) -> DriverFuture<'_, ()> {
        self.call(Method::PreCreateCheck, Value::Null)
    }

    fn machine_name(&self) -> DriverFuture<'_, String> {
        self.call(Method::GetMachineName, Value::Null)
    }

    fn create(&mut self) -> DriverFuture<'_, ()> {
        self.call(Method::Create, Value::Null)
    }

    fn remove(&mut self) -> DriverFuture<'_, ()> {
        self.call(Method::Remove, Value::Null)
    }

    fn start(&mut self) -> DriverFuture<'_, ()> {
        self.call(Method::Start, Value::Null)
    }

    fn stop(&mut self) -> DriverFuture<'_, ()> {
        self.call(Method::Stop, Value::Null)
    }

    fn restart(&mut self) -> DriverFuture<'_, ()> {
        self.call(Method::Restart, Value::Null)
    }

    fn kill(&mut self) -> DriverFuture<'_, ()> {
        self.call(Method::Kill, Value::Null)
    }

    fn upgrade(&mut self) -> DriverFuture<'_, ()> {
        self.call(Method::Upgrade, Value::Null)
    }

    fn ip(&self) -> DriverFuture<'_, String> {
        self.call(Method::GetIp, Value::Null)
    }

    fn url(&self) -> DriverFuture<'_, String> {
        self.call(Method::GetUrl, Value::Null)
    }

    fn state(&self) -> DriverFuture<'_, State> {
        self.call(Method::GetState, Value::Null)
    }

    fn ssh_command<'a>(&'a self, args: &'a [String]) -> DriverFuture<'a, SshCommand> {
        self.call_with(Method::GetSshCommand, args)
    }

    fn ssh_target(&self) -> DriverFuture<'_, SshTarget> {
        self.call(Method::GetSshTarget, Value::Null)
    }

    fn close(&mut self) -> DriverFuture<'_, ()> {
        Box::pin(async move {
            let closed = self
                .connection
                .lock()
                .await
                .call(Method::Close, Value::Null)
                .await;
            if let Some(handle) = self.heartbeat.take() {
                handle.abort();
            }
            self.reap().await;
            closed?.map(drop)
        })
    }
}
