//! Serves one driver to RPC clients.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify, watch};
use tokio::time::{Instant, sleep_until};

use super::protocol::{API_VERSION, Method, RpcRequest, RpcResponse, write_message};
use super::{HEARTBEAT_TIMEOUT, RpcError};
use crate::driver::{Driver, DriverError, DriverOptions};

/// Why [`RpcServerDriver::serve`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServeOutcome {
    /// A client sent `Close`.
    Closed,
    /// No heartbeat arrived within the timeout; the parent is presumed gone.
    HeartbeatLost,
}

/// Owns a driver and answers RPC calls against it.
///
/// Driver calls are serialised through an async mutex. `Heartbeat`,
/// `GetVersion` and `Close` never take the lock, so a long `Create` does not
/// starve the heartbeat connection.
pub struct RpcServerDriver {
    driver: Mutex<Box<dyn Driver>>,
    closed: Notify,
    heartbeat: watch::Sender<Instant>,
    heartbeat_timeout: Duration,
}

impl RpcServerDriver {
    /// Wraps `driver` with the default heartbeat timeout.
    #[must_use]
    pub fn new(driver: Box<dyn Driver>) -> Self {
        Self {
            driver: Mutex::new(driver),
            closed: Notify::new(),
            heartbeat: watch::Sender::new(Instant::now()),
            heartbeat_timeout: HEARTBEAT_TIMEOUT,
        }
    }

    /// Overrides how long the server tolerates heartbeat silence.
    #[must_use]
    pub const fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Accepts connections until a client closes the server or heartbeats
    /// stop. Each connection is served on its own task.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Io`] when the listener fails.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<ServeOutcome, RpcError> {
        self.heartbeat.send_replace(Instant::now());
        loop {
            let deadline = *self.heartbeat.borrow() + self.heartbeat_timeout;
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    tracing::debug!(%peer, "accepted rpc connection");
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(err) = server.serve_connection(stream).await {
                            tracing::debug!(error = %err, "rpc connection ended");
                        }
                    });
                }
                () = self.closed.notified() => {
                    self.shutdown_driver().await;
                    return Ok(ServeOutcome::Closed);
                }
                () = sleep_until(deadline) => {
                    if self.heartbeat.borrow().elapsed() >= self.heartbeat_timeout {
                        tracing::warn!("no heartbeat from client, shutting down");
                        self.shutdown_driver().await;
                        return Ok(ServeOutcome::HeartbeatLost);
                    }
                }
            }
        }
    }

    async fn shutdown_driver(&self) {
        if let Err(err) = self.driver.lock().await.close().await {
            tracing::debug!(error = %err, "driver close failed");
        }
    }

    async fn serve_connection(&self, stream: TcpStream) -> Result<(), RpcError> {
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        while let Some(line) = lines.next_line().await? {
            let (response, close) = match serde_json::from_str::<RpcRequest>(&line) {
                Ok(request) => {
                    let close = request.method == Method::Close;
                    let outcome = self.dispatch(request.method, request.params).await;
                    (RpcResponse::from_result(request.id, outcome), close)
                }
                Err(err) => (
                    RpcResponse::from_result(
                        String::new(),
                        Err(DriverError::Rpc(format!("malformed request: {err}"))),
                    ),
                    false,
                ),
            };
            write_message(&mut write_half, &response).await?;
            if close {
                self.closed.notify_one();
            }
        }
        Ok(())
    }

    /// Runs one method against the wrapped driver.
    async fn dispatch(&self, method: Method, params: Value) -> Result<Value, DriverError> {
        match method {
            Method::GetVersion => return to_json(&API_VERSION),
            Method::Heartbeat => {
                self.heartbeat.send_replace(Instant::now());
                return Ok(Value::Null);
            }
            Method::Close => return Ok(Value::Null),
            _ => {}
        }

        let mut driver = self.driver.lock().await;
        tracing::debug!(?method, "dispatching driver call");
        match method {
            Method::DriverName => to_json(driver.driver_name()),
            Method::GetCreateFlags => to_json(&driver.create_flags().await?),
            Method::GetConfigRaw => driver.config_raw().await,
            Method::SetConfigRaw => unit(driver.set_config_raw(params).await),
            Method::SetConfigFromFlags => {
                let options: DriverOptions = from_json(params)?;
                unit(driver.set_config_from_flags(&options).await)
            }
            Method::PreCreateCheck => unit(driver.pre_create_check().await),
            Method::GetMachineName => to_json(&driver.machine_name().await?),
            Method::Create => unit(driver.create().await),
            Method::Remove => unit(driver.remove().await),
            Method::Start => unit(driver.start().await),
            Method::Stop => unit(driver.stop().await),
            Method::Restart => unit(driver.restart().await),
            Method::Kill => unit(driver.kill().await),
            Method::Upgrade => unit(driver.upgrade().await),
            Method::GetIp => to_json(&driver.ip().await?),
            Method::GetUrl => to_json(&driver.url().await?),
            Method::GetState => to_json(&driver.state().await?),
            Method::GetSshCommand => {
                let args: Vec<String> = from_json(params)?;
                to_json(&driver.ssh_command(&args).await?)
            }
            Method::GetSshTarget => to_json(&driver.ssh_target().await?),
            Method::GetVersion | Method::Heartbeat | Method::Close => Ok(Value::Null),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, DriverError> {
    serde_json::to_value(value).map_err(DriverError::from)
}

fn from_json<T: DeserializeOwned>(value: Value) -> Result<T, DriverError> {
    serde_json::from_value(value).map_err(DriverError::from)
}

fn unit(result: Result<(), DriverError>) -> Result<Value, DriverError> {
    result.map(|()| Value::Null)
}
