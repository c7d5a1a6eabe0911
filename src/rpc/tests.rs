//! In-process tests for the RPC server and client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::*;
use crate::driver::{Driver, DriverOptions, FlagValue};
use crate::drivers::none::NoneDriver;
use crate::state::State;

async fn spawn_server(
    heartbeat_timeout: Duration,
) -> (SocketAddr, JoinHandle<Result<ServeOutcome, RpcError>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|err| panic!("bind: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("local addr: {err}"));
    let server = Arc::new(
        RpcServerDriver::new(Box::new(NoneDriver::default()))
            .with_heartbeat_timeout(heartbeat_timeout),
    );
    (addr, tokio::spawn(server.serve(listener)))
}

async fn connected_client() -> (RpcClientDriver, JoinHandle<Result<ServeOutcome, RpcError>>) {
    let (addr, server) = spawn_server(HEARTBEAT_TIMEOUT).await;
    let client = RpcClientDriver::connect(addr)
        .await
        .unwrap_or_else(|err| panic!("connect: {err}"));
    (client, server)
}

#[tokio::test]
async fn client_reports_remote_driver_name() {
    let (client, _server) = connected_client().await;
    assert_eq!(client.driver_name(), "none");
}

#[tokio::test]
async fn configuration_round_trips_over_the_wire() {
    let (mut client, _server) = connected_client().await;
    client
        .set_config_raw(json!({"MachineName": "test", "StorePath": "/tmp/machine/test"}))
        .await
        .unwrap_or_else(|err| panic!("set raw: {err}"));
    let options = DriverOptions::new().with(
        "url",
        FlagValue::String(String::from("unix:///var/run/docker.sock")),
    );
    client
        .set_config_from_flags(&options)
        .await
        .unwrap_or_else(|err| panic!("set flags: {err}"));

    assert_eq!(
        client.url().await.as_deref(),
        Ok("unix:///var/run/docker.sock")
    );
    assert_eq!(client.machine_name().await.as_deref(), Ok("test"));
    assert_eq!(client.state().await, Ok(State::Running));
    let raw = client
        .config_raw()
        .await
        .unwrap_or_else(|err| panic!("get raw: {err}"));
    assert_eq!(raw["URL"], "unix:///var/run/docker.sock");
}

#[tokio::test]
async fn driver_errors_cross_unchanged() {
    let (mut client, _server) = connected_client().await;

    assert_eq!(
        client.start().await,
        Err(DriverError::NotSupported(String::from(
            "hosts without a driver cannot be started"
        )))
    );
    assert_eq!(
        client.set_config_from_flags(&DriverOptions::new()).await,
        Err(DriverError::MissingOption(String::from(
            "--url option is required when no driver is selected"
        )))
    );
    assert_eq!(
        client.ssh_target().await,
        Err(DriverError::NotSupported(String::from(
            "the none driver does not support file copies"
        )))
    );
}

#[tokio::test]
async fn create_flags_are_listed() {
    let (client, _server) = connected_client().await;
    let flags = client
        .create_flags()
        .await
        .unwrap_or_else(|err| panic!("flags: {err}"));
    let names: Vec<&str> = flags.iter().map(|flag| flag.name.as_str()).collect();
    assert_eq!(names, ["url"]);
}

#[tokio::test]
async fn close_stops_the_server() {
    let (mut client, server) = connected_client().await;

    client
        .close()
        .await
        .unwrap_or_else(|err| panic!("close: {err}"));

    let outcome = timeout(Duration::from_secs(5), server)
        .await
        .unwrap_or_else(|err| panic!("server did not stop: {err}"))
        .unwrap_or_else(|err| panic!("server task: {err}"))
        .unwrap_or_else(|err| panic!("serve: {err}"));
    assert_eq!(outcome, ServeOutcome::Closed);
}

#[tokio::test]
async fn heartbeats_keep_the_server_alive() {
    let (addr, server) = spawn_server(Duration::from_millis(600)).await;
    let client = RpcClientDriver::connect(addr)
        .await
        .unwrap_or_else(|err| panic!("connect: {err}"));

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(!server.is_finished());
    assert_eq!(client.state().await, Ok(State::Running));
}

#[tokio::test]
async fn server_exits_without_heartbeats() {
    let (addr, server) = spawn_server(Duration::from_millis(300)).await;
    let mut connection = RpcConnection::connect(addr)
        .await
        .unwrap_or_else(|err| panic!("connect: {err}"));
    let version = connection
        .call(Method::GetVersion, Value::Null)
        .await
        .unwrap_or_else(|err| panic!("call: {err}"));
    assert_eq!(version, Ok(json!(API_VERSION)));

    let outcome = timeout(Duration::from_secs(5), server)
        .await
        .unwrap_or_else(|err| panic!("server did not stop: {err}"))
        .unwrap_or_else(|err| panic!("server task: {err}"))
        .unwrap_or_else(|err| panic!("serve: {err}"));
    assert_eq!(outcome, ServeOutcome::HeartbeatLost);
}

#[tokio::test]
async fn client_rejects_other_api_versions() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|err| panic!("bind: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("local addr: {err}"));
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        if let Ok(Some(line)) = lines.next_line().await
            && let Ok(request) = serde_json::from_str::<RpcRequest>(&line)
        {
            let response = RpcResponse::from_result(request.id, Ok(json!(2)));
            write_message(&mut write_half, &response)
                .await
                .unwrap_or_else(|err| panic!("reply: {err}"));
        }
    });

    let Err(err) = RpcClientDriver::connect(addr).await else {
        panic!("version 2 should be rejected");
    };
    assert_eq!(
        err.to_string(),
        "Driver binary uses an incompatible API version (2)"
    );
}

#[tokio::test]
async fn malformed_requests_get_an_error_reply() {
    let (addr, _server) = spawn_server(HEARTBEAT_TIMEOUT).await;
    let mut stream = TcpStream::connect(addr)
        .await
        .unwrap_or_else(|err| panic!("connect: {err}"));
    stream
        .write_all(b"{\"method\":\"Teleport\"}\n")
        .await
        .unwrap_or_else(|err| panic!("write: {err}"));

    let mut reply = String::new();
    BufReader::new(&mut stream)
        .read_line(&mut reply)
        .await
        .unwrap_or_else(|err| panic!("read: {err}"));
    let response: RpcResponse =
        serde_json::from_str(&reply).unwrap_or_else(|err| panic!("decode: {err}"));

    assert!(matches!(
        response.error,
        Some(DriverError::Rpc(ref msg)) if msg.starts_with("malformed request")
    ));
}

/// Answers the connect handshake, accepts the heartbeat connection and then
/// drops every socket, as a plugin process that died would.
async fn crashing_plugin() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap_or_else(|err| panic!("bind: {err}"));
    let addr = listener
        .local_addr()
        .unwrap_or_else(|err| panic!("local addr: {err}"));
    let plugin = tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        for result in [json!(API_VERSION), json!("none")] {
            let Ok(Some(line)) = lines.next_line().await else {
                return;
            };
            let Ok(request) = serde_json::from_str::<RpcRequest>(&line) else {
                return;
            };
            write_message(&mut write_half, &RpcResponse::from_result(request.id, Ok(result)))
                .await
                .unwrap_or_else(|err| panic!("reply: {err}"));
        }
        let _heartbeat = listener.accept().await;
    });
    (addr, plugin)
}

#[tokio::test]
async fn crashed_plugin_surfaces_as_rpc_error() {
    let (addr, plugin) = crashing_plugin().await;
    let client = RpcClientDriver::connect(addr)
        .await
        .unwrap_or_else(|err| panic!("connect: {err}"));
    plugin
        .await
        .unwrap_or_else(|err| panic!("plugin task: {err}"));

    let Err(err) = client.state().await else {
        panic!("a call after the plugin died should fail");
    };
    assert!(matches!(err, DriverError::Rpc(_)), "got {err}");
}
