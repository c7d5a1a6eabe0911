//! Plugin binary serving the `generic` driver for existing hosts reachable over SSH.

use std::process::ExitCode;

use docker_machine::drivers::generic::GenericDriver;
use docker_machine::serve_driver;

#[tokio::main]
async fn main() -> ExitCode {
    serve_driver(Box::new(GenericDriver::default())).await
}
