//! Plugin binary serving the `none` driver for hosts that already run Docker.

use std::process::ExitCode;

use docker_machine::drivers::none::NoneDriver;
use docker_machine::serve_driver;

#[tokio::main]
async fn main() -> ExitCode {
    serve_driver(Box::new(NoneDriver::default())).await
}
