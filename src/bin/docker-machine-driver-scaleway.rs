//! Plugin binary serving the `scaleway` driver for Scaleway instances.

use std::process::ExitCode;

use docker_machine::drivers::scaleway::ScalewayDriver;
use docker_machine::serve_driver;

#[tokio::main]
async fn main() -> ExitCode {
    serve_driver(Box::new(ScalewayDriver::default())).await
}
