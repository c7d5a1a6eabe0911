//! Behavioural tests for the `docker-machine` CLI driving real plugin binaries.

use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use predicates::str::{contains, diff};
use rstest::{fixture, rstest};
use tempfile::TempDir;

const DOCKER_URL: &str = "tcp://192.0.2.7:2376";

struct Workspace {
    tmp: TempDir,
    storage: PathBuf,
}

#[fixture]
fn workspace() -> Workspace {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let storage = tmp.path().join("machine");
    Workspace { tmp, storage }
}

fn plugin_dir() -> &'static Path {
    Path::new(env!("CARGO_BIN_EXE_docker-machine-driver-none"))
        .parent()
        .unwrap_or_else(|| panic!("plugin binary should live in a directory"))
}

fn machine(workspace: &Workspace, args: &[&str]) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("docker-machine");
    cmd.current_dir(workspace.tmp.path())
        .env("HOME", workspace.tmp.path())
        .env("MACHINE_STORAGE_PATH", &workspace.storage)
        .env("MACHINE_PLUGIN_DIR", plugin_dir())
        .env_remove("MACHINE_CONFIG_PATH")
        .env_remove("MACHINE_DEBUG")
        .env_remove("MACHINE_LOG")
        .args(args);
    cmd
}

fn create_none_host(workspace: &Workspace, name: &str) {
    let url_option = format!("url={DOCKER_URL}");
    machine(workspace, &["create", "-d", "none", "-o", &url_option, name])
        .assert()
        .success()
        .stderr(contains(format!(
            "\"{name}\" has been created and is now the active machine."
        )));
}

#[rstest]
fn none_host_lifecycle(workspace: Workspace) {
    create_none_host(&workspace, "dev");

    machine(&workspace, &["url", "dev"])
        .assert()
        .success()
        .stdout(diff(format!("{DOCKER_URL}\n")));
    machine(&workspace, &["ip"])
        .assert()
        .success()
        .stdout("192.0.2.7\n");
    machine(&workspace, &["active"])
        .assert()
        .success()
        .stdout("dev\n");
    machine(&workspace, &["ls"])
        .assert()
        .success()
        .stdout(
            contains("NAME")
                .and(contains("dev"))
                .and(contains("*"))
                .and(contains("Running"))
                .and(contains(DOCKER_URL)),
        );
    machine(&workspace, &["ls", "-q"])
        .assert()
        .success()
        .stdout("dev\n");

    machine(&workspace, &["rm", "dev"]).assert().success();
    machine(&workspace, &["ls", "-q"]).assert().success().stdout("");
    machine(&workspace, &["active"])
        .assert()
        .failure()
        .code(1);
}

#[rstest]
fn start_is_rejected_by_none_driver(workspace: Workspace) {
    create_none_host(&workspace, "dev");

    machine(&workspace, &["start", "dev"])
        .assert()
        .failure()
        .code(1)
        .stderr(
            contains("hosts without a driver cannot be started")
                .and(contains("failed to start 1 of 1 machine(s)")),
        );
}

#[rstest]
fn env_prints_exports_for_host(workspace: Workspace) {
    create_none_host(&workspace, "dev");

    machine(&workspace, &["env", "--shell", "bash", "dev"])
        .assert()
        .success()
        .stdout(
            contains(format!("export DOCKER_HOST=\"{DOCKER_URL}\""))
                .and(contains("export DOCKER_MACHINE_NAME=\"dev\""))
                .and(contains("eval \"$(docker-machine env dev)\"")),
        );
}

#[rstest]
fn inspect_prints_stored_host(workspace: Workspace) {
    create_none_host(&workspace, "dev");

    machine(&workspace, &["inspect", "dev"])
        .assert()
        .success()
        .stdout(contains("\"DriverName\": \"none\"").and(contains(DOCKER_URL)));
}

#[rstest]
fn duplicate_create_is_rejected(workspace: Workspace) {
    create_none_host(&workspace, "dev");

    let url_option = format!("url={DOCKER_URL}");
    machine(&workspace, &["create", "-o", &url_option, "dev"])
        .assert()
        .failure()
        .stderr(contains("Host already exists: \"dev\""));
}

#[rstest]
fn create_without_url_names_missing_option(workspace: Workspace) {
    machine(&workspace, &["create", "-d", "none", "dev"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("--url option is required when no driver is selected"));
    machine(&workspace, &["ls", "-q"]).assert().success().stdout("");
}

#[rstest]
fn unknown_driver_reports_missing_plugin(workspace: Workspace) {
    machine(&workspace, &["create", "-d", "nosuch", "dev"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains(
            "Driver \"nosuch\" not found. Do you have the plugin binary accessible in your PATH?",
        ));
}

#[rstest]
fn remove_of_unknown_host_fails(workspace: Workspace) {
    machine(&workspace, &["rm", "ghost"])
        .assert()
        .failure()
        .stderr(contains("Host does not exist: \"ghost\""));
}

#[rstest]
fn remove_keeps_going_after_missing_host(workspace: Workspace) {
    create_none_host(&workspace, "b");

    machine(&workspace, &["rm", "missing", "b"])
        .assert()
        .failure()
        .code(1)
        .stderr(
            contains("Host does not exist: \"missing\"")
                .and(contains("Successfully removed b"))
                .and(contains("To force remove it, pass the -f option.")),
        );
    machine(&workspace, &["ls", "-q"]).assert().success().stdout("");
}

#[test]
fn plugin_refuses_to_run_standalone() {
    let output = Command::new(env!("CARGO_BIN_EXE_docker-machine-driver-none"))
        .env_remove("MACHINE_PLUGIN_TOKEN")
        .output()
        .unwrap_or_else(|err| panic!("run plugin: {err}"));

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("This is a Docker Machine plugin binary."),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[rstest]
fn socket_url_is_returned_verbatim(workspace: Workspace) {
    machine(
        &workspace,
        &["create", "-o", "url=unix:///var/run/docker.sock", "test"],
    )
    .assert()
    .success();

    machine(&workspace, &["url", "test"])
        .assert()
        .success()
        .stdout("unix:///var/run/docker.sock\n");
}

#[rstest]
fn ls_filter_narrows_listing(workspace: Workspace) {
    create_none_host(&workspace, "web");
    create_none_host(&workspace, "db");

    machine(&workspace, &["ls", "-q", "--filter", "name=^w"])
        .assert()
        .success()
        .stdout("web\n");
    machine(&workspace, &["ls", "-q", "--filter", "driver=none", "--filter", "state=Running"])
        .assert()
        .success()
        .stdout("db\nweb\n");
    machine(&workspace, &["ls", "--filter", "swarm=master"])
        .assert()
        .failure()
        .stderr(contains("Unsupported filter key 'swarm'"));
}

#[rstest]
fn scp_rejects_malformed_path(workspace: Workspace) {
    machine(&workspace, &["scp", "dev:/a:b", "."])
        .assert()
        .failure()
        .stderr(contains("The input was malformed"));
}

#[rstest]
fn scp_is_refused_by_none_driver(workspace: Workspace) {
    create_none_host(&workspace, "dev");

    machine(&workspace, &["scp", "./notes.txt", "dev:/tmp/notes.txt"])
        .assert()
        .failure()
        .stderr(contains("does not support file copies"));
}
