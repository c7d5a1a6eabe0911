//! Tests for command output rendering.

use camino::{Utf8Path, Utf8PathBuf};
use rstest::rstest;
use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::host::Host;
use crate::machine::HostSummary;
use crate::store::Store;
use crate::test_support::{SCRIPTED_DRIVER, ScriptedBehaviour, ScriptedLoader};

fn summary(name: &str, active: bool, driver: &str, state: State, url: &str) -> HostSummary {
    HostSummary {
        name: name.to_owned(),
        active,
        driver_name: driver.to_owned(),
        state,
        url: url.to_owned(),
        error: None,
    }
}

fn sample_connection() -> Connection {
    Connection {
        name: String::from("dev"),
        url: String::from("tcp://192.0.2.10:2376"),
    }
}

#[test]
fn table_aligns_columns() {
    let rows = vec![
        summary("alpha", true, "none", State::Running, "tcp://1.2.3.4:2376"),
        summary("beta", false, "generic", State::Stopped, ""),
    ];

    let expected = concat!(
        "NAME    ACTIVE   DRIVER    STATE     URL                  ERRORS\n",
        "alpha   *        none      Running   tcp://1.2.3.4:2376\n",
        "beta             generic   Stopped\n",
    );
    assert_eq!(render_table(&rows), expected);
}

#[test]
fn empty_table_has_only_headers() {
    assert_eq!(render_table(&[]), "NAME   ACTIVE   DRIVER   STATE   URL   ERRORS\n");
}

#[test]
fn table_shows_why_a_host_errored() {
    let mut broken = summary("broken", false, "missing", State::Error, "");
    broken.error = Some(String::from("plugin not found"));

    let expected = concat!(
        "NAME     ACTIVE   DRIVER    STATE   URL   ERRORS\n",
        "broken            missing   Error         plugin not found\n",
    );
    assert_eq!(render_table(&[broken]), expected);
}

fn fleet() -> Vec<HostSummary> {
    vec![
        summary("web-1", false, "scaleway", State::Running, "tcp://192.0.2.1:2376"),
        summary("web-2", false, "scaleway", State::Stopped, ""),
        summary("db", true, "generic", State::Running, "tcp://192.0.2.3:2376"),
    ]
}

fn filtered_names(filters: &[&str]) -> Vec<String> {
    let filter = ListFilter::parse(filters).unwrap_or_else(|err| panic!("parse: {err}"));
    filter.apply(fleet()).into_iter().map(|row| row.name).collect()
}

#[rstest]
#[case(&[], &["web-1", "web-2", "db"])]
#[case(&["driver=scaleway"], &["web-1", "web-2"])]
#[case(&["state=Running"], &["web-1", "db"])]
#[case(&["name=^web"], &["web-1", "web-2"])]
#[case(&["driver=scaleway", "state=Running"], &["web-1"])]
#[case(&["name=2$", "name=^db$"], &["web-2", "db"])]
#[case(&["state=running"], &[])]
fn filters_select_hosts(#[case] filters: &[&str], #[case] expected: &[&str]) {
    assert_eq!(filtered_names(filters), expected);
}

#[test]
fn filter_without_equals_is_rejected() {
    let Err(err) = ListFilter::parse(&["driver"]) else {
        panic!("filter without a value should fail");
    };
    assert_eq!(err.to_string(), "Unsupported filter syntax.");
}

#[test]
fn filter_with_unknown_key_is_rejected() {
    let Err(err) = ListFilter::parse(&["swarm=master"]) else {
        panic!("unknown key should fail");
    };
    assert_eq!(err.to_string(), "Unsupported filter key 'swarm'");
}

#[test]
fn invalid_name_expression_is_rejected() {
    let Err(err) = ListFilter::parse(&["name=web["]) else {
        panic!("bad expression should fail");
    };
    assert!(matches!(err, FilterError::Pattern { ref pattern, .. } if pattern == "web["));
}

#[test]
fn quiet_listing_prints_names() {
    let rows = vec![
        summary("alpha", false, "none", State::Running, ""),
        summary("beta", false, "none", State::Error, ""),
    ];
    assert_eq!(render_names(&rows), "alpha\nbeta\n");
}

#[test]
fn posix_env_exports_variables() {
    let settings = EnvSettings::new(sample_connection(), Utf8PathBuf::from("/store/dev"));

    assert_eq!(
        settings.render(Shell::Posix),
        concat!(
            "export DOCKER_TLS_VERIFY=\"1\"\n",
            "export DOCKER_HOST=\"tcp://192.0.2.10:2376\"\n",
            "export DOCKER_CERT_PATH=\"/store/dev\"\n",
            "export DOCKER_MACHINE_NAME=\"dev\"\n",
            "# Run this command to configure your shell: \n",
            "# eval \"$(docker-machine env dev)\"\n",
        )
    );
}

#[test]
fn fish_env_uses_set_x() {
    let settings = EnvSettings::new(sample_connection(), Utf8PathBuf::from("/store/dev"));
    let rendered = settings.render(Shell::Fish);

    assert!(rendered.starts_with("set -x DOCKER_TLS_VERIFY \"1\";\n"), "{rendered}");
    assert!(rendered.ends_with("# eval (docker-machine env dev)\n"), "{rendered}");
}

#[test]
fn unix_socket_env_skips_tls() {
    let settings = EnvSettings::new(
        Connection {
            name: String::from("local"),
            url: String::from("unix:///var/run/docker.sock"),
        },
        Utf8PathBuf::from("/store/local"),
    );

    assert!(!settings.tls_verify);
    assert!(
        settings
            .render(Shell::Posix)
            .starts_with(concat!(
                "export DOCKER_TLS_VERIFY=\"\"\n",
                "export DOCKER_HOST=\"unix:///var/run/docker.sock\"\n",
                "export DOCKER_CERT_PATH=\"\"\n",
            ))
    );
}

#[rstest]
#[case(Shell::Posix, "unset DOCKER_TLS_VERIFY\n")]
#[case(Shell::Fish, "set -e DOCKER_TLS_VERIFY;\n")]
#[case(Shell::Cmd, "set DOCKER_TLS_VERIFY=\n")]
fn unset_clears_every_variable(#[case] shell: Shell, #[case] first_line: &str) {
    let rendered = render_unset(shell);
    assert!(rendered.starts_with(first_line), "{rendered}");
    assert_eq!(rendered.lines().count(), 4);
    assert!(rendered.contains("DOCKER_MACHINE_NAME"));
}

#[rstest]
#[case(Some("/usr/bin/fish"), Shell::Fish)]
#[case(Some("/bin/zsh"), Shell::Posix)]
#[case(Some("/opt/weird/shell"), Shell::Posix)]
#[case(None, Shell::Posix)]
fn shell_is_detected_from_login_shell(#[case] login: Option<&str>, #[case] expected: Shell) {
    assert_eq!(Shell::detect(login), expected);
}

#[test]
fn unknown_shell_is_rejected() {
    let Err(err) = "tcsh".parse::<Shell>() else {
        panic!("tcsh should be rejected");
    };
    assert_eq!(err, UnknownShellError(String::from("tcsh")));
}

#[test]
fn client_flags_quote_tls_paths() {
    let tls = TlsPaths {
        ca_cert: Utf8PathBuf::from("/certs/ca.pem"),
        client_cert: Utf8PathBuf::from("/certs/cert.pem"),
        client_key: Utf8PathBuf::from("/certs/key.pem"),
    };

    assert_eq!(
        render_client_flags(&sample_connection(), &tls),
        concat!(
            "--tlsverify --tlscacert=\"/certs/ca.pem\" --tlscert=\"/certs/cert.pem\" ",
            "--tlskey=\"/certs/key.pem\" -H=tcp://192.0.2.10:2376",
        )
    );
}

#[test]
fn tls_paths_use_standard_file_names() {
    let tls = TlsPaths::in_dir(Utf8Path::new("/store/certs"));

    assert_eq!(tls.ca_cert, "/store/certs/ca.pem");
    assert_eq!(tls.client_cert, "/store/certs/cert.pem");
    assert_eq!(tls.client_key, "/store/certs/key.pem");
}

#[rstest]
#[case(State::Running, true)]
#[case(State::Stopped, false)]
#[tokio::test]
async fn connection_requires_running_host(#[case] state: State, #[case] succeeds: bool) {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp path should be utf8: {}", path.display()));
    let store = Store::new(root);
    store
        .create(&Host::new("dev", SCRIPTED_DRIVER, json!({ "URL": "tcp://dev:2376" })))
        .unwrap_or_else(|err| panic!("seed: {err}"));
    let machine = Machine::new(
        store,
        ScriptedLoader::new().with_host("dev", ScriptedBehaviour::reporting(state)),
    );

    let result = connection(&machine, Some("dev")).await;

    if succeeds {
        let resolved = result.unwrap_or_else(|err| panic!("connection: {err}"));
        assert_eq!(resolved.url, "tcp://dev:2376");
    } else {
        let Err(err) = result else {
            panic!("stopped host should fail");
        };
        assert_eq!(
            err.to_string(),
            "dev is not running. Please start it with docker-machine start dev"
        );
    }
}
