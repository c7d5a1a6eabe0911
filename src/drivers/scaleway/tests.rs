//! Unit tests for the Scaleway driver that do not reach the API.

use std::collections::HashMap;

use rstest::rstest;
use scaleway_rs::ScalewayImage;

use super::*;
use crate::driver::FlagValue;

#[derive(Copy, Clone)]
struct ImageSpec {
    id: &'static str,
    arch: &'static str,
    state: &'static str,
    creation_date: &'static str,
}

fn image(spec: ImageSpec) -> ScalewayImage {
    ScalewayImage {
        id: spec.id.to_owned(),
        name: String::new(),
        arch: spec.arch.to_owned(),
        creation_date: spec.creation_date.to_owned(),
        modification_date: String::new(),
        from_server: None,
        organization: String::new(),
        public: true,
        state: spec.state.to_owned(),
        project: String::new(),
        tags: vec![],
        zone: String::new(),
        root_volume: scaleway_rs::ScalewayImageRootVolume {
            id: String::new(),
            name: String::new(),
            size: 0,
            volume_type: String::new(),
        },
        default_bootscript: None,
        extra_volumes: scaleway_rs::ScalewayImageExtraVolumes {
            volumes: HashMap::new(),
        },
    }
}

fn full_options() -> DriverOptions {
    DriverOptions::new()
        .with("scaleway-secret-key", FlagValue::String(String::from("secret")))
        .with("scaleway-project-id", FlagValue::String(String::from("proj")))
        .with("scaleway-organization-id", FlagValue::String(String::new()))
        .with("scaleway-zone", FlagValue::String(String::from("nl-ams-1")))
        .with("scaleway-instance-type", FlagValue::String(String::from("DEV1-M")))
        .with("scaleway-image", FlagValue::String(String::from("Debian Bookworm")))
        .with("scaleway-architecture", FlagValue::String(String::from("x86_64")))
        .with("scaleway-ipv6", FlagValue::Bool(true))
        .with("scaleway-ssh-user", FlagValue::String(String::from("root")))
        .with("scaleway-ssh-key", FlagValue::String(String::new()))
        .with("scaleway-ssh-port", FlagValue::Int(22))
}

fn configured() -> ScalewayDriver {
    let mut driver = ScalewayDriver::new("web", "/tmp/machine/web");
    driver
        .apply_options(&full_options())
        .unwrap_or_else(|err| panic!("configure: {err}"));
    driver
}

#[rstest]
#[case("running", State::Running)]
#[case("starting", State::Starting)]
#[case("stopping", State::Stopping)]
#[case("stopped", State::Stopped)]
#[case("stopped in place", State::Stopped)]
#[case("locked", State::None)]
fn maps_server_status(#[case] status: &str, #[case] expected: State) {
    assert_eq!(server_state(status), expected);
}

#[tokio::test]
async fn missing_secret_key_names_flag_and_env() {
    let mut driver = ScalewayDriver::new("web", "/tmp/machine/web");
    let options = full_options().with("scaleway-secret-key", FlagValue::String(String::new()));

    let Err(err) = driver.set_config_from_flags(&options).await else {
        panic!("missing secret should fail");
    };

    assert_eq!(
        err,
        DriverError::MissingOption(String::from(
            "missing Scaleway API secret key: pass --scaleway-secret-key or set SCW_SECRET_KEY"
        ))
    );
}

#[test]
fn applies_options_to_fields() {
    let driver = configured();

    assert_eq!(driver.zone, "nl-ams-1");
    assert_eq!(driver.commercial_type, "DEV1-M");
    assert_eq!(driver.organization_id, None);
    assert!(driver.enable_ipv6);
    assert_eq!(driver.base.ssh_port, 22);
}

#[tokio::test]
async fn state_before_create_is_an_error() {
    let driver = configured();
    let Err(err) = driver.state().await else {
        panic!("state without server should fail");
    };
    assert!(matches!(err, DriverError::InvalidConfig(_)), "got {err}");
}

#[tokio::test]
async fn remove_without_server_is_a_no_op() {
    let mut driver = configured();
    driver
        .remove()
        .await
        .unwrap_or_else(|err| panic!("remove: {err}"));
}

#[tokio::test]
async fn raw_config_round_trips() {
    let mut driver = configured();
    driver.server_id = Some(String::from("srv-1"));
    driver.base.ip_address = String::from("51.15.0.10");

    let raw = driver
        .config_raw()
        .await
        .unwrap_or_else(|err| panic!("encode: {err}"));
    assert_eq!(raw["ServerId"], "srv-1");
    assert_eq!(raw["MachineName"], "web");

    let mut reloaded = ScalewayDriver::default();
    reloaded
        .set_config_raw(raw)
        .await
        .unwrap_or_else(|err| panic!("decode: {err}"));
    assert_eq!(reloaded.server_id.as_deref(), Some("srv-1"));
    assert_eq!(
        reloaded.url().await.as_deref(),
        Ok("tcp://51.15.0.10:2376")
    );
}

#[test]
fn select_image_id_returns_newest_creation_date() {
    let driver = configured();
    let images = vec![
        image(ImageSpec {
            id: "older",
            arch: "x86_64",
            state: "available",
            creation_date: "2025-01-01T00:00:00Z",
        }),
        image(ImageSpec {
            id: "newest",
            arch: "x86_64",
            state: "available",
            creation_date: "2025-02-01T00:00:00Z",
        }),
    ];

    let id = driver
        .select_image_id(images)
        .unwrap_or_else(|err| panic!("select: {err}"));
    assert_eq!(id, "newest");
}

#[test]
fn select_image_id_errors_on_empty() {
    let driver = configured();
    let Err(err) = driver.select_image_id(Vec::new()) else {
        panic!("empty candidates should fail");
    };
    assert!(matches!(err, ScalewayDriverError::ImageNotFound { .. }));
}

#[tokio::test]
async fn resolve_image_falls_back_to_public_when_project_has_no_match() {
    let driver = configured();

    let id = driver
        .resolve_image_id_with(
            || async {
                Ok(vec![image(ImageSpec {
                    id: "project-arm",
                    arch: "arm64",
                    state: "available",
                    creation_date: "2025-03-01T00:00:00Z",
                })])
            },
            || async {
                Ok(vec![image(ImageSpec {
                    id: "public-x86",
                    arch: "x86_64",
                    state: "available",
                    creation_date: "2025-01-01T00:00:00Z",
                })])
            },
        )
        .await
        .unwrap_or_else(|err| panic!("resolve: {err}"));

    assert_eq!(id, "public-x86");
}

#[tokio::test]
async fn resolve_image_prefers_project_results() {
    let driver = configured();

    let id = driver
        .resolve_image_id_with(
            || async {
                Ok(vec![image(ImageSpec {
                    id: "project-img",
                    arch: "x86_64",
                    state: "available",
                    creation_date: "2025-02-01T00:00:00Z",
                })])
            },
            || async {
                Ok(vec![image(ImageSpec {
                    id: "public-newer",
                    arch: "x86_64",
                    state: "available",
                    creation_date: "2025-06-01T00:00:00Z",
                })])
            },
        )
        .await
        .unwrap_or_else(|err| panic!("resolve: {err}"));

    assert_eq!(id, "project-img");
}
