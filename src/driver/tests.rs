//! Tests for driver options and errors.

use super::*;
use rstest::rstest;

#[test]
fn options_return_typed_values() {
    let options = DriverOptions::new()
        .with("url", FlagValue::String(String::from("tcp://10.0.0.2:2376")))
        .with("port", FlagValue::Int(2222))
        .with("insecure", FlagValue::Bool(true))
        .with(
            "labels",
            FlagValue::StringSlice(vec![String::from("a"), String::from("b")]),
        );

    assert_eq!(options.string("url"), "tcp://10.0.0.2:2376");
    assert_eq!(options.int("port"), 2222);
    assert!(options.bool("insecure"));
    assert_eq!(options.string_slice("labels"), ["a", "b"]);
}

#[test]
fn missing_options_fall_back_to_zero_values() {
    let options = DriverOptions::new();

    assert_eq!(options.string("url"), "");
    assert_eq!(options.int("port"), 0);
    assert!(!options.bool("insecure"));
    assert!(options.string_slice("labels").is_empty());
}

#[rstest]
#[case(FlagValue::Int(0), "22", FlagValue::Int(22))]
#[case(FlagValue::Bool(false), "true", FlagValue::Bool(true))]
#[case(FlagValue::Bool(true), "no", FlagValue::Bool(false))]
#[case(
    FlagValue::StringSlice(Vec::new()),
    "a, b,,c",
    FlagValue::StringSlice(vec![String::from("a"), String::from("b"), String::from("c")])
)]
fn parse_like_follows_default_kind(
    #[case] default: FlagValue,
    #[case] raw: &str,
    #[case] expected: FlagValue,
) {
    let parsed = default
        .parse_like("flag", raw)
        .unwrap_or_else(|err| panic!("parse {raw}: {err}"));
    assert_eq!(parsed, expected);
}

#[test]
fn parse_like_rejects_bad_integer() {
    let Err(err) = FlagValue::Int(22).parse_like("generic-ssh-port", "twenty") else {
        panic!("non-numeric port should fail");
    };
    assert!(err.to_string().contains("--generic-ssh-port expects an integer"));
}

#[rstest]
#[case(DriverError::NotSupported(String::from("hosts without a driver cannot be started")))]
#[case(DriverError::Provider { status: Some(403), message: String::from("denied") })]
#[case(DriverError::MissingAddress)]
fn errors_survive_json(#[case] error: DriverError) {
    let encoded = serde_json::to_string(&error).unwrap_or_else(|err| panic!("encode: {err}"));
    let decoded: DriverError =
        serde_json::from_str(&encoded).unwrap_or_else(|err| panic!("decode: {err}"));
    assert_eq!(decoded, error);
    assert_eq!(decoded.to_string(), error.to_string());
}

#[test]
fn provider_error_mentions_status() {
    let error = DriverError::Provider {
        status: Some(422),
        message: String::from("invalid image"),
    };
    assert_eq!(error.to_string(), "provider error (status 422): invalid image");
    assert_eq!(
        DriverError::provider("quota").to_string(),
        "provider error: quota"
    );
}

#[test]
fn base_driver_requires_address_for_url() {
    let mut base = BaseDriver::new("web", "/tmp/web");
    assert_eq!(base.docker_url(), Err(DriverError::MissingAddress));

    base.ip_address = String::from("198.51.100.4");
    assert_eq!(base.docker_url().as_deref(), Ok("tcp://198.51.100.4:2376"));
    assert_eq!(base.store_file("id_rsa"), "/tmp/web/id_rsa");
}
