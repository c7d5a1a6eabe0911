//! Creation options handed to drivers and the flags that describe them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::DriverError;

/// Typed default value of a driver flag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "default")]
pub enum FlagValue {
    /// Free-form string.
    String(String),
    /// Repeatable string option.
    StringSlice(Vec<String>),
    /// Signed integer.
    Int(i64),
    /// Boolean switch.
    Bool(bool),
}

impl FlagValue {
    /// Parses `raw` into a value of the same kind as `self`.
    ///
    /// Slices accept comma-separated items.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::InvalidConfig`] when `raw` does not parse as
    /// the flag's kind.
    pub fn parse_like(&self, flag: &str, raw: &str) -> Result<Self, DriverError> {
        match self {
            Self::String(_) => Ok(Self::String(raw.to_owned())),
            Self::StringSlice(_) => Ok(Self::StringSlice(
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_owned)
                    .collect(),
            )),
            Self::Int(_) => raw.trim().parse().map(Self::Int).map_err(|_| {
                DriverError::InvalidConfig(format!("--{flag} expects an integer, got '{raw}'"))
            }),
            Self::Bool(_) => match raw.trim() {
                "" | "1" | "true" | "yes" => Ok(Self::Bool(true)),
                "0" | "false" | "no" => Ok(Self::Bool(false)),
                _ => Err(DriverError::InvalidConfig(format!(
                    "--{flag} expects a boolean, got '{raw}'"
                ))),
            },
        }
    }

    fn into_json(self) -> Value {
        match self {
            Self::String(value) => Value::from(value),
            Self::StringSlice(values) => Value::from(values),
            Self::Int(value) => Value::from(value),
            Self::Bool(value) => Value::from(value),
        }
    }
}

/// Description of one option a driver accepts at creation time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSpec {
    /// Option name without leading dashes, for example `generic-ip-address`.
    pub name: String,
    /// One-line help text.
    pub usage: String,
    /// Environment variable consulted when the option is not given.
    pub env_var: Option<String>,
    /// Default value, which also fixes the option's type.
    pub value: FlagValue,
}

impl FlagSpec {
    /// Declares a string option.
    #[must_use]
    pub fn string(name: &str, usage: &str, default: &str) -> Self {
        Self {
            name: name.to_owned(),
            usage: usage.to_owned(),
            env_var: None,
            value: FlagValue::String(default.to_owned()),
        }
    }

    /// Declares an integer option.
    #[must_use]
    pub fn int(name: &str, usage: &str, default: i64) -> Self {
        Self {
            name: name.to_owned(),
            usage: usage.to_owned(),
            env_var: None,
            value: FlagValue::Int(default),
        }
    }

    /// Declares a boolean option.
    #[must_use]
    pub fn bool(name: &str, usage: &str) -> Self {
        Self {
            name: name.to_owned(),
            usage: usage.to_owned(),
            env_var: None,
            value: FlagValue::Bool(false),
        }
    }

    /// Binds the option to an environment variable.
    #[must_use]
    pub fn env(mut self, var: &str) -> Self {
        self.env_var = Some(var.to_owned());
        self
    }
}

/// Key/value options collected from the command line for
/// [`Driver::set_config_from_flags`](super::Driver::set_config_from_flags).
///
/// Getters return the zero value for absent keys and log a warning, so a
/// driver reading an option it never declared degrades instead of failing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverOptions {
    values: BTreeMap<String, Value>,
}

impl DriverOptions {
    /// Creates an empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: FlagValue) {
        self.values.insert(key.into(), value.into_json());
    }

    /// Stores a value and returns the updated set.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: FlagValue) -> Self {
        self.insert(key, value);
        self
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let value = self.values.get(key);
        if value.is_none() {
            tracing::warn!(key, "driver option not found");
        }
        value
    }

    /// Returns the string stored under `key`, or an empty string.
    #[must_use]
    pub fn string(&self, key: &str) -> String {
        self.lookup(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_default()
    }

    /// Returns the strings stored under `key`, or an empty list.
    #[must_use]
    pub fn string_slice(&self, key: &str) -> Vec<String> {
        self.lookup(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the integer stored under `key`, or zero.
    #[must_use]
    pub fn int(&self, key: &str) -> i64 {
        self.lookup(key).and_then(Value::as_i64).unwrap_or_default()
    }

    /// Returns the boolean stored under `key`, or `false`.
    #[must_use]
    pub fn bool(&self, key: &str) -> bool {
        self.lookup(key).and_then(Value::as_bool).unwrap_or_default()
    }
}
