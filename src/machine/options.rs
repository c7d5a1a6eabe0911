//! Resolving `-o key=value` overrides against a driver's flags.

use std::collections::BTreeMap;

use crate::driver::{DriverOptions, FlagSpec};

use super::MachineError;

/// Splits a `key=value` override. The value may be empty or contain `=`.
///
/// # Errors
///
/// Returns [`MachineError::InvalidOverride`] when `raw` has no `=` or an
/// empty key.
pub fn parse_override(raw: &str) -> Result<(String, String), MachineError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.to_owned()))
        }
        _ => Err(MachineError::InvalidOverride(raw.to_owned())),
    }
}

/// Builds the options for `driver`: an explicit override beats the flag's
/// environment variable, which beats the default.
///
/// # Errors
///
/// Returns [`MachineError::UnknownOption`] for an override no flag declares,
/// or a driver error when a value does not parse as the flag's type.
pub fn resolve_options<F>(
    driver: &str,
    flags: &[FlagSpec],
    overrides: &[(String, String)],
    lookup_env: F,
) -> Result<DriverOptions, MachineError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut explicit: BTreeMap<&str, &str> = BTreeMap::new();
    for (key, value) in overrides {
        if !flags.iter().any(|flag| flag.name == *key) {
            return Err(MachineError::UnknownOption {
                key: key.clone(),
                driver: driver.to_owned(),
            });
        }
        explicit.insert(key, value);
    }

    let mut options = DriverOptions::new();
    for flag in flags {
        let from_env = flag
            .env_var
            .as_deref()
            .and_then(&lookup_env)
            .filter(|value| !value.is_empty());
        let value = match (explicit.get(flag.name.as_str()), from_env) {
            (Some(raw), _) => flag.value.parse_like(&flag.name, raw)?,
            (None, Some(raw)) => flag.value.parse_like(&flag.name, &raw)?,
            (None, None) => flag.value.clone(),
        };
        options.insert(flag.name.clone(), value);
    }
    Ok(options)
}
