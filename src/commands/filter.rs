//! `ls --filter` selection.
//!
//! Filters are `key=value`. Repeating a key widens the match to any of its
//! values; different keys must all match.

use regex::Regex;
use thiserror::Error;

use crate::machine::HostSummary;

/// Rejected `--filter` values.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Raised when a filter is not `key=value`.
    #[error("Unsupported filter syntax.")]
    Syntax,
    /// Raised for a key other than `driver`, `state` or `name`.
    #[error("Unsupported filter key '{0}'")]
    UnknownKey(String),
    /// Raised when a `name` value is not a valid regular expression.
    #[error("invalid name filter {pattern:?}: {source}")]
    Pattern {
        /// Rejected expression.
        pattern: String,
        /// Parser diagnostic.
        #[source]
        source: regex::Error,
    },
}

/// Parsed `ls` filters. The default filter keeps every host.
#[derive(Debug, Default)]
pub struct ListFilter {
    drivers: Vec<String>,
    states: Vec<String>,
    names: Vec<Regex>,
}

impl ListFilter {
    /// Parses `--filter` values.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] for malformed values, unknown keys or invalid
    /// name expressions.
    pub fn parse<S: AsRef<str>>(filters: &[S]) -> Result<Self, FilterError> {
        let mut parsed = Self::default();
        for filter in filters {
            let (key, value) = filter.as_ref().split_once('=').ok_or(FilterError::Syntax)?;
            match key {
                "driver" => parsed.drivers.push(value.to_owned()),
                "state" => parsed.states.push(value.to_owned()),
                "name" => parsed.names.push(Regex::new(value).map_err(|source| {
                    FilterError::Pattern {
                        pattern: value.to_owned(),
                        source,
                    }
                })?),
                other => return Err(FilterError::UnknownKey(other.to_owned())),
            }
        }
        Ok(parsed)
    }

    /// Whether `row` passes every filter key.
    #[must_use]
    pub fn matches(&self, row: &HostSummary) -> bool {
        let state = row.state.to_string();
        (self.drivers.is_empty() || self.drivers.iter().any(|driver| *driver == row.driver_name))
            && (self.states.is_empty() || self.states.iter().any(|wanted| *wanted == state))
            && (self.names.is_empty() || self.names.iter().any(|name| name.is_match(&row.name)))
    }

    /// Keeps the rows that match.
    #[must_use]
    pub fn apply(&self, rows: Vec<HostSummary>) -> Vec<HostSummary> {
        rows.into_iter().filter(|row| self.matches(row)).collect()
    }
}
