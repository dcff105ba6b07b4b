//! Environment-variable lookup helpers shared by every `from_env` constructor.
//!
//! Each helper takes the lookup function as a parameter so configuration
//! parsing can be exercised without mutating the process environment.

use std::str::FromStr;

/// A configuration value was missing or could not be parsed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Read the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// String value of `var`, or `default` when unset.
pub fn string_or<F>(lookup: &F, var: &'static str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).unwrap_or_else(|| default.to_string())
}

/// Non-empty string value of `var`.
pub fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(var))
}

/// Parsed value of `var`, or `default` when unset.
pub fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}

/// Comma-separated list in `var`, or `default` when unset. Blank items are
/// dropped.
pub fn list_or<F>(lookup: &F, var: &'static str, default: &str) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    string_or(lookup, var, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
