use std::{env, fmt::Display, ops::RangeInclusive, str::FromStr};

use log::*;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(String),
    #[error("{name} has an invalid value ({value}). {reason}")]
    Invalid { name: String, value: String, reason: String },
}

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Reads a boolean flag from the environment. Unrecognised values fall back to `default`.
pub fn env_flag(name: &str, default: bool) -> bool {
    parse_boolean_flag(env::var(name).ok(), default)
}

/// Returns the trimmed value of the environment variable, or `None` if it is unset or blank.
pub fn env_or_default(name: &str) -> Option<String> {
    env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn required_env(name: &str) -> Result<String, ConfigError> {
    env_or_default(name).ok_or_else(|| ConfigError::Missing(name.to_string()))
}

/// Parses the environment variable into `T`. Invalid values are logged and replaced with `default`.
pub fn env_parsed<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env_or_default(name) {
        None => default,
        Some(s) => s.parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
    }
}

/// Like [`env_parsed`], but a value outside `range` is also logged and replaced with `default`.
pub fn env_in_range<T>(name: &str, default: T, range: RangeInclusive<T>) -> T
where
    T: FromStr + Display + PartialOrd + Copy,
    T::Err: Display,
{
    in_range_or_default(name, env_parsed(name, default), default, &range)
}

pub fn in_range_or_default<T: Display + PartialOrd + Copy>(
    name: &str,
    value: T,
    default: T,
    range: &RangeInclusive<T>,
) -> T {
    if range.contains(&value) {
        value
    } else {
        warn!(
            "🪛️ {value} is out of range for {name} ({}..={}). Using the default, {default}, instead.",
            range.start(),
            range.end()
        );
        default
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("yes".into()), false));
        assert!(parse_boolean_flag(Some(" TRUE ".into()), false));
        assert!(!parse_boolean_flag(Some("off".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn missing_required_env() {
        let err = required_env("TRACKSYNC_TEST_DEFINITELY_NOT_SET").unwrap_err();
        assert_eq!(err, ConfigError::Missing("TRACKSYNC_TEST_DEFINITELY_NOT_SET".into()));
        assert_eq!(err.to_string(), "TRACKSYNC_TEST_DEFINITELY_NOT_SET is not set");
    }

    #[test]
    fn parsed_env_falls_back_to_default() {
        assert_eq!(env_parsed::<u32>("TRACKSYNC_TEST_DEFINITELY_NOT_SET", 7), 7);
        assert_eq!(env_in_range::<u32>("TRACKSYNC_TEST_DEFINITELY_NOT_SET", 7, 1..=10), 7);
    }

    #[test]
    fn out_of_range_values_use_the_default() {
        assert_eq!(in_range_or_default("LIMIT", 0u32, 50, &(1..=250)), 50);
        assert_eq!(in_range_or_default("LIMIT", 251u32, 50, &(1..=250)), 50);
        assert_eq!(in_range_or_default("LIMIT", 250u32, 50, &(1..=250)), 250);
        assert_eq!(in_range_or_default("LIMIT", 1u32, 50, &(1..=250)), 1);
    }
}
