//! Tests for logging configuration and format parsing
//!
//! Covers the pure functions that turn environment values into logging
//! settings; the global subscriber itself is installed at most once.

use std::collections::HashMap;
use tracing::Level;
use triage_dispatch::observability::{init_logging, parse_level, LogFormat, LoggingSettings};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_log_format_parse_is_case_insensitive() {
    assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
    assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
    assert_eq!(LogFormat::parse(" Pretty "), Some(LogFormat::Pretty));
    assert_eq!(LogFormat::parse("compact"), Some(LogFormat::Compact));
}

#[test]
fn test_log_format_parse_rejects_unknown() {
    assert_eq!(LogFormat::parse("xml"), None);
    assert_eq!(LogFormat::parse(""), None);
}

#[test]
fn test_parse_level_known_and_fallback() {
    assert_eq!(parse_level("debug", Level::WARN), Level::DEBUG);
    assert_eq!(parse_level(" Error ", Level::WARN), Level::ERROR);
    assert_eq!(parse_level("verbose", Level::WARN), Level::WARN);
}

#[test]
fn test_settings_defaults_without_environment() {
    let settings = LoggingSettings::from_lookup(lookup(&[]), Level::WARN, LogFormat::Compact);
    assert_eq!(
        settings,
        LoggingSettings {
            level: Level::WARN,
            format: LogFormat::Compact,
            include_spans: false,
        }
    );
}

#[test]
fn test_settings_read_from_environment() {
    let settings = LoggingSettings::from_lookup(
        lookup(&[("LOG_LEVEL", "info"), ("LOG_FORMAT", "json"), ("LOG_SPANS", "TRUE")]),
        Level::WARN,
        LogFormat::Compact,
    );
    assert_eq!(settings.level, Level::INFO);
    assert_eq!(settings.format, LogFormat::Json);
    assert!(settings.include_spans);
}

#[test]
fn test_invalid_environment_values_keep_defaults() {
    let settings = LoggingSettings::from_lookup(
        lookup(&[("LOG_LEVEL", "loud"), ("LOG_FORMAT", "yaml"), ("LOG_SPANS", "yes")]),
        Level::ERROR,
        LogFormat::Pretty,
    );
    assert_eq!(settings.level, Level::ERROR);
    assert_eq!(settings.format, LogFormat::Pretty);
    assert!(!settings.include_spans);
}

#[test]
fn test_init_logging_twice_does_not_panic() {
    let settings = LoggingSettings::from_lookup(lookup(&[]), Level::WARN, LogFormat::Json);
    init_logging(settings);
    init_logging(settings);
}
