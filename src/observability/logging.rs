//! Structured logging using the tracing crate
//!
//! Logs always go to stderr so that stdout carries only results and reports.
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: ERROR, WARN, INFO, DEBUG, TRACE (defaults to WARN for the CLI)
//! - `LOG_FORMAT`: json, pretty, compact (defaults to compact for the CLI)
//! - `LOG_SPANS`: emit span open/close events (true/false, defaults to false)
//! - `RUST_LOG`: full filter override, env_logger syntax
//!
//! ```bash
//! # Machine-readable logs next to a JSON batch report
//! LOG_FORMAT=json LOG_LEVEL=INFO triage --format json batch requests.txt
//!
//! # Trace one request with span timings
//! LOG_FORMAT=pretty LOG_LEVEL=DEBUG LOG_SPANS=true triage ask "my VPN keeps dropping"
//! ```

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Multi-line, colored
    Pretty,
    /// Single-line, colored
    Compact,
}

impl LogFormat {
    /// Parse a format name, case-insensitive and whitespace-tolerant
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(LogFormat::Json),
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

/// Parse a level name; unknown names fall back to `default`
pub fn parse_level(s: &str, default: Level) -> Level {
    match s.trim().to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "INFO" => Level::INFO,
        "DEBUG" => Level::DEBUG,
        "TRACE" => Level::TRACE,
        _ => default,
    }
}

/// Resolved logging options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: Level,
    pub format: LogFormat,
    pub include_spans: bool,
}

impl LoggingSettings {
    /// Read `LOG_LEVEL`, `LOG_FORMAT` and `LOG_SPANS` from the process environment
    pub fn from_env(default_level: Level, default_format: LogFormat) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), default_level, default_format)
    }

    pub fn from_lookup<F>(lookup: F, default_level: Level, default_format: LogFormat) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = lookup("LOG_LEVEL")
            .map(|v| parse_level(&v, default_level))
            .unwrap_or(default_level);
        let format = lookup("LOG_FORMAT")
            .and_then(|v| LogFormat::parse(&v))
            .unwrap_or(default_format);
        let include_spans = lookup("LOG_SPANS")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            level,
            format,
            include_spans,
        }
    }
}

fn span_events(include_spans: bool) -> fmt::format::FmtSpan {
    if include_spans {
        fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE
    } else {
        fmt::format::FmtSpan::NONE
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(settings: LoggingSettings) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(rust_log) => EnvFilter::new(rust_log),
        Err(_) => {
            let mut filter = EnvFilter::new(settings.level.to_string());
            // Reduce noise from dependencies
            for directive in ["hyper=warn", "hyper_util=warn", "reqwest=warn", "rustls=warn"] {
                if let Ok(directive) = directive.parse() {
                    filter = filter.add_directive(directive);
                }
            }
            filter
        }
    };

    let subscriber = tracing_subscriber::registry().with(filter);
    let spans = span_events(settings.include_spans);

    // try_init: tests and embedding applications may already own the subscriber
    let _ = match settings.format {
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(spans),
            )
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(
                fmt::layer()
                    .pretty()
                    .with_ansi(true)
                    .with_writer(std::io::stderr)
                    .with_span_events(spans),
            )
            .try_init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_span_events(spans),
            )
            .try_init(),
    };
}

/// Span covering one request from validation to result
#[macro_export]
macro_rules! request_span {
    ($($field:tt)*) => {
        tracing::info_span!("request", $($field)*)
    };
}

/// Span covering one pipeline step
#[macro_export]
macro_rules! step_span {
    ($($field:tt)*) => {
        tracing::info_span!("pipeline_step", $($field)*)
    };
}

/// Span covering a whole batch run
#[macro_export]
macro_rules! batch_span {
    ($($field:tt)*) => {
        tracing::info_span!("batch", $($field)*)
    };
}

pub use {batch_span, request_span, step_span};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse(" pretty\n"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("Compact"), Some(LogFormat::Compact));
        assert_eq!(LogFormat::parse("xml"), None);
    }

    #[test]
    fn test_parse_level_falls_back() {
        assert_eq!(parse_level("debug", Level::WARN), Level::DEBUG);
        assert_eq!(parse_level("verbose", Level::WARN), Level::WARN);
    }

    #[test]
    fn test_settings_defaults_when_unset() {
        let settings = LoggingSettings::from_lookup(lookup(&[]), Level::WARN, LogFormat::Compact);
        assert_eq!(settings.level, Level::WARN);
        assert_eq!(settings.format, LogFormat::Compact);
        assert!(!settings.include_spans);
    }

    #[test]
    fn test_settings_from_environment_values() {
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
    fn test_unknown_format_keeps_default() {
        let settings = LoggingSettings::from_lookup(
            lookup(&[("LOG_FORMAT", "yaml"), ("LOG_SPANS", "yes")]),
            Level::INFO,
            LogFormat::Pretty,
        );
        assert_eq!(settings.format, LogFormat::Pretty);
        assert!(!settings.include_spans);
    }
}
