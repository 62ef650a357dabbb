//! Structured logging setup and span macros

pub mod logging;

pub use logging::{init_logging, parse_level, LogFormat, LoggingSettings};

pub use logging::{batch_span, request_span, step_span};
