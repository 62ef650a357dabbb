//! Error taxonomy for the classify → normalize → dispatch flow
//!
//! Every failure a caller can observe is one of four kinds. The batch
//! processor records them per item via `ErrorKind`, except configuration
//! errors, which are fatal and halt the run instead.

use crate::dispatch::StepKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for request processing
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Classification failed: {message}")]
    Classification { message: String },

    #[error("Pipeline step {step_index} ({step_kind}) failed for category '{category}': {cause}")]
    PipelineStep {
        category: String,
        step_index: usize,
        step_kind: StepKind,
        cause: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(#[from] crate::config::ConfigError),
}

/// Fieldless mirror of `DispatchError` used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "InvalidInputError")]
    InvalidInput,
    #[serde(rename = "ClassificationError")]
    Classification,
    #[serde(rename = "PipelineStepError")]
    PipelineStep,
    #[serde(rename = "ConfigurationError")]
    Configuration,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "InvalidInputError",
            ErrorKind::Classification => "ClassificationError",
            ErrorKind::PipelineStep => "PipelineStepError",
            ErrorKind::Configuration => "ConfigurationError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DispatchError {
    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create classification error
    pub fn classification<S: Into<String>>(message: S) -> Self {
        Self::Classification {
            message: message.into(),
        }
    }

    /// Create pipeline step error
    pub fn pipeline_step<C, S>(category: C, step_index: usize, step_kind: StepKind, cause: S) -> Self
    where
        C: Into<String>,
        S: Into<String>,
    {
        Self::PipelineStep {
            category: category.into(),
            step_index,
            step_kind,
            cause: cause.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::InvalidInput { .. } => ErrorKind::InvalidInput,
            DispatchError::Classification { .. } => ErrorKind::Classification,
            DispatchError::PipelineStep { .. } => ErrorKind::PipelineStep,
            DispatchError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Configuration errors halt the process; everything else is per request
    pub fn is_fatal(&self) -> bool {
        matches!(self, DispatchError::Configuration(_))
    }

    /// Category the failure occurred in, when known
    pub fn category(&self) -> Option<&str> {
        match self {
            DispatchError::PipelineStep { category, .. } => Some(category),
            _ => None,
        }
    }

    /// Zero-based pipeline step index the failure occurred at, when known
    pub fn step_index(&self) -> Option<usize> {
        match self {
            DispatchError::PipelineStep { step_index, .. } => Some(*step_index),
            _ => None,
        }
    }

    /// Message safe to print or store in a report
    pub fn public_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

static SECRET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("static regex")
});

static SECRET_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("static regex")
});

/// Redact secrets and cap length before an error message leaves the process
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET.replace_all(message, "${1}=***").to_string();
    sanitized = SECRET_PATH
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    const MAX_LEN: usize = 500;
    const SUFFIX: &str = "...[truncated]";
    if sanitized.len() > MAX_LEN {
        let mut cut = MAX_LEN - SUFFIX.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], SUFFIX);
    }

    sanitized
}

/// Result type for request processing
pub type DispatchResult<T> = Result<T, DispatchError>;
