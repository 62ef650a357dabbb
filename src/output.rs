//! Terminal rendering of results, errors and batch reports
//!
//! JSON output is one object per line so batch reports can be piped into
//! line-oriented tools.

use crate::dispatch::StructuredResult;
use crate::error::DispatchError;
use crate::knowledge::Match;
use crate::processing::{BatchItem, BatchOutcome, BatchSummary, ErrorRecord};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| json!({ "status": "error", "message": e.to_string() }).to_string())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_result(result: &StructuredResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(result),
        OutputFormat::Text => {
            let mut out = format!("category: {}", result.category());
            if result.is_classify_only() {
                out.push_str("\nclassify_only: true");
            }
            for (name, value) in result.fields() {
                out.push_str(&format!("\n{name}:\n{}", indent(&value_text(value))));
            }
            out
        }
    }
}

/// Error line naming the kind and, where known, category and step
pub fn render_error(error: &DispatchError, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let mut value = json!({
                "status": "error",
                "kind": error.kind(),
                "message": error.public_message(),
            });
            if let Some(category) = error.category() {
                value["category"] = json!(category);
            }
            if let Some(step_index) = error.step_index() {
                value["step_index"] = json!(step_index);
            }
            value.to_string()
        }
        OutputFormat::Text => format!("error [{}]: {}", error.kind(), error.public_message()),
    }
}

fn render_error_record(record: &ErrorRecord) -> String {
    let mut location = String::new();
    if let Some(category) = &record.category {
        location.push_str(&format!(" category={category}"));
    }
    if let Some(step) = record.step_index {
        location.push_str(&format!(" step={step}"));
    }
    format!("error [{}]{location}: {}", record.kind, record.message)
}

pub fn render_batch_item(item: &BatchItem, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(item),
        OutputFormat::Text => {
            let body = match &item.outcome {
                BatchOutcome::Ok { result } => render_result(result, OutputFormat::Text),
                BatchOutcome::Error { error } => render_error_record(error),
            };
            format!("#{} {}\n{}", item.index, item.input, indent(&body))
        }
    }
}

pub fn render_summary(summary: &BatchSummary, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(&json!({ "summary": summary })),
        OutputFormat::Text => {
            let mut out = format!(
                "{} processed: {} ok, {} failed in {} ms",
                summary.total, summary.succeeded, summary.failed, summary.elapsed_ms
            );
            if summary.not_started > 0 {
                out.push_str(&format!(", {} not started", summary.not_started));
            }
            out
        }
    }
}

pub fn render_matches(matches: &[Match], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(&matches),
        OutputFormat::Text if matches.is_empty() => "no matches".to_string(),
        OutputFormat::Text => matches
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let title = m.title.as_deref().unwrap_or("");
                format!(
                    "{}. {} (score {}) {}\n{}",
                    i + 1,
                    m.document_id,
                    m.score,
                    title,
                    indent(&m.excerpt)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
    }
}
