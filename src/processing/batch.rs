//! Batch processing with per-item failure isolation
//!
//! Items may run concurrently up to `max_concurrency`, but the report always
//! follows input order. A failure in one item becomes an `ErrorRecord` for that
//! item and never stops the others, except a configuration error, which halts
//! the whole run and is returned to the caller.

use crate::dispatch::StructuredResult;
use crate::error::{DispatchError, DispatchResult, ErrorKind};
use crate::processing::request::RequestProcessor;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, Instrument};

/// One request taken from a batch source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// 1-based position in the source
    pub index: usize,
    pub input: String,
}

/// Split a newline-delimited source into requests.
///
/// Blank lines and lines whose trimmed text starts with `comment_marker` are
/// skipped; every kept request remembers its 1-based line number.
pub fn parse_batch_source(text: &str, comment_marker: &str) -> Vec<BatchRequest> {
    text.lines()
        .enumerate()
        .filter_map(|(line, input)| {
            let trimmed = input.trim();
            let is_comment = !comment_marker.is_empty() && trimmed.starts_with(comment_marker);
            (!trimmed.is_empty() && !is_comment).then(|| BatchRequest {
                index: line + 1,
                input: trimmed.to_string(),
            })
        })
        .collect()
}

/// Failure details for one batch item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub index: usize,
    pub input: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
}

impl ErrorRecord {
    pub fn from_error(index: usize, input: impl Into<String>, error: &DispatchError) -> Self {
        Self {
            index,
            input: input.into(),
            kind: error.kind(),
            message: error.public_message(),
            category: error.category().map(str::to_string),
            step_index: error.step_index(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Ok { result: StructuredResult },
    Error { error: ErrorRecord },
}

/// One report line; exactly one of result or error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub index: usize,
    pub input: String,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Ok { .. })
    }

    pub fn result(&self) -> Option<&StructuredResult> {
        match &self.outcome {
            BatchOutcome::Ok { result } => Some(result),
            BatchOutcome::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        match &self.outcome {
            BatchOutcome::Ok { .. } => None,
            BatchOutcome::Error { error } => Some(error),
        }
    }
}

/// Totals for a finished batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Requests never started because the run was stopped
    pub not_started: usize,
    pub elapsed_ms: u64,
}

/// Completed batch: items in input order plus totals
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    pub summary: BatchSummary,
}

pub struct BatchProcessor {
    processor: Arc<RequestProcessor>,
    max_concurrency: usize,
    comment_marker: String,
    classify_only: bool,
    stop: Arc<AtomicBool>,
}

impl BatchProcessor {
    pub fn new(processor: Arc<RequestProcessor>, max_concurrency: usize) -> Self {
        Self {
            processor,
            max_concurrency: max_concurrency.max(1),
            comment_marker: "#".to_string(),
            classify_only: false,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_comment_marker(mut self, marker: impl Into<String>) -> Self {
        self.comment_marker = marker.into();
        self
    }

    pub fn with_classify_only(mut self, classify_only: bool) -> Self {
        self.classify_only = classify_only;
        self
    }

    /// Flag that, once set, keeps further items from starting.
    /// Items already in flight finish normally.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Attempt every input; item `n` of the report is input `n`
    pub async fn run_batch(&self, inputs: Vec<String>) -> DispatchResult<Vec<BatchItem>> {
        let requests = inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| BatchRequest {
                index: i + 1,
                input,
            })
            .collect();
        Ok(self.run_requests(requests).await?.items)
    }

    /// Parse a newline-delimited source, skipping blanks and comments
    pub async fn run_source(&self, text: &str) -> DispatchResult<BatchReport> {
        self.run_requests(parse_batch_source(text, &self.comment_marker))
            .await
    }

    /// Run requests in order. A fatal error stops the run: no further items
    /// start and the error is returned instead of a report.
    pub async fn run_requests(&self, requests: Vec<BatchRequest>) -> DispatchResult<BatchReport> {
        let started_at = Utc::now();
        let started = Instant::now();
        let total = requests.len();
        let span = crate::batch_span!(
            items = total,
            max_concurrency = self.max_concurrency,
            classify_only = self.classify_only
        );

        let items: Vec<BatchItem> = async {
            info!("Batch started");
            stream::iter(requests)
                .map(|request| self.run_item(request))
                .buffered(self.max_concurrency)
                .filter_map(|item| async move { item })
                .try_collect::<Vec<_>>()
                .await
        }
        .instrument(span)
        .await?;

        let succeeded = items.iter().filter(|i| i.is_ok()).count();
        let summary = BatchSummary {
            started_at,
            total,
            succeeded,
            failed: items.len() - succeeded,
            not_started: total - items.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            not_started = summary.not_started,
            elapsed_ms = summary.elapsed_ms,
            "Batch finished"
        );

        Ok(BatchReport { items, summary })
    }

    async fn run_item(&self, request: BatchRequest) -> Option<DispatchResult<BatchItem>> {
        if self.stop.load(Ordering::SeqCst) {
            debug!(index = request.index, "Batch stopped, item not started");
            return None;
        }

        let outcome = match self.processor.process(&request.input, self.classify_only).await {
            Ok(result) => BatchOutcome::Ok { result },
            Err(fatal) if fatal.is_fatal() => {
                self.stop.store(true, Ordering::SeqCst);
                error!(index = request.index, error = %fatal.public_message(), "Batch halted");
                return Some(Err(fatal));
            }
            Err(error) => BatchOutcome::Error {
                error: ErrorRecord::from_error(request.index, request.input.clone(), &error),
            },
        };

        Some(Ok(BatchItem {
            index: request.index,
            input: request.input,
            outcome,
        }))
    }
}
