//! Request processing entry points
//!
//! `RequestProcessor` handles one request end to end; `BatchProcessor` runs
//! many of them with per-item failure isolation and ordered output.

pub mod batch;
pub mod request;

pub use batch::{
    parse_batch_source, BatchItem, BatchOutcome, BatchProcessor, BatchReport, BatchRequest,
    BatchSummary, ErrorRecord,
};
pub use request::{validate_request, RequestProcessor, MAX_REQUEST_CHARS};
