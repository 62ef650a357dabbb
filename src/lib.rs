//! Triage Dispatch
//!
//! Routes free-form requests to specialist pipelines. An LLM classifier
//! proposes a label, the normalizer reconciles it with a closed category set,
//! and the dispatch table runs that category's ordered `search` / `generate`
//! steps to produce a flat, serializable result.
//!
//! # Quick Start
//!
//! ```rust
//! use triage_dispatch::category::CategorySet;
//! use triage_dispatch::routing::CategoryNormalizer;
//!
//! let categories = CategorySet::new(&["billing", "technical", "general"], "general").unwrap();
//! let normalizer = CategoryNormalizer::new(
//!     categories,
//!     vec![("billing inquiry", "billing"), ("pricing", "billing")],
//! )
//! .unwrap();
//!
//! assert_eq!(normalizer.normalize(" Billing Inquiry ").as_str(), "billing");
//! assert_eq!(normalizer.normalize("sdkjf").as_str(), "general");
//! ```

pub mod bootstrap;
pub mod category;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod observability;
pub mod output;
pub mod processing;
pub mod routing;
pub mod testing;

pub use bootstrap::Dispatcher;
pub use category::{Category, CategorySet};
pub use config::{ConfigError, DispatchConfig};
pub use dispatch::{PipelineExecutor, PipelineStep, StructuredResult};
pub use error::{DispatchError, DispatchResult, ErrorKind};
pub use processing::{BatchItem, BatchProcessor, ErrorRecord, RequestProcessor};
pub use routing::{CategoryNormalizer, ClassificationRaw, Classifier};
