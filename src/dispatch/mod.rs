//! Dispatch table and pipeline execution
//!
//! Each category owns an ordered, immutable list of steps. The executor runs
//! them for a normalized category, or short-circuits when only the category
//! was asked for.

pub mod executor;
pub mod result;
pub mod state;
pub mod step;
pub mod table;

pub use executor::{GenerationSettings, PipelineExecutor};
pub use result::StructuredResult;
pub use state::{RequestLifecycle, RequestState};
pub use step::{GenerateStep, PipelineStep, SearchStep, StepKind};
pub use table::DispatchTable;
