//! Classification and category normalization
//!
//! `Classifier` produces an unreliable raw label; `CategoryNormalizer` maps it
//! deterministically onto the closed category set.

pub mod classifier;
pub mod normalizer;
pub mod schema;

pub use classifier::{parse_classification, ClassificationRaw, Classifier, LlmClassifier};
pub use normalizer::CategoryNormalizer;
pub use schema::ClassificationOutput;
