//! Text-generation collaborator
//!
//! Provider-agnostic completion interface plus the OpenAI and Anthropic
//! backends selected from `[llm]` configuration.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
