//! Pipeline step definitions
//!
//! A step is a closed tagged variant: `search` consults the knowledge corpus,
//! `generate` calls the text-generation collaborator. Each variant carries its
//! own typed parameters, loaded from `[[categories.pipeline]]` tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field names a step may not produce; they belong to the result envelope
pub const RESERVED_FIELDS: &[&str] = &["category", "classify_only", "query"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineStep {
    Search(SearchStep),
    Generate(GenerateStep),
}

impl PipelineStep {
    pub fn kind(&self) -> StepKind {
        match self {
            PipelineStep::Search(_) => StepKind::Search,
            PipelineStep::Generate(_) => StepKind::Generate,
        }
    }

    /// Names of the result fields this step writes.
    ///
    /// Structured steps declare theirs through the schema's `properties`.
    pub fn output_names(&self) -> Vec<&str> {
        match self {
            PipelineStep::Search(step) => step.output.as_deref().into_iter().collect(),
            PipelineStep::Generate(step) => match &step.output_schema {
                None => vec![step.output.as_str()],
                Some(schema) => schema
                    .get("properties")
                    .and_then(serde_json::Value::as_object)
                    .map(|properties| properties.keys().map(String::as_str).collect())
                    .unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Search,
    Generate,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Search => f.write_str("search"),
            StepKind::Generate => f.write_str("generate"),
        }
    }
}

/// Knowledge lookup whose matches feed later `generate` steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStep {
    /// Query template; `{query}` expands to the request text
    #[serde(default = "default_search_query")]
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Also expose the matches as a result field under this name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Default for SearchStep {
    fn default() -> Self {
        Self {
            query: default_search_query(),
            max_results: default_max_results(),
            output: None,
        }
    }
}

fn default_search_query() -> String {
    "{query}".to_string()
}

fn default_max_results() -> usize {
    3
}

/// One call to the text-generation collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateStep {
    pub role: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    /// Task template; supports `{query}`, `{context}` and earlier string fields
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    /// Result field receiving the generated text
    #[serde(default = "default_output")]
    pub output: String,
    /// Overrides `llm.model` for this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// When set, the reply must be a JSON object valid against this schema and
    /// its members become result fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
}

fn default_output() -> String {
    "response".to_string()
}

impl GenerateStep {
    /// System prompt built from the role description
    pub fn system_prompt(&self) -> String {
        let mut prompt = format!("You are {}.", self.role.trim());
        if !self.goal.trim().is_empty() {
            prompt.push_str("\nGoal: ");
            prompt.push_str(self.goal.trim());
        }
        if !self.backstory.trim().is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(self.backstory.trim());
        }
        prompt
    }
}
