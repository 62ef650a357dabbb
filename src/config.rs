//! Deployment configuration
//!
//! One TOML file describes the category set, aliases, per-category pipelines,
//! the LLM connection, knowledge sources and batch limits. It is loaded and
//! validated once at startup; the process never reads it again.

use crate::category::CategorySet;
use crate::dispatch::step::{PipelineStep, RESERVED_FIELDS};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatchConfig {
    /// Category used when a classifier label matches nothing
    pub default_category: String,
    pub deployment: DeploymentSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub knowledge: KnowledgeSection,
    #[serde(default)]
    pub batch: BatchSection,
    /// Extra alias phrases mapped to canonical category names
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    pub categories: Vec<CategoryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentSection {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Text-generation collaborator connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name ("openai" or "anthropic")
    pub provider: String,
    /// Model used by `generate` steps
    pub model: String,
    /// Model used for classification; falls back to `model`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier_model: Option<String>,
    /// Environment variable containing the API key
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Upper bound on a single collaborator call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Provider-level retries for transient network failures
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierSection {
    #[serde(default = "default_classifier_role")]
    pub role: String,
    /// Extra guidance appended to the classification prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default = "default_classifier_temperature")]
    pub temperature: f32,
}

fn default_classifier_role() -> String {
    "a request classifier that routes each request to exactly one category".to_string()
}

fn default_classifier_temperature() -> f32 {
    0.1
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            role: default_classifier_role(),
            instructions: None,
            temperature: default_classifier_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeSection {
    /// Files or directories of `.md` / `.txt` documents
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default = "default_max_excerpt_chars")]
    pub max_excerpt_chars: usize,
    #[serde(default)]
    pub documents: Vec<InlineDocument>,
}

fn default_max_excerpt_chars() -> usize {
    800
}

impl Default for KnowledgeSection {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            max_excerpt_chars: default_max_excerpt_chars(),
            documents: Vec::new(),
        }
    }
}

/// Document given directly in the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InlineDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSection {
    /// Items processed concurrently; output order is unaffected
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Lines starting with this marker are skipped in batch input
    #[serde(default = "default_comment_marker")]
    pub comment_marker: String,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_comment_marker() -> String {
    "#".to_string()
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            comment_marker: default_comment_marker(),
        }
    }
}

/// One category with its aliases and pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryConfig {
    pub name: String,
    /// Shown to the classifier
    #[serde(default)]
    pub description: String,
    /// Phrases that map a raw label to this category by containment
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub pipeline: Vec<PipelineStep>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DispatchConfig {
    /// Load, apply environment overrides, and validate
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;

        // Knowledge paths are relative to the config file
        if let Some(base) = path.parent() {
            config.resolve_knowledge_paths(base);
        }

        config.apply_overrides(
            std::env::var("MODEL").ok(),
            std::env::var("CLASSIFIER_MODEL").ok(),
        );

        config.validate()?;
        Ok(config)
    }

    /// Parse without validating
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `MODEL` / `CLASSIFIER_MODEL` style overrides
    pub fn apply_overrides(&mut self, model: Option<String>, classifier_model: Option<String>) {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.llm.model = model.trim().to_string();
        }
        if let Some(model) = classifier_model.filter(|m| !m.trim().is_empty()) {
            self.llm.classifier_model = Some(model.trim().to_string());
        }
    }

    fn resolve_knowledge_paths(&mut self, base: &Path) {
        for path in &mut self.knowledge.paths {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Eagerly check every startup invariant
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() {
            return Err(invalid("at least one [[categories]] entry is required"));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            let name = category.name.trim();
            if name.is_empty() {
                return Err(invalid("category names must not be empty"));
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(invalid(format!("duplicate category '{name}'")));
            }
        }

        if !seen.contains(&self.default_category.trim().to_lowercase()) {
            return Err(invalid(format!(
                "default_category '{}' is not one of the configured categories",
                self.default_category
            )));
        }

        for (alias, target) in &self.aliases {
            if alias.trim().is_empty() {
                return Err(invalid("alias phrases must not be empty"));
            }
            if !seen.contains(&target.trim().to_lowercase()) {
                return Err(invalid(format!(
                    "alias '{alias}' references unknown category '{target}'"
                )));
            }
        }

        for category in &self.categories {
            self.validate_category(category)?;
        }

        if self.batch.max_concurrency == 0 {
            return Err(invalid("batch.max_concurrency must be at least 1"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(invalid("llm.timeout_secs must be at least 1"));
        }
        if self.knowledge.max_excerpt_chars == 0 {
            return Err(invalid("knowledge.max_excerpt_chars must be at least 1"));
        }
        match self.llm.provider.as_str() {
            "openai" | "anthropic" => {}
            other => {
                return Err(invalid(format!(
                    "unsupported llm.provider '{other}' (expected openai or anthropic)"
                )))
            }
        }

        Ok(())
    }

    fn validate_category(&self, category: &CategoryConfig) -> Result<(), ConfigError> {
        let name = category.name.trim();

        if category.aliases.iter().any(|a| a.trim().is_empty()) {
            return Err(invalid(format!("category '{name}' has an empty alias")));
        }

        if category.pipeline.is_empty() {
            return Err(invalid(format!(
                "category '{name}' has no pipeline steps"
            )));
        }

        let mut outputs = HashSet::new();
        for (index, step) in category.pipeline.iter().enumerate() {
            match step {
                PipelineStep::Search(search) => {
                    if search.max_results == 0 {
                        return Err(invalid(format!(
                            "category '{name}' step {index}: max_results must be at least 1"
                        )));
                    }
                }
                PipelineStep::Generate(generate) => {
                    if generate.role.trim().is_empty() || generate.task.trim().is_empty() {
                        return Err(invalid(format!(
                            "category '{name}' step {index}: generate steps need a role and a task"
                        )));
                    }
                    if let Some(schema) = &generate.output_schema {
                        jsonschema::validator_for(schema).map_err(|e| {
                            invalid(format!(
                                "category '{name}' step {index}: invalid output_schema: {e}"
                            ))
                        })?;
                    }
                }
            }

            for output in step.output_names() {
                let output = output.trim();
                if output.is_empty() {
                    return Err(invalid(format!(
                        "category '{name}' step {index}: output name must not be empty"
                    )));
                }
                if RESERVED_FIELDS.contains(&output) {
                    return Err(invalid(format!(
                        "category '{name}' step {index}: output name '{output}' is reserved"
                    )));
                }
                if !outputs.insert(output.to_string()) {
                    return Err(invalid(format!(
                        "category '{name}' step {index}: output '{output}' is written twice"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Closed category set in configuration order
    pub fn category_set(&self) -> Result<CategorySet, ConfigError> {
        let names: Vec<&str> = self.categories.iter().map(|c| c.name.as_str()).collect();
        CategorySet::new(&names, &self.default_category)
            .ok_or_else(|| invalid("category set is empty, has duplicates, or lacks the default"))
    }

    pub fn classifier_model(&self) -> &str {
        self.llm
            .classifier_model
            .as_deref()
            .unwrap_or(&self.llm.model)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }

    /// Get LLM API key from environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.llm.api_key_env)
            .map_err(|_| ConfigError::EnvVarNotFound(self.llm.api_key_env.clone()))
    }
}

fn invalid<S: Into<String>>(message: S) -> ConfigError {
    ConfigError::InvalidConfig(message.into())
}
