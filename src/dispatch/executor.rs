//! Pipeline execution
//!
//! Steps run strictly in order. `search` output accumulates into a context
//! block that later `generate` steps can reference; `generate` output lands in
//! the result fields. The first failing step ends the request with a
//! `PipelineStep` error and everything produced so far is dropped.

use crate::category::Category;
use crate::config::{ConfigError, DispatchConfig};
use crate::dispatch::result::StructuredResult;
use crate::dispatch::step::{GenerateStep, PipelineStep, SearchStep, RESERVED_FIELDS};
use crate::dispatch::table::DispatchTable;
use crate::error::DispatchError;
use crate::knowledge::{KnowledgeSource, Match};
use crate::llm::provider::{
    CompletionRequest, JsonSchemaDefinition, LlmProvider, Message, ResponseFormat,
    PURPOSE_GENERATE,
};
use crate::routing::classifier::strip_code_fences;
use serde_json::{Map, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, Instrument};

const NO_CONTEXT: &str = "No matching knowledge was found.";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex"));

/// Model parameters for `generate` steps
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl GenerationSettings {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            timeout: config.timeout(),
        }
    }
}

/// Runs the pipeline owned by a category
pub struct PipelineExecutor {
    table: Arc<DispatchTable>,
    knowledge: Arc<dyn KnowledgeSource>,
    provider: Arc<dyn LlmProvider>,
    settings: GenerationSettings,
}

/// Working state threaded through the steps of one request
struct StepContext<'a> {
    query: &'a str,
    knowledge: Vec<Match>,
    fields: Map<String, Value>,
}

impl StepContext<'_> {
    fn context_block(&self) -> String {
        if self.knowledge.is_empty() {
            return NO_CONTEXT.to_string();
        }
        self.knowledge
            .iter()
            .map(|m| match &m.title {
                Some(title) => format!("[{}] {}\n{}", m.document_id, title, m.excerpt),
                None => format!("[{}]\n{}", m.document_id, m.excerpt),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Expand `{query}`, `{context}` and `{<field>}` placeholders.
    ///
    /// Only string fields are substituted; unknown placeholders stay literal.
    fn render(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &regex::Captures<'_>| match &caps[1] {
                "query" => self.query.to_string(),
                "context" => self.context_block(),
                name => match self.fields.get(name) {
                    Some(Value::String(value)) => value.clone(),
                    _ => caps[0].to_string(),
                },
            })
            .into_owned()
    }
}

impl PipelineExecutor {
    pub fn new(
        table: Arc<DispatchTable>,
        knowledge: Arc<dyn KnowledgeSource>,
        provider: Arc<dyn LlmProvider>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            table,
            knowledge,
            provider,
            settings,
        }
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub async fn execute(
        &self,
        category: &Category,
        request: &str,
        classify_only: bool,
    ) -> Result<StructuredResult, DispatchError> {
        if classify_only {
            debug!(category = %category, "Classify-only short-circuit");
            return Ok(StructuredResult::classify_only(category.clone(), request));
        }

        let steps = self.table.steps(category).ok_or_else(|| {
            DispatchError::Configuration(ConfigError::InvalidConfig(format!(
                "category '{category}' has no dispatch entry"
            )))
        })?;

        let mut context = StepContext {
            query: request,
            knowledge: Vec::new(),
            fields: Map::new(),
        };

        for (index, step) in steps.iter().enumerate() {
            let started = Instant::now();
            let span = crate::step_span!(
                category = %category,
                step_index = index,
                step_kind = %step.kind()
            );

            let outcome = match step {
                PipelineStep::Search(search) => {
                    self.run_search(search, &mut context).instrument(span).await
                }
                PipelineStep::Generate(generate) => {
                    self.run_generate(category, index, generate, &mut context)
                        .instrument(span)
                        .await
                }
            };

            if let Err(cause) = outcome {
                return Err(DispatchError::pipeline_step(
                    category.as_str(),
                    index,
                    step.kind(),
                    cause,
                ));
            }

            info!(
                category = %category,
                step_index = index,
                step_kind = %step.kind(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Pipeline step completed"
            );
        }

        Ok(StructuredResult::completed(
            category.clone(),
            request,
            context.fields,
        ))
    }

    async fn run_search(&self, step: &SearchStep, context: &mut StepContext<'_>) -> Result<(), String> {
        let query = context.render(&step.query);
        let matches = self
            .knowledge
            .search(&query, step.max_results)
            .await
            .map_err(|e| e.to_string())?;

        debug!(query = %query, matches = matches.len(), "Knowledge search finished");

        if let Some(output) = &step.output {
            let value = serde_json::to_value(&matches).map_err(|e| e.to_string())?;
            context.fields.insert(output.clone(), value);
        }
        context.knowledge.extend(matches);
        Ok(())
    }

    async fn run_generate(
        &self,
        category: &Category,
        index: usize,
        step: &GenerateStep,
        context: &mut StepContext<'_>,
    ) -> Result<(), String> {
        let mut task = context.render(&step.task);
        if let Some(expected) = &step.expected_output {
            task.push_str("\n\nExpected output: ");
            task.push_str(expected.trim());
        }

        let mut request = CompletionRequest::new(
            step.model.clone().unwrap_or_else(|| self.settings.model.clone()),
            vec![Message::system(step.system_prompt()), Message::user(task)],
        )
        .with_purpose(PURPOSE_GENERATE);
        request.temperature = self.settings.temperature;
        request.max_tokens = self.settings.max_tokens;
        if let Some(schema) = &step.output_schema {
            request.response_format = Some(ResponseFormat::JsonSchema {
                json_schema: JsonSchemaDefinition {
                    name: format!("{}_step_{index}", category.as_str()),
                    strict: None,
                    schema: schema.clone(),
                },
            });
        }

        let response = tokio::time::timeout(self.settings.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                format!("generation timed out after {:?}", self.settings.timeout)
            })?
            .map_err(|e| format!("generation failed: {e}"))?;

        let content = response.content.unwrap_or_default();
        if content.trim().is_empty() {
            return Err("generation returned an empty reply".to_string());
        }

        match &step.output_schema {
            None => {
                context
                    .fields
                    .insert(step.output.clone(), Value::String(content.trim().to_string()));
            }
            Some(schema) => {
                let fields = parse_structured(&content, schema)?;
                if let Some(taken) = fields.keys().find(|k| context.fields.contains_key(*k)) {
                    return Err(format!(
                        "structured output field '{taken}' was already written by an earlier step"
                    ));
                }
                context.fields.extend(fields);
            }
        }
        Ok(())
    }
}

/// Parse a structured reply and check it against the step's schema
fn parse_structured(content: &str, schema: &Value) -> Result<Map<String, Value>, String> {
    let value: Value = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| format!("structured output is not valid JSON: {e}"))?;

    let validator = jsonschema::validator_for(schema)
        .map_err(|e| format!("output schema does not compile: {e}"))?;
    validator.validate(&value).map_err(|errors| {
        let messages: Vec<String> = errors
            .map(|e| format!("at '{}': {}", e.instance_path, e))
            .collect();
        format!("structured output violates schema: {}", messages.join("; "))
    })?;

    let Value::Object(fields) = value else {
        return Err("structured output must be a JSON object".to_string());
    };
    if let Some(reserved) = fields.keys().find(|k| RESERVED_FIELDS.contains(&k.as_str())) {
        return Err(format!("structured output uses reserved field '{reserved}'"));
    }
    Ok(fields)
}
