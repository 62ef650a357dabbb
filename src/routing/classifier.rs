//! LLM-backed request classifier
//!
//! One outbound completion per request. The reply is parsed into a raw label
//! plus whatever extra keys the model chose to send; the label is not checked
//! against the category set here, that is the normalizer's job.

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::llm::provider::{
    CompletionRequest, JsonSchemaDefinition, LlmProvider, Message, ResponseFormat,
    PURPOSE_CLASSIFY,
};
use crate::routing::schema::ClassificationOutput;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Unvalidated classifier output
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRaw {
    /// Label as returned, casing and whitespace untouched
    pub label: String,
    /// Auxiliary keys from a JSON reply, passed through opaquely
    pub fields: Map<String, Value>,
}

impl ClassificationRaw {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            fields: Map::new(),
        }
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: &str) -> Result<ClassificationRaw, DispatchError>;
}

/// Classifier that asks the text-generation collaborator for a label
pub struct LlmClassifier {
    provider: Arc<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    temperature: f32,
    timeout: Duration,
}

impl LlmClassifier {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            system_prompt: system_prompt.into(),
            temperature: 0.1,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &DispatchConfig) -> Self {
        Self::new(provider, config.classifier_model(), build_system_prompt(config))
            .with_temperature(config.classifier.temperature)
            .with_timeout(config.timeout())
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn build_request(&self, request: &str) -> CompletionRequest {
        let mut completion = CompletionRequest::new(
            self.model.clone(),
            vec![Message::system(&self.system_prompt), Message::user(request)],
        )
        .with_purpose(PURPOSE_CLASSIFY);
        completion.temperature = Some(self.temperature);
        completion.max_tokens = Some(200);
        completion.response_format = Some(ResponseFormat::JsonSchema {
            json_schema: JsonSchemaDefinition {
                name: "classification".to_string(),
                strict: None,
                schema: ClassificationOutput::json_schema(),
            },
        });
        completion
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, request: &str) -> Result<ClassificationRaw, DispatchError> {
        if request.trim().is_empty() {
            return Err(DispatchError::invalid_input("request is empty"));
        }

        let completion = self.build_request(request);
        let response = tokio::time::timeout(self.timeout, self.provider.complete(completion))
            .await
            .map_err(|_| {
                warn!(timeout = ?self.timeout, "Classifier call timed out");
                DispatchError::classification(format!(
                    "classifier call timed out after {:?}",
                    self.timeout
                ))
            })?
            .map_err(|e| DispatchError::classification(format!("classifier call failed: {e}")))?;

        let content = response.content.unwrap_or_default();
        let raw = parse_classification(&content)?;
        debug!(label = %raw.label, extra_fields = raw.fields.len(), "Classifier replied");
        Ok(raw)
    }
}

/// Classification prompt listing every category and the fallback
pub fn build_system_prompt(config: &DispatchConfig) -> String {
    let mut prompt = format!("You are {}.\n\n", config.classifier.role.trim());
    prompt.push_str("Classify the user's request into exactly one of these categories:\n");
    for category in &config.categories {
        if category.description.trim().is_empty() {
            prompt.push_str(&format!("- {}\n", category.name));
        } else {
            prompt.push_str(&format!(
                "- {}: {}\n",
                category.name,
                category.description.trim()
            ));
        }
    }
    prompt.push_str(&format!(
        "\nIf no category clearly fits, use \"{}\".\n",
        config.default_category
    ));
    if let Some(instructions) = &config.classifier.instructions {
        prompt.push('\n');
        prompt.push_str(instructions.trim());
        prompt.push('\n');
    }
    prompt.push_str(
        "\nRespond with a JSON object: {\"label\": \"<category name>\", \
         \"confidence\": <0 to 1>, \"reasoning\": \"<one sentence>\"}",
    );
    prompt
}

/// Parse a classifier reply.
///
/// A JSON object must carry a non-blank string `label`; its other keys become
/// pass-through fields. Anything not starting with `{` is taken verbatim as
/// the label. Markdown code fences around the reply are ignored.
pub fn parse_classification(content: &str) -> Result<ClassificationRaw, DispatchError> {
    let body = strip_code_fences(content);
    if body.is_empty() {
        return Err(DispatchError::classification("classifier returned an empty reply"));
    }

    if !body.starts_with('{') {
        return Ok(ClassificationRaw::new(body));
    }

    let value: Value = serde_json::from_str(body).map_err(|e| {
        DispatchError::classification(format!("classifier returned malformed JSON: {e}"))
    })?;
    let Value::Object(mut fields) = value else {
        return Err(DispatchError::classification(
            "classifier reply is not a JSON object",
        ));
    };

    match fields.remove("label") {
        Some(Value::String(label)) if !label.trim().is_empty() => {
            Ok(ClassificationRaw { label, fields })
        }
        _ => Err(DispatchError::classification(
            "classifier reply has no string \"label\" field",
        )),
    }
}

pub(crate) fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_plain_text_reply_is_label() {
        let raw = parse_classification("  Billing Inquiry \n").unwrap();
        assert_eq!(raw.label, "Billing Inquiry");
        assert!(raw.fields.is_empty());
    }

    #[test]
    fn test_json_label_is_authoritative_and_extras_pass_through() {
        let raw = parse_classification(
            r#"{"label": "ticket", "category": "faq", "confidence": 0.8}"#,
        )
        .unwrap();
        assert_eq!(raw.label, "ticket");
        assert_eq!(raw.fields["category"], "faq");
        assert_eq!(raw.fields["confidence"], 0.8);
    }

    #[test]
    fn test_fenced_json_is_accepted() {
        let raw = parse_classification("```json\n{\"label\": \"faq\"}\n```").unwrap();
        assert_eq!(raw.label, "faq");
    }

    #[test]
    fn test_empty_reply_is_classification_error() {
        let err = parse_classification("   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Classification);
    }

    #[test]
    fn test_malformed_json_is_classification_error() {
        let err = parse_classification("{\"label\": ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Classification);
    }

    #[test]
    fn test_missing_or_blank_label_is_classification_error() {
        assert!(parse_classification(r#"{"category": "faq"}"#).is_err());
        assert!(parse_classification(r#"{"label": "  "}"#).is_err());
        assert!(parse_classification(r#"{"label": 3}"#).is_err());
    }
}
