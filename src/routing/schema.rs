//! Structured output schema for classification replies
//!
//! Sent to OpenAI as a JSON Schema `response_format`; the Anthropic provider
//! folds it into the system prompt instead.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Reply shape the classifier asks for.
///
/// Only `label` is required. Providers may add further keys; those are kept
/// as pass-through fields on `ClassificationRaw` and never replace the label.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationOutput {
    /// Category name chosen for the request
    pub label: String,

    /// Self-reported confidence between 0 and 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Short justification, kept for observability
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ClassificationOutput {
    /// JSON schema for this structure
    pub fn json_schema() -> serde_json::Value {
        let schema = schemars::schema_for!(ClassificationOutput);
        serde_json::to_value(schema).unwrap_or_else(|_| {
            json!({
                "type": "object",
                "properties": { "label": { "type": "string" } },
                "required": ["label"]
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_requires_only_label() {
        let schema = ClassificationOutput::json_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0], "label");
        assert!(schema["properties"]["confidence"].is_object());
    }

    #[test]
    fn test_schema_accepts_minimal_reply() {
        let schema = ClassificationOutput::json_schema();
        let validator = jsonschema::validator_for(&schema).unwrap();
        assert!(validator.is_valid(&json!({"label": "billing"})));
        assert!(!validator.is_valid(&json!({"confidence": 0.5})));
    }

    #[test]
    fn test_deserialize_with_optional_fields() {
        let output: ClassificationOutput =
            serde_json::from_str(r#"{"label":"faq","confidence":0.9}"#).unwrap();
        assert_eq!(output.label, "faq");
        assert_eq!(output.confidence, Some(0.9));
        assert!(output.reasoning.is_none());
    }
}
