//! Caller-facing result of one request

use crate::category::Category;
use serde::Serialize;
use serde_json::{Map, Value};

/// Outcome of a successful request.
///
/// Serializes as one flat record: `query`, `category`, `classify_only`, then
/// every named pipeline output. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredResult {
    query: String,
    category: Category,
    classify_only: bool,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl StructuredResult {
    /// Short-circuit result: category only, no pipeline outputs
    pub fn classify_only(category: Category, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            category,
            classify_only: true,
            fields: Map::new(),
        }
    }

    /// Result of a fully executed pipeline
    pub fn completed(category: Category, query: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            query: query.into(),
            category,
            classify_only: false,
            fields,
        }
    }

    pub fn category(&self) -> &Category {
        &self.category
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_classify_only(&self) -> bool {
        self.classify_only
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategorySet;
    use serde_json::json;

    #[test]
    fn test_classify_only_serializes_with_flag() {
        let set = CategorySet::new(&["faq", "ticket"], "ticket").unwrap();
        let result = StructuredResult::classify_only(set.get("faq").unwrap().clone(), "hi");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"query": "hi", "category": "faq", "classify_only": true})
        );
    }

    #[test]
    fn test_completed_result_is_flat() {
        let set = CategorySet::new(&["faq", "ticket"], "ticket").unwrap();
        let mut fields = Map::new();
        fields.insert("response".to_string(), json!("Reset it from the portal."));
        let result =
            StructuredResult::completed(set.get("ticket").unwrap().clone(), "locked out", fields);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["category"], "ticket");
        assert_eq!(value["classify_only"], false);
        assert_eq!(value["response"], "Reset it from the portal.");
        assert_eq!(result.field("response"), Some(&json!("Reset it from the portal.")));
    }
}
