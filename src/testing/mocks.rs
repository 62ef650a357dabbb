//! Mock implementations for testing
//!
//! `MockLlmProvider` answers classification and generation calls from
//! scripted rules and records every request it receives, so tests can assert
//! on call counts per purpose. `FailingKnowledgeSource` stands in for an
//! unreachable corpus.

use crate::knowledge::{KnowledgeError, KnowledgeSource, Match};
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
    PURPOSE_CLASSIFY, PURPOSE_GENERATE,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// What the mock answers with
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Empty,
    Fail(LlmError),
}

#[derive(Debug, Clone)]
struct Rule {
    purpose: &'static str,
    /// Substring of the last user message that selects this rule
    contains: String,
    reply: MockReply,
}

/// Scripted LLM provider
#[derive(Debug)]
pub struct MockLlmProvider {
    rules: Vec<Rule>,
    delays: Vec<(String, Duration)>,
    classify_default: MockReply,
    generate_default: MockReply,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlmProvider {
    /// Classifies everything as `"unrecognized"` and generates `"Mock response"`
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            delays: Vec::new(),
            classify_default: MockReply::Text(label_json("unrecognized")),
            generate_default: MockReply::Text("Mock response".to_string()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Requests whose text contains `needle` are labelled `label`
    pub fn classify_as(mut self, needle: impl Into<String>, label: &str) -> Self {
        self.rules.push(Rule {
            purpose: PURPOSE_CLASSIFY,
            contains: needle.into(),
            reply: MockReply::Text(label_json(label)),
        });
        self
    }

    /// Raw classifier reply for requests containing `needle`
    pub fn classify_reply(mut self, needle: impl Into<String>, reply: MockReply) -> Self {
        self.rules.push(Rule {
            purpose: PURPOSE_CLASSIFY,
            contains: needle.into(),
            reply,
        });
        self
    }

    /// Label returned when no classify rule matches
    pub fn default_label(mut self, label: &str) -> Self {
        self.classify_default = MockReply::Text(label_json(label));
        self
    }

    /// Generation reply for prompts containing `needle`
    pub fn generate_reply(mut self, needle: impl Into<String>, reply: MockReply) -> Self {
        self.rules.push(Rule {
            purpose: PURPOSE_GENERATE,
            contains: needle.into(),
            reply,
        });
        self
    }

    /// Reply used for generation calls no rule matches
    pub fn default_generation(mut self, reply: MockReply) -> Self {
        self.generate_default = reply;
        self
    }

    /// Sleep before answering any call whose user text contains `needle`
    pub fn delay_when(mut self, needle: impl Into<String>, delay: Duration) -> Self {
        self.delays.push((needle.into(), delay));
        self
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    pub async fn calls_with_purpose(&self, purpose: &str) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.purpose() == Some(purpose))
            .count()
    }

    fn reply_for(&self, request: &CompletionRequest) -> MockReply {
        let purpose = request.purpose().unwrap_or(PURPOSE_GENERATE);
        let text = request.last_user_content().unwrap_or_default();

        if let Some(rule) = self
            .rules
            .iter()
            .find(|r| r.purpose == purpose && text.contains(&r.contains))
        {
            return rule.reply.clone();
        }

        if purpose == PURPOSE_CLASSIFY {
            self.classify_default.clone()
        } else {
            self.generate_default.clone()
        }
    }
}

fn label_json(label: &str) -> String {
    json!({ "label": label }).to_string()
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request.clone());

        let text = request.last_user_content().unwrap_or_default();
        if let Some((_, delay)) = self.delays.iter().find(|(needle, _)| text.contains(needle)) {
            tokio::time::sleep(*delay).await;
        }

        let content = match self.reply_for(&request) {
            MockReply::Text(text) => Some(text),
            MockReply::Empty => None,
            MockReply::Fail(error) => return Err(error),
        };

        Ok(CompletionResponse {
            content,
            model: request.model.clone(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: request.metadata,
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        Ok(())
    }
}

/// Knowledge source that is always unreachable
#[derive(Debug, Default)]
pub struct FailingKnowledgeSource;

#[async_trait]
impl KnowledgeSource for FailingKnowledgeSource {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<Match>, KnowledgeError> {
        Err(KnowledgeError::Unavailable(
            "knowledge backend unreachable".to_string(),
        ))
    }

    fn len(&self) -> usize {
        0
    }
}
