//! Startup wiring
//!
//! Builds every component once from validated configuration and injects the
//! shared collaborators explicitly. `Dispatcher::shutdown` is the single
//! teardown point.

use crate::config::DispatchConfig;
use crate::dispatch::{DispatchTable, GenerationSettings, PipelineExecutor, StructuredResult};
use crate::error::{DispatchError, DispatchResult};
use crate::knowledge::KnowledgeSource;
use crate::llm::provider::{LlmError, LlmProvider};
use crate::processing::{BatchProcessor, RequestProcessor};
use crate::routing::{CategoryNormalizer, LlmClassifier};
use std::sync::Arc;
use tracing::info;

/// Fully wired request pipeline
pub struct Dispatcher {
    processor: Arc<RequestProcessor>,
    provider: Arc<dyn LlmProvider>,
    max_concurrency: usize,
    comment_marker: String,
}

impl Dispatcher {
    pub fn build(
        config: &DispatchConfig,
        provider: Arc<dyn LlmProvider>,
        knowledge: Arc<dyn KnowledgeSource>,
    ) -> Result<Self, DispatchError> {
        config.validate()?;

        let table = Arc::new(DispatchTable::from_config(config)?);
        let normalizer = Arc::new(CategoryNormalizer::from_config(config)?);
        let classifier = Arc::new(LlmClassifier::from_config(Arc::clone(&provider), config));
        let executor = Arc::new(PipelineExecutor::new(
            table,
            knowledge,
            Arc::clone(&provider),
            GenerationSettings::from_config(config),
        ));

        info!(
            deployment = %config.deployment.name,
            categories = config.categories.len(),
            provider = provider.name(),
            "Dispatcher ready"
        );

        Ok(Self {
            processor: Arc::new(RequestProcessor::new(classifier, normalizer, executor)?),
            provider,
            max_concurrency: config.batch.max_concurrency,
            comment_marker: config.batch.comment_marker.clone(),
        })
    }

    pub async fn process(&self, request: &str, classify_only: bool) -> DispatchResult<StructuredResult> {
        self.processor.process(request, classify_only).await
    }

    /// Batch processor sharing this dispatcher's pipeline
    pub fn batch(&self, classify_only: bool) -> BatchProcessor {
        BatchProcessor::new(Arc::clone(&self.processor), self.max_concurrency)
            .with_comment_marker(self.comment_marker.clone())
            .with_classify_only(classify_only)
    }

    /// Release the provider's network resources
    pub async fn shutdown(&self) -> Result<(), LlmError> {
        info!("Shutting down dispatcher");
        self.provider.shutdown().await
    }
}
