//! Single-request flow: validate → classify → normalize → execute

use crate::category::Category;
use crate::config::ConfigError;
use crate::dispatch::{PipelineExecutor, RequestLifecycle, RequestState, StructuredResult};
use crate::error::{DispatchError, DispatchResult};
use crate::routing::{CategoryNormalizer, Classifier};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Longest accepted request, in characters
pub const MAX_REQUEST_CHARS: usize = 8000;

/// Reject empty, whitespace-only and oversized requests before any
/// external call. Returns the trimmed request.
pub fn validate_request(request: &str) -> DispatchResult<&str> {
    let trimmed = request.trim();
    if trimmed.is_empty() {
        return Err(DispatchError::invalid_input("request is empty"));
    }
    let chars = trimmed.chars().count();
    if chars > MAX_REQUEST_CHARS {
        return Err(DispatchError::invalid_input(format!(
            "request is {chars} characters, the limit is {MAX_REQUEST_CHARS}"
        )));
    }
    Ok(trimmed)
}

/// Runs one request through the whole flow
pub struct RequestProcessor {
    classifier: Arc<dyn Classifier>,
    normalizer: Arc<CategoryNormalizer>,
    executor: Arc<PipelineExecutor>,
}

impl RequestProcessor {
    /// Fails unless every category the normalizer can produce has a
    /// dispatch entry, so no request can reach an unrouted category.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        normalizer: Arc<CategoryNormalizer>,
        executor: Arc<PipelineExecutor>,
    ) -> Result<Self, ConfigError> {
        let table = executor.table();
        if let Some(missing) = normalizer
            .categories()
            .iter()
            .find(|category| table.steps(category).is_none())
        {
            return Err(ConfigError::InvalidConfig(format!(
                "category '{missing}' has no dispatch entry"
            )));
        }

        Ok(Self {
            classifier,
            normalizer,
            executor,
        })
    }

    pub async fn process(&self, request: &str, classify_only: bool) -> DispatchResult<StructuredResult> {
        let mut lifecycle = RequestLifecycle::new();
        let span = crate::request_span!(
            request_id = %lifecycle.request_id(),
            classify_only
        );

        async {
            let outcome = self.run(&mut lifecycle, request, classify_only).await;
            match &outcome {
                Ok(result) => info!(category = %result.category(), "Request completed"),
                Err(error) => {
                    lifecycle.advance(RequestState::Failed);
                    warn!(kind = %error.kind(), error = %error.public_message(), "Request failed");
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        lifecycle: &mut RequestLifecycle,
        request: &str,
        classify_only: bool,
    ) -> DispatchResult<StructuredResult> {
        let request = validate_request(request)?;

        let raw = self.classifier.classify(request).await?;
        lifecycle.advance(RequestState::Classified);

        let category: Category = self.normalizer.normalize(&raw.label);
        lifecycle.advance(RequestState::Normalized);
        debug!(raw_label = %raw.label, category = %category, "Request classified");

        if classify_only {
            let result = self.executor.execute(&category, request, true).await?;
            lifecycle.advance(RequestState::ClassifyOnlyDone);
            return Ok(result);
        }

        lifecycle.advance(RequestState::Executing);
        let result = self.executor.execute(&category, request, false).await?;
        lifecycle.advance(RequestState::Done);
        Ok(result)
    }
}
