//! Integration tests for batch processing
//!
//! Covers ordering, per-item failure isolation, blank/comment skipping, the
//! stop flag, and configuration errors halting the whole run.


use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use test_helpers::{dispatcher, helpdesk_config, helpdesk_corpus};
use triage_dispatch::config::ConfigError;
use triage_dispatch::dispatch::{DispatchTable, GenerationSettings, PipelineExecutor};
use triage_dispatch::error::{DispatchError, ErrorKind};
use triage_dispatch::processing::{BatchProcessor, RequestProcessor};
use triage_dispatch::routing::{CategoryNormalizer, ClassificationRaw, Classifier};
use triage_dispatch::llm::provider::{LlmError, PURPOSE_GENERATE};
use triage_dispatch::testing::{MockLlmProvider, MockReply};

fn helpdesk_mock() -> MockLlmProvider {
    MockLlmProvider::new()
        .classify_as("password", "password_reset")
        .classify_as("VPN", "network_issue")
        .classify_as("printer", "hardware_issue")
        .default_generation(MockReply::Text(
            r#"{"action": "send technician", "priority": "low"}"#.to_string(),
        ))
}

#[tokio::test]
async fn test_failing_third_item_is_isolated() {
    let mock = Arc::new(helpdesk_mock());
    let dispatcher = dispatcher(mock);
    let batch = dispatcher.batch(false);

    let inputs = vec![
        "I forgot my password".to_string(),
        "VPN drops every hour".to_string(),
        String::new(),
        "printer is jammed".to_string(),
        "Excel crashes".to_string(),
    ];
    let items = batch.run_batch(inputs.clone()).await.unwrap();

    assert_eq!(items.len(), 5);
    for (position, item) in items.iter().enumerate() {
        assert_eq!(item.index, position + 1);
        assert_eq!(item.input, inputs[position]);
    }

    let error = items[2].error().expect("item 3 fails");
    assert_eq!(error.kind, ErrorKind::InvalidInput);
    assert_eq!(error.index, 3);
    assert!(items[2].result().is_none());

    for i in [0, 1, 3, 4] {
        assert!(items[i].is_ok(), "item {} should succeed", i + 1);
    }
    assert_eq!(items[0].result().unwrap().category().as_str(), "password_reset");
    assert_eq!(items[1].result().unwrap().category().as_str(), "network_issue");
    assert_eq!(items[3].result().unwrap().category().as_str(), "hardware_issue");
    assert_eq!(items[4].result().unwrap().category().as_str(), "software_issue");
}

#[tokio::test]
async fn test_report_order_ignores_completion_order() {
    let mock = Arc::new(
        helpdesk_mock()
            .delay_when("first", Duration::from_millis(300))
            .delay_when("second", Duration::from_millis(150)),
    );
    let dispatcher = dispatcher(mock);
    let batch = dispatcher.batch(true);

    let inputs: Vec<String> = ["first request", "second request", "third request", "fourth request"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let items = batch.run_batch(inputs.clone()).await.unwrap();

    let order: Vec<&str> = items.iter().map(|i| i.input.as_str()).collect();
    assert_eq!(order, vec!["first request", "second request", "third request", "fourth request"]);
    assert!(items.iter().all(|i| i.is_ok()));
}

#[tokio::test]
async fn test_classification_failure_does_not_stop_batch() {
    let mock = Arc::new(helpdesk_mock().classify_reply(
        "explode",
        MockReply::Fail(LlmError::NetworkError("connection reset".to_string())),
    ));
    let dispatcher = dispatcher(mock);
    let batch = dispatcher.batch(true);

    let items = batch
        .run_batch(vec![
            "reset password".to_string(),
            "please explode".to_string(),
            "VPN down".to_string(),
        ])
        .await.unwrap();

    assert!(items[0].is_ok());
    assert_eq!(items[1].error().unwrap().kind, ErrorKind::Classification);
    assert!(items[2].is_ok());
}

#[tokio::test]
async fn test_step_failure_record_names_category_and_step() {
    let mock = Arc::new(
        helpdesk_mock()
            .generate_reply("Diagnose", MockReply::Fail(LlmError::Timeout(5))),
    );
    let dispatcher = dispatcher(mock);
    let batch = dispatcher.batch(false);

    let items = batch.run_batch(vec!["VPN is broken".to_string()]).await.unwrap();
    let error = items[0].error().unwrap();

    assert_eq!(error.kind, ErrorKind::PipelineStep);
    assert_eq!(error.category.as_deref(), Some("network_issue"));
    assert_eq!(error.step_index, Some(1));
}

#[tokio::test]
async fn test_source_skips_blank_and_comment_lines() {
    let mock = Arc::new(helpdesk_mock());
    let dispatcher = dispatcher(mock.clone());
    let batch = dispatcher.batch(true);

    let source = "# IT requests for Monday\nreset my password\n\n   \n# printer ones\nprinter jammed\n";
    let report = batch.run_source(source).await.unwrap();

    assert_eq!(report.items.len(), 2);
    assert_eq!(report.items[0].index, 2);
    assert_eq!(report.items[1].index, 6);
    assert_eq!(report.summary.total, 2);
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(mock.calls_with_purpose(PURPOSE_GENERATE).await, 0);
}

#[tokio::test]
async fn test_stopped_batch_starts_nothing() {
    let mock = Arc::new(helpdesk_mock());
    let dispatcher = dispatcher(mock.clone());
    let batch = dispatcher.batch(true);
    batch.stop_handle().store(true, Ordering::SeqCst);

    let report = batch.run_source("reset password\nVPN down\n").await.unwrap();

    assert!(report.items.is_empty());
    assert_eq!(report.summary.not_started, 2);
    assert_eq!(mock.call_count().await, 0);
}

#[tokio::test]
async fn test_batch_item_json_shape() {
    let mock = Arc::new(helpdesk_mock());
    let dispatcher = dispatcher(mock);
    let batch = dispatcher.batch(true);

    let items = batch
        .run_batch(vec!["reset password".to_string(), "  ".to_string()])
        .await.unwrap();

    let ok = serde_json::to_value(&items[0]).unwrap();
    assert_eq!(ok["status"], "ok");
    assert_eq!(ok["index"], 1);
    assert_eq!(ok["result"]["category"], "password_reset");
    assert_eq!(ok["result"]["classify_only"], true);

    let failed = serde_json::to_value(&items[1]).unwrap();
    assert_eq!(failed["status"], "error");
    assert_eq!(failed["error"]["kind"], "InvalidInputError");
}

/// Classifier whose backing configuration disappears for some requests
struct MisconfiguredClassifier;

#[async_trait]
impl Classifier for MisconfiguredClassifier {
    async fn classify(&self, request: &str) -> Result<ClassificationRaw, DispatchError> {
        if request.contains("halt") {
            return Err(ConfigError::InvalidConfig("classifier prompt missing".to_string()).into());
        }
        Ok(ClassificationRaw::new("software_issue"))
    }
}

#[tokio::test]
async fn test_configuration_error_halts_batch() {
    let config = helpdesk_config();
    let mock = Arc::new(helpdesk_mock());
    let executor = Arc::new(PipelineExecutor::new(
        Arc::new(DispatchTable::from_config(&config).unwrap()),
        Arc::new(helpdesk_corpus()),
        mock.clone(),
        GenerationSettings::from_config(&config),
    ));
    let processor = RequestProcessor::new(
        Arc::new(MisconfiguredClassifier),
        Arc::new(CategoryNormalizer::from_config(&config).unwrap()),
        executor,
    )
    .unwrap();
    let batch = BatchProcessor::new(Arc::new(processor), 1);

    let err = batch
        .run_batch(vec![
            "Excel crashes".to_string(),
            "halt here".to_string(),
            "Word crashes".to_string(),
        ])
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(batch.stop_handle().load(Ordering::SeqCst));
    // Only the first item reached its pipeline
    assert_eq!(mock.calls_with_purpose(PURPOSE_GENERATE).await, 1);
}
