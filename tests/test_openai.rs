//! Integration tests for the OpenAI provider
//!
//! Exercises the HTTP contract against a local mock server:
//! - request shape (auth header, messages, structured-output format)
//! - response parsing and token usage
//! - error mapping for auth failures, rate limits and server errors
//! - retries on transient failures

use serde_json::json;
use std::time::Duration;
use triage_dispatch::llm::provider::{
    CompletionRequest, FinishReason, JsonSchemaDefinition, LlmError, LlmProvider, Message,
    ResponseFormat, PURPOSE_CLASSIFY,
};
use triage_dispatch::llm::providers::openai::{OpenAiConfig, OpenAiProvider};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> OpenAiConfig {
    OpenAiConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
        max_retries: 0,
    }
}

fn test_request() -> CompletionRequest {
    let mut request = CompletionRequest::new(
        "gpt-4o-mini",
        vec![
            Message::system("You are a support triage assistant."),
            Message::user("My invoice is wrong"),
        ],
    )
    .with_purpose(PURPOSE_CLASSIFY);
    request.max_tokens = Some(200);
    request
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 21, "completion_tokens": 9, "total_tokens": 30 }
    })
}

#[tokio::test]
async fn test_successful_completion_is_parsed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                { "role": "system", "content": "You are a support triage assistant." },
                { "role": "user", "content": "My invoice is wrong" }
            ],
            "max_tokens": 200
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"label": "billing"}"#,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.complete(test_request()).await.unwrap();

    assert_eq!(response.content.as_deref(), Some(r#"{"label": "billing"}"#));
    assert_eq!(response.model, "gpt-4o-mini");
    assert_eq!(response.usage.total_tokens, 30);
    assert!(matches!(response.finish_reason, FinishReason::Stop));
}

#[tokio::test]
async fn test_json_schema_response_format_is_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "classification",
                    "schema": { "type": "object", "required": ["label"] }
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"label": "technical"}"#,
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut request = test_request();
    request.response_format = Some(ResponseFormat::JsonSchema {
        json_schema: JsonSchemaDefinition {
            name: "classification".to_string(),
            strict: None,
            schema: json!({ "type": "object", "required": ["label"] }),
        },
    });

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.complete(request).await.unwrap();
    assert_eq!(response.content.as_deref(), Some(r#"{"label": "technical"}"#));
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication_failed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request()).await;
    assert!(matches!(result, Err(LlmError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn test_rate_limit_is_reported_with_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    match provider.complete(test_request()).await {
        Err(LlmError::RateLimitExceeded(body)) => assert_eq!(body, "slow down"),
        other => panic!("expected rate limit error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_without_retries_fails_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request()).await;
    assert!(matches!(result, Err(LlmError::ApiError(msg)) if msg.contains("server error")));
}

#[tokio::test]
async fn test_server_error_is_retried_up_to_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = OpenAiConfig {
        max_retries: 2,
        ..test_config(&mock_server.uri())
    };
    let provider = OpenAiProvider::new(config).unwrap();
    assert!(provider.complete(test_request()).await.is_err());
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = OpenAiConfig {
        max_retries: 2,
        ..test_config(&mock_server.uri())
    };
    let provider = OpenAiProvider::new(config).unwrap();
    let result = provider.complete(test_request()).await;
    assert!(matches!(result, Err(LlmError::ApiError(msg)) if msg.contains("bad request")));
}

#[tokio::test]
async fn test_empty_choices_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-123",
            "model": "gpt-4o-mini",
            "choices": []
        })))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request()).await;
    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let config = test_config("http://127.0.0.1:9");
    let provider = OpenAiProvider::new(config).unwrap();
    let result = provider.complete(test_request()).await;
    assert!(matches!(
        result,
        Err(LlmError::NetworkError(_)) | Err(LlmError::Timeout(_))
    ));
}

#[tokio::test]
async fn test_health_check_lists_models() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    assert!(provider.health_check().await.is_ok());
}

#[tokio::test]
async fn test_health_check_rejected_key() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let provider = OpenAiProvider::new(test_config(&mock_server.uri())).unwrap();
    assert!(matches!(
        provider.health_check().await,
        Err(LlmError::AuthenticationFailed(_))
    ));
}
