//! Gemini client against a mock HTTP server.

use std::time::{Duration, Instant};

use lexi_core::{Error, LlmSettings};
use lexi_llm::{CompletionBackend, GeminiClient, ResolvedModels, RetryPolicy};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/models/gemini-1.5-flash:generateContent";

fn settings(server: &MockServer) -> LlmSettings {
    LlmSettings {
        gemini_api_key: Some("test-key".into()),
        base_url: server.uri(),
        timeout_secs: 5,
        ..LlmSettings::default()
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(10),
    }
}

fn resolved() -> ResolvedModels {
    ResolvedModels {
        generation: "models/gemini-1.5-flash".into(),
        embedding: "models/text-embedding-004".into(),
    }
}

fn candidate(text: &str) -> serde_json::Value {
    json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
}

#[tokio::test]
async fn test_discovery_then_completion() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": "models/gemini-1.5-flash-exp", "supportedGenerationMethods": ["generateContent"]},
                {"name": "models/gemini-1.5-flash", "displayName": "Gemini 1.5 Flash",
                 "supportedGenerationMethods": ["generateContent", "countTokens"]},
                {"name": "models/text-embedding-004", "supportedGenerationMethods": ["embedContent"]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({
            "generationConfig": {"temperature": 0.7, "topK": 40, "topP": 0.95, "maxOutputTokens": 256}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("hello")))
        .expect(2)
        .mount(&server)
        .await;

    let client = GeminiClient::new(&settings(&server)).unwrap();
    assert_eq!(client.complete("say hello", 256).await.unwrap(), "hello");
    // Second call reuses the cached selection.
    assert_eq!(client.complete("say hello", 256).await.unwrap(), "hello");

    let models = client.resolve_models().await.unwrap();
    assert_eq!(models.generation, "models/gemini-1.5-flash");
    assert_eq!(models.embedding, "models/text-embedding-004");
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(429).set_body_string("Resource exhausted. Please retry in 0.02s."),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("after retry")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::with_models(&settings(&server), resolved())
        .unwrap()
        .with_retry_policy(fast_retry());
    assert_eq!(client.complete("prompt", 64).await.unwrap(), "after retry");
}

#[tokio::test]
async fn test_rate_limit_exhausts_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .expect(3)
        .mount(&server)
        .await;

    let client = GeminiClient::with_models(&settings(&server), resolved())
        .unwrap()
        .with_retry_policy(fast_retry());
    let err = client.complete("prompt", 64).await.unwrap_err();
    assert!(matches!(err, Error::Upstream(ref msg) if msg.contains("Rate limit")));
}

#[tokio::test]
async fn test_retry_after_header_is_honoured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "0.2")
                .set_body_string("quota"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("waited")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::with_models(&settings(&server), resolved())
        .unwrap()
        .with_retry_policy(fast_retry());
    let started = Instant::now();
    assert_eq!(client.complete("prompt", 64).await.unwrap(), "waited");
    // Header hint (200ms) beats the 10ms backoff.
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_timeout_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate("too late"))
                .set_delay(Duration::from_millis(500)),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("on time")))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::with_models(&settings(&server), resolved())
        .unwrap()
        .with_retry_policy(fast_retry())
        .with_timeout(Duration::from_millis(100));
    assert_eq!(client.complete("prompt", 64).await.unwrap(), "on time");
}

#[tokio::test]
async fn test_timeouts_exhaust_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(candidate("too late"))
                .set_delay(Duration::from_millis(500)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let client = GeminiClient::with_models(&settings(&server), resolved())
        .unwrap()
        .with_retry_policy(fast_retry())
        .with_timeout(Duration::from_millis(100));
    let err = client.complete("prompt", 64).await.unwrap_err();
    assert!(matches!(err, Error::Upstream(ref msg) if msg == "Request timed out"));
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .expect(1)
        .mount(&server)
        .await;

    let client = GeminiClient::with_models(&settings(&server), resolved())
        .unwrap()
        .with_retry_policy(fast_retry());
    let err = client.complete("prompt", 64).await.unwrap_err();
    assert!(matches!(err, Error::Upstream(ref msg) if msg.contains("500")));
}

#[tokio::test]
async fn test_missing_candidates_is_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
        .mount(&server)
        .await;

    let client = GeminiClient::with_models(&settings(&server), resolved()).unwrap();
    assert!(client.complete("prompt", 64).await.is_err());
}

#[tokio::test]
async fn test_embed_success_and_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/text-embedding-004:embedContent"))
        .and(body_partial_json(json!({"taskType": "RETRIEVAL_DOCUMENT"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embedding": {"values": [0.25, -0.5]}})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/text-embedding-004:embedContent"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = GeminiClient::with_models(&settings(&server), resolved()).unwrap();
    assert_eq!(client.embed("lease").await, vec![0.25, -0.5]);
    assert!(client.embed("lease").await.is_empty());
}

#[tokio::test]
async fn test_missing_api_key() {
    let server = MockServer::start().await;
    let mut settings = settings(&server);
    settings.gemini_api_key = None;

    let client = GeminiClient::new(&settings).unwrap();
    let err = client.complete("prompt", 64).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(client.embed("text").await.is_empty());
}

#[tokio::test]
async fn test_failed_discovery_surfaces_upstream_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    let client = GeminiClient::new(&settings(&server)).unwrap();
    let err = client.resolve_models().await.unwrap_err();
    assert!(matches!(err, Error::Upstream(ref msg) if msg.contains("403")));
}
