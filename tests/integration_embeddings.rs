#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// HTTP embedding providers against a mock server

use std::sync::Arc;
use std::time::Duration;

use docs_rag::config::Config;
use docs_rag::embeddings::{
    EmbeddingConfig, EmbeddingProvider, OllamaClient, OpenAiClient, ProviderKind,
};
use docs_rag::loader::Document;
use docs_rag::pipeline::RetrievalPipeline;
use docs_rag::RagError;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn embedding_config(server: &MockServer, provider: ProviderKind) -> EmbeddingConfig {
    EmbeddingConfig {
        provider,
        base_url: Some(Url::parse(&server.uri()).expect("mock server uri")),
        model: Some("test-model".to_string()),
        batch_size: 2,
        timeout_seconds: 5,
        retry_attempts: 3,
        ..EmbeddingConfig::default()
    }
}

fn ollama(server: &MockServer) -> OllamaClient {
    OllamaClient::new(&embedding_config(server, ProviderKind::Ollama))
        .expect("valid client")
        .with_retry_delay(Duration::from_millis(10))
}

fn openai(server: &MockServer) -> OpenAiClient {
    OpenAiClient::with_api_key(&embedding_config(server, ProviderKind::OpenAi), "test-key")
        .expect("valid client")
        .with_retry_delay(Duration::from_millis(10))
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Answers an Ollama embed request with `[input length, 1.0]` for each input
struct LengthEmbeddings;

impl Respond for LengthEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|input| {
                        let len = input.as_str().map_or(0, str::len);
                        vec![len as f32, 1.0]
                    })
                    .collect()
            })
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

#[tokio::test]
async fn ollama_sends_model_and_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(json!({ "model": "test-model", "input": ["hello"] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.1, 0.2, 0.3]] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let vector = ollama(&server).embed("hello").await.expect("embedding");
    assert_eq!(vector, vec![0.1, 0.2, 0.3]);
}

#[tokio::test]
async fn ollama_splits_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(json!({ "model": "test-model", "input": ["a", "b"] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0], [2.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(json!({ "model": "test-model", "input": ["c"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[3.0]] })))
        .expect(1)
        .mount(&server)
        .await;

    let vectors = ollama(&server)
        .embed_batch(&texts(&["a", "b", "c"]))
        .await
        .expect("embeddings");
    assert_eq!(vectors, vec![vec![1.0], vec![2.0], vec![3.0]]);
}

#[tokio::test]
async fn ollama_count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0]] })))
        .mount(&server)
        .await;

    let result = ollama(&server).embed_batch(&texts(&["a", "b"])).await;
    assert!(matches!(result, Err(RagError::Provider(_))));
}

#[tokio::test]
async fn ollama_retries_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.5]] })))
        .expect(1)
        .mount(&server)
        .await;

    let vector = ollama(&server).embed("retry me").await.expect("third attempt succeeds");
    assert_eq!(vector, vec![0.5]);
}

#[tokio::test]
async fn ollama_gives_up_after_retry_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let result = ollama(&server).embed("never works").await;
    assert!(matches!(result, Err(RagError::Provider(_))));
}

#[tokio::test]
async fn ollama_does_not_retry_client_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .expect(1)
        .mount(&server)
        .await;

    let result = ollama(&server).embed("missing model").await;
    assert!(matches!(result, Err(RagError::Provider(_))));
}

#[tokio::test]
async fn ollama_lists_and_validates_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "test-model", "size": 1234, "digest": "abc" },
                { "name": "other-model" }
            ]
        })))
        .mount(&server)
        .await;

    let client = ollama(&server);
    let (models, health) = tokio::task::spawn_blocking(move || {
        (client.list_models(), client.health_check())
    })
    .await
    .expect("blocking task");

    let models = models.expect("models");
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].name, "test-model");
    assert_eq!(models[0].size, Some(1234));
    assert!(health.is_ok());
}

#[tokio::test]
async fn ollama_reports_missing_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "models": [{ "name": "other-model" }] })),
        )
        .mount(&server)
        .await;

    let client = ollama(&server);
    let result = tokio::task::spawn_blocking(move || client.validate_model())
        .await
        .expect("blocking task");
    assert!(result.is_err());
}

#[tokio::test]
async fn openai_sends_bearer_token_and_input() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_json(json!({ "model": "test-model", "input": ["hello"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{ "object": "embedding", "index": 0, "embedding": [0.25, 0.75] }],
            "model": "test-model"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vector = openai(&server).embed("hello").await.expect("embedding");
    assert_eq!(vector, vec![0.25, 0.75]);
}

#[tokio::test]
async fn openai_restores_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "index": 1, "embedding": [2.0] },
                { "index": 0, "embedding": [1.0] }
            ]
        })))
        .mount(&server)
        .await;

    let vectors = openai(&server)
        .embed_batch(&texts(&["first", "second"]))
        .await
        .expect("embeddings");
    assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
}

#[tokio::test]
async fn openai_retries_rate_limits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [0.1] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let vector = openai(&server).embed("busy").await.expect("second attempt succeeds");
    assert_eq!(vector, vec![0.1]);
}

#[tokio::test]
async fn openai_does_not_retry_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = openai(&server).embed("no key").await;
    assert!(matches!(result, Err(RagError::Provider(_))));
}

#[tokio::test]
async fn openai_count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "index": 0, "embedding": [1.0] }]
        })))
        .mount(&server)
        .await;

    let result = openai(&server).embed_batch(&texts(&["a", "b"])).await;
    assert!(matches!(result, Err(RagError::Provider(_))));
}

#[tokio::test]
async fn pipeline_over_http_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(LengthEmbeddings)
        .mount(&server)
        .await;

    let mut config = Config::default();
    config.embeddings = embedding_config(&server, ProviderKind::Ollama);
    config.set_chunking(20, 5).expect("valid chunking");

    let provider: Arc<dyn EmbeddingProvider> = Arc::new(ollama(&server));
    let pipeline = RetrievalPipeline::new(&config, provider).expect("valid pipeline");

    let result = pipeline
        .ingest_documents(&[Document::new("short", None), Document::new("a much longer one", None)])
        .await;
    assert_eq!(result.chunks_inserted, 2);

    let status = pipeline.status().await;
    assert_eq!(status.chunks_count, 2);
    assert_eq!(status.dimension, Some(2));

    let hits = pipeline.retrieve("tiny", 2).await.expect("retrieve");
    assert_eq!(hits.len(), 2);
}
