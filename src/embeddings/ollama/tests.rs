use super::*;
use crate::embeddings::ProviderKind;

fn ollama_config() -> EmbeddingConfig {
    EmbeddingConfig {
        provider: ProviderKind::Ollama,
        ..EmbeddingConfig::default()
    }
}

#[test]
fn client_configuration() {
    let config = EmbeddingConfig {
        base_url: Some(Url::parse("http://test-host:1234").expect("url should parse")),
        model: Some("test-model".to_string()),
        batch_size: 128,
        ..ollama_config()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry.attempts, 3);
}

#[test]
fn provider_defaults() {
    let client = OllamaClient::new(&ollama_config()).expect("Failed to create client");

    assert_eq!(client.model_name(), "nomic-embed-text:latest");
    assert_eq!(client.base_url.host_str(), Some("localhost"));
    assert_eq!(client.base_url.port(), Some(11434));
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&ollama_config())
        .expect("Failed to create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(5)
        .with_retry_delay(Duration::from_millis(10));

    assert_eq!(client.retry.attempts, 5);
    assert_eq!(client.retry.initial_delay, Duration::from_millis(10));
}

#[test]
fn zero_batch_size_is_rejected() {
    let config = EmbeddingConfig {
        batch_size: 0,
        ..ollama_config()
    };
    assert!(matches!(
        OllamaClient::new(&config),
        Err(RagError::InvalidConfiguration(_))
    ));
}

#[test]
fn empty_batch_needs_no_request() {
    // Nothing listens on this port; an empty batch must not touch the network
    let config = EmbeddingConfig {
        base_url: Some(Url::parse("http://127.0.0.1:9").expect("url should parse")),
        ..ollama_config()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    let result = client
        .generate_embeddings_batch(&[])
        .expect("empty batch should succeed");
    assert!(result.is_empty());
}
