use super::*;

#[test]
fn default_config_targets_openai() {
    let config = EmbeddingConfig::default();

    assert_eq!(config.provider, ProviderKind::OpenAi);
    assert_eq!(config.effective_model(), DEFAULT_OPENAI_MODEL);
    assert_eq!(
        config
            .effective_base_url()
            .expect("default url should parse")
            .as_str(),
        "https://api.openai.com/"
    );
}

#[test]
fn ollama_defaults_apply_when_unset() {
    let config = EmbeddingConfig {
        provider: ProviderKind::Ollama,
        ..EmbeddingConfig::default()
    };

    assert_eq!(config.effective_model(), DEFAULT_OLLAMA_MODEL);
    assert_eq!(
        config
            .effective_base_url()
            .expect("default url should parse")
            .as_str(),
        "http://localhost:11434/"
    );
}

#[test]
fn explicit_settings_override_defaults() {
    let config = EmbeddingConfig {
        provider: ProviderKind::Ollama,
        base_url: Some(Url::parse("http://gpu-box:8080").expect("url should parse")),
        model: Some("mxbai-embed-large".to_string()),
        ..EmbeddingConfig::default()
    };

    assert_eq!(config.effective_model(), "mxbai-embed-large");
    assert_eq!(
        config
            .effective_base_url()
            .expect("url should parse")
            .host_str(),
        Some("gpu-box")
    );
}

#[test]
fn provider_kind_serializes_lowercase() {
    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        provider: ProviderKind,
    }

    let parsed: Wrapper = toml::from_str("provider = \"ollama\"").expect("should parse provider");
    assert_eq!(parsed.provider, ProviderKind::Ollama);

    let rendered = toml::to_string(&Wrapper {
        provider: ProviderKind::OpenAi,
    })
    .expect("should serialize provider");
    assert!(rendered.contains("\"openai\""));
}

#[test]
fn factory_builds_ollama_without_credentials() {
    let config = EmbeddingConfig {
        provider: ProviderKind::Ollama,
        ..EmbeddingConfig::default()
    };

    let provider = create_provider(&config).expect("ollama provider needs no api key");
    assert_eq!(provider.model_name(), DEFAULT_OLLAMA_MODEL);
}
