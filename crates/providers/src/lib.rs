//! LLM Provider implementations for ToolLoop.
//!
//! All providers implement the `toolloop_core::Provider` trait.
//! [`build_from_config`] assembles the configured backend.

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;

use std::sync::Arc;
use toolloop_config::AppConfig;
use toolloop_core::provider::Provider;
use tracing::debug;

/// Build the default provider from configuration, wrapped in retries.
///
/// Resolution order for the base URL: the provider's `api_url`, then the
/// top-level `base_url`, then the well-known default for the provider name.
/// The API key falls back from the provider table to the top-level key.
/// Requests that leave the model empty use `default_model`.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn Provider> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .or_else(|| config.base_url.clone())
        .unwrap_or_else(|| default_base_url(name));

    let max_retries = provider_config.and_then(|p| p.max_retries).unwrap_or(3);

    debug!(provider = name, base_url = %base_url, max_retries, "Building provider");

    let inner: Arc<dyn Provider> = Arc::new(
        OpenAiCompatProvider::new(name, base_url, api_key)
            .with_default_model(config.default_model.clone()),
    );
    Arc::new(RetryProvider::new(inner).with_max_retries(max_retries))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolloop_config::ProviderConfig;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let provider = build_from_config(&config);
        assert_eq!(provider.name(), "openai");
        assert!(provider.supports_streaming());
    }

    #[test]
    fn build_uses_named_provider_table() {
        let mut config = AppConfig::default();
        config.default_provider = "ollama".into();
        config.providers.insert(
            "ollama".into(),
            ProviderConfig {
                api_url: Some("http://gpu-box:11434/v1".into()),
                max_retries: Some(0),
                ..ProviderConfig::default()
            },
        );
        let provider = build_from_config(&config);
        assert_eq!(provider.name(), "ollama");
    }
}
