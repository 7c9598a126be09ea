//! Provider router - builds the configured LLM backend.
//!
//! Every well-known backend speaks the OpenAI-compatible protocol, so the
//! router only has to resolve a base URL, an API key and a model name.

use crate::openai_compat::OpenAiCompatProvider;
use colloquy_config::AppConfig;
use colloquy_core::error::ProviderError;
use colloquy_core::provider::LlmProvider;
use std::sync::Arc;
use tracing::debug;

/// A provider ready for use, plus the model it should be asked for.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub provider: Arc<dyn LlmProvider>,
    pub model: String,
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

/// Build the default provider from configuration.
///
/// A `[providers.<name>]` section overrides the key, URL and model of the
/// default provider. Hosted backends without any API key are rejected;
/// local backends need none.
pub fn build_from_config(config: &AppConfig) -> Result<ResolvedProvider, ProviderError> {
    let name = config.default_provider.as_str();
    let section = config.providers.get(name);

    let api_key = section
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    if api_key.is_empty() && !is_local(name) {
        return Err(ProviderError::NotConfigured(format!(
            "no API key for provider '{name}'"
        )));
    }

    let base_url = section
        .and_then(|p| p.api_url.clone())
        .unwrap_or_else(|| default_base_url(name));

    let model = section
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone());

    debug!(provider = name, base_url = %base_url, model = %model, "Building provider");

    let provider = OpenAiCompatProvider::with_timeout(
        name,
        base_url,
        if api_key.is_empty() { name.to_string() } else { api_key },
        config.request_timeout(),
    );

    Ok(ResolvedProvider {
        provider: Arc::new(provider),
        model,
    })
}

/// Backends that run on the local machine and accept any key.
fn is_local(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
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
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_config::ProviderConfig;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn hosted_provider_without_key_is_not_configured() {
        let config = AppConfig::default();
        let err = build_from_config(&config).unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn default_provider_uses_default_model() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let resolved = build_from_config(&config).unwrap();
        assert_eq!(resolved.provider.name(), "openrouter");
        assert_eq!(resolved.model, "google/gemini-2.5-flash");
    }

    #[test]
    fn provider_section_overrides_model() {
        let mut config = AppConfig {
            default_provider: "ollama".into(),
            ..AppConfig::default()
        };
        config.providers.insert(
            "ollama".into(),
            ProviderConfig {
                api_key: None,
                api_url: Some("http://gpu-box:11434/v1".into()),
                default_model: Some("llama3.2".into()),
            },
        );
        let resolved = build_from_config(&config).unwrap();
        assert_eq!(resolved.provider.name(), "ollama");
        assert_eq!(resolved.model, "llama3.2");
    }
}
