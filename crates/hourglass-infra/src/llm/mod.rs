//! Text provider implementations.
//!
//! Contains the OpenAI-compatible implementation of the [`TextProvider`]
//! trait defined in `hourglass-core`, and the factory ([`create_fallback`])
//! that wires it into the fallback co-host from configuration.
//!
//! [`TextProvider`]: hourglass_core::llm::TextProvider

pub mod openai_compat;

use secrecy::SecretString;

use hourglass_core::llm::{BoxTextProvider, FallbackGenerator};
use hourglass_types::config::FallbackConfig;

use self::openai_compat::OpenAiCompatibleProvider;

/// Create a [`BoxTextProvider`] for the configured endpoint.
pub fn create_provider(
    config: &FallbackConfig,
    client: reqwest::Client,
    api_key: SecretString,
) -> BoxTextProvider {
    let provider = if config.base_url.trim_end_matches('/') == "https://api.openai.com/v1" {
        OpenAiCompatibleProvider::openai(client, api_key)
    } else {
        OpenAiCompatibleProvider::new(client, "openai_compatible", &config.base_url, api_key)
    };
    BoxTextProvider::new(provider)
}

/// Build the fallback co-host.
///
/// `api_key` is normally resolved from `config.api_key_env`. Without a key
/// the generator runs heuristic-only.
pub fn create_fallback(
    config: &FallbackConfig,
    client: reqwest::Client,
    api_key: Option<SecretString>,
) -> FallbackGenerator {
    let provider = match api_key {
        Some(key) => {
            let provider = create_provider(config, client, key);
            tracing::info!(provider = provider.name(), model = %config.model, "fallback provider configured");
            Some(provider)
        }
        None => {
            tracing::info!(
                env = %config.api_key_env,
                "no fallback API key set, co-host will use heuristic fills"
            );
            None
        }
    };
    FallbackGenerator::new(config, provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_default_endpoint_is_openai() {
        let config = FallbackConfig::default();
        let provider = create_provider(&config, reqwest::Client::new(), SecretString::from("sk-test"));
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_create_provider_custom_base_url() {
        let config = FallbackConfig {
            base_url: "http://localhost:11434/v1".to_string(),
            ..FallbackConfig::default()
        };
        let provider = create_provider(&config, reqwest::Client::new(), SecretString::from("ollama"));
        assert_eq!(provider.name(), "openai_compatible");
    }

    #[tokio::test]
    async fn test_create_fallback_without_key_is_heuristic() {
        let config = FallbackConfig::default();
        let generator = create_fallback(&config, reqwest::Client::new(), None);
        let fill = generator.generate("A vegetable", None).await;
        assert!(fill.text.starts_with("AI co-host: "));
        assert_eq!(fill.model_used, hourglass_core::llm::fallback::HEURISTIC_MODEL);
    }
}
