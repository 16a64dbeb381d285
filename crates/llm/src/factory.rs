//! LLM provider registry.
//!
//! Maps a provider name to the client implementation serving it.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiCompatibleClient};
use crate::types::ProviderType;
use std::sync::Arc;
use unichat_core::{AppError, AppResult};

/// Create an LLM client for `provider`.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai", "deepseek", ...)
/// * `endpoint` - Optional custom base URL, the provider default otherwise
/// * `api_key` - API key, required by every hosted provider
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown or a required
/// API key is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider)
        .ok_or_else(|| AppError::Config(format!("Unknown LLM provider: {}", provider)))?;

    let base_url = endpoint.unwrap_or(provider_type.default_endpoint());

    match provider_type {
        ProviderType::Ollama => Ok(Arc::new(OllamaClient::with_base_url(base_url))),
        hosted => {
            let api_key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                AppError::Config(format!("{} provider requires an API key", hosted))
            })?;
            Ok(Arc::new(OpenAiCompatibleClient::new(
                hosted.as_str(),
                base_url,
                api_key,
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client("ollama", None, None).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_with_custom_endpoint() {
        let client = create_client("ollama", Some("http://localhost:8080"), None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_hosted_provider_requires_api_key() {
        match create_client("deepseek", None, None) {
            Err(AppError::Config(msg)) => assert!(msg.contains("requires an API key")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("Expected error for DeepSeek without API key"),
        }
    }

    #[test]
    fn test_hosted_provider_with_key() {
        let client = create_client("moonshot", None, Some("sk-test")).unwrap();
        assert_eq!(client.provider_name(), "moonshot");
    }

    #[test]
    fn test_unknown_provider() {
        match create_client("unknown", None, None) {
            Err(err) => assert!(err.to_string().contains("Unknown LLM provider")),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
