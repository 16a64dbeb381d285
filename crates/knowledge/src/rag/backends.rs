//! Model backends bound by the pipeline.
//!
//! The pipeline never names a provider implementation directly; it asks a
//! [`BackendFactory`] for capabilities by provider name.

use crate::embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
use crate::rag::settings::ProviderAccess;
use async_trait::async_trait;
use std::sync::Arc;
use unichat_core::AppResult;
use unichat_llm::{create_client, LlmClient, OllamaClient, ProviderType};

#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Chat model client for `provider`.
    fn language_model(
        &self,
        provider: &str,
        access: &ProviderAccess,
    ) -> AppResult<Arc<dyn LlmClient>>;

    /// Embedding backend for `provider`/`model`, ready to embed.
    async fn embedding_model(
        &self,
        provider: &str,
        model: &str,
        access: &ProviderAccess,
    ) -> AppResult<Arc<dyn EmbeddingProvider>>;

    /// Whether a local Ollama instance has `model` pulled.
    async fn is_model_downloaded(&self, model: &str, access: &ProviderAccess) -> AppResult<bool>;
}

/// Production registry over the built-in providers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderRegistry;

#[async_trait]
impl BackendFactory for ProviderRegistry {
    fn language_model(
        &self,
        provider: &str,
        access: &ProviderAccess,
    ) -> AppResult<Arc<dyn LlmClient>> {
        create_client(
            provider,
            access.endpoint.as_deref(),
            access.api_key.as_deref(),
        )
    }

    async fn embedding_model(
        &self,
        provider: &str,
        model: &str,
        access: &ProviderAccess,
    ) -> AppResult<Arc<dyn EmbeddingProvider>> {
        let config = EmbeddingConfig::new(provider, model)
            .with_endpoint(access.endpoint.clone())
            .with_api_key(access.api_key.clone());
        create_provider(&config).await
    }

    async fn is_model_downloaded(&self, model: &str, access: &ProviderAccess) -> AppResult<bool> {
        let endpoint = access
            .endpoint
            .as_deref()
            .unwrap_or(ProviderType::Ollama.default_endpoint());
        OllamaClient::with_base_url(endpoint)
            .is_model_downloaded(model)
            .await
    }
}
