//! OpenAI-compatible embedding provider.
//!
//! OpenAI, ZhipuAI, Baichuan and DashScope (compatible mode) accept the same
//! `POST {base}/embeddings` payload with a list of inputs.

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use unichat_core::{AppError, AppResult};

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    batch_size: usize,
    dimensions: usize,
    client: reqwest::Client,
}

impl OpenAiEmbeddingProvider {
    /// Create the provider and probe the model for its vector size.
    pub async fn new(
        name: &str,
        base_url: &str,
        api_key: &str,
        config: &EmbeddingConfig,
    ) -> AppResult<Self> {
        let mut provider = Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            dimensions: 0,
            client: reqwest::Client::new(),
        };

        let probe = provider.request(&["test connection".to_string()]).await?;
        provider.dimensions = probe.first().map(Vec::len).unwrap_or(0);
        if provider.dimensions == 0 {
            return Err(AppError::EmbeddingBackend(format!(
                "{} model '{}' returned an empty embedding",
                provider.name, provider.model
            )));
        }

        debug!(provider = %provider.name, dimensions = provider.dimensions, "Embedding model ready");
        Ok(provider)
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    #[instrument(skip(self, texts), fields(provider = %self.name, model = %self.model, batch = texts.len()))]
    async fn request(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let body = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(self.embeddings_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::EmbeddingBackend(format!("Failed to send request to {}: {}", self.name, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::EmbeddingBackend(format!(
                "{} embeddings API error ({}): {}",
                self.name, status, error_text
            )));
        }

        let parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
            AppError::EmbeddingBackend(format!("Failed to parse {} response: {}", self.name, e))
        })?;

        ordered_vectors(parsed, texts.len())
    }
}

/// Put vectors back in input order and check one came back per input.
fn ordered_vectors(mut response: EmbeddingsResponse, expected: usize) -> AppResult<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        return Err(AppError::EmbeddingBackend(format!(
            "Expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }
    response.data.sort_by_key(|d| d.index);
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.request(batch).await?);
        }
        Ok(embeddings)
    }
}
