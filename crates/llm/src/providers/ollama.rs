//! Ollama LLM provider implementation.
//!
//! Ollama is a local LLM runtime.
//! Ollama API: https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, LlmUsage};
use serde::{Deserialize, Serialize};
use unichat_core::{AppError, AppResult};

/// Ollama `/api/chat` request format.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "OllamaOptions::is_empty")]
    options: OllamaOptions,
}

#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl OllamaOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.top_p.is_none() && self.num_predict.is_none()
    }
}

/// Ollama `/api/chat` response format.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/// Ollama `/api/tags` response format.
#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModelTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
}

/// Ollama LLM client.
pub struct OllamaClient {
    /// Base URL for Ollama API
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with default settings.
    ///
    /// Default URL: http://localhost:11434
    pub fn new() -> Self {
        Self::with_base_url("http://localhost:11434")
    }

    /// Create a new Ollama client with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn to_chat_request<'a>(&self, request: &'a LlmRequest) -> OllamaChatRequest<'a> {
        OllamaChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                top_p: request.top_p,
                num_predict: request.max_tokens,
            },
        }
    }

    /// Names of the models pulled into the local Ollama instance.
    pub async fn list_models(&self) -> AppResult<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            AppError::Config(format!("Failed to reach Ollama at {}: {}", self.base_url, e))
        })?;

        if !response.status().is_success() {
            return Err(AppError::Config(format!(
                "Ollama returned {} when listing models",
                response.status()
            )));
        }

        let tags: OllamaTags = response
            .json()
            .await
            .map_err(|e| AppError::Config(format!("Failed to parse Ollama model list: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether `model` is available locally.
    ///
    /// A model configured without a tag matches its `:latest` variant.
    pub async fn is_model_downloaded(&self, model: &str) -> AppResult<bool> {
        let models = self.list_models().await?;
        Ok(model_in_list(model, &models))
    }
}

fn model_in_list(model: &str, models: &[String]) -> bool {
    let model = model.trim();
    if model.is_empty() {
        return false;
    }
    let latest = format!("{}:latest", model);
    models.iter().any(|name| name == model || *name == latest)
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    #[tracing::instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(messages = request.messages.len(), "Sending chat request to Ollama");

        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&self.to_chat_request(request))
            .send()
            .await
            .map_err(|e| {
                AppError::Generation(format!("Failed to send request to Ollama: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Generation(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let chat: OllamaChatResponse = response.json().await.map_err(|e| {
            AppError::Generation(format!("Failed to parse Ollama response: {}", e))
        })?;

        tracing::debug!(chars = chat.message.content.len(), "Received completion from Ollama");

        Ok(LlmResponse {
            content: chat.message.content,
            model: chat.model,
            usage: LlmUsage::new(
                chat.prompt_eval_count.unwrap_or(0),
                chat.eval_count.unwrap_or(0),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_client_creation() {
        let client = OllamaClient::with_base_url("http://localhost:11434/");
        assert_eq!(client.provider_name(), "ollama");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_chat_request_serialization() {
        let client = OllamaClient::new();
        let request = LlmRequest::new(
            "qwen2.5",
            vec![ChatMessage::system("sys"), ChatMessage::user("Hello")],
        )
        .with_temperature(0.3);

        let json = serde_json::to_value(client.to_chat_request(&request)).unwrap();
        assert_eq!(json["model"], "qwen2.5");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert!(json["options"].get("num_predict").is_none());
    }

    #[test]
    fn test_options_omitted_when_unset() {
        let client = OllamaClient::new();
        let request = LlmRequest::new("m", vec![ChatMessage::user("x")]);
        let json = serde_json::to_value(client.to_chat_request(&request)).unwrap();
        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_model_matching_accepts_latest_tag() {
        let models = vec!["qwen2.5:latest".to_string(), "bge-m3:567m".to_string()];
        assert!(model_in_list("qwen2.5", &models));
        assert!(model_in_list("qwen2.5:latest", &models));
        assert!(model_in_list("bge-m3:567m", &models));
        assert!(!model_in_list("bge-m3", &models));
        assert!(!model_in_list("", &models));
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"model":"qwen2.5","created_at":"2024-01-01T00:00:00Z",
            "message":{"role":"assistant","content":"Paris."},"done":true,
            "prompt_eval_count":12,"eval_count":3}"#;
        let parsed: OllamaChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, "Paris.");
        assert_eq!(parsed.eval_count, Some(3));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_config_error() {
        // Port 9 (discard) is not an Ollama server
        let client = OllamaClient::with_base_url("http://127.0.0.1:9");
        let result = client.is_model_downloaded("qwen2.5").await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
