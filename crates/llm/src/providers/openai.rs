//! OpenAI-compatible chat-completions provider.
//!
//! OpenAI, DeepSeek, Moonshot, ZhipuAI, DashScope (compatible mode) and
//! Baichuan all accept the same `POST {base}/chat/completions` payload, so a
//! single client parameterised by name, base URL and key serves them all.

use crate::client::{ChatMessage, LlmClient, LlmRequest, LlmResponse, LlmUsage};
use serde::{Deserialize, Serialize};
use unichat_core::{AppError, AppResult};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    /// Reasoning models (e.g. deepseek-reasoner) return their trace separately
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Client for any provider speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatibleClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Fold a separately returned reasoning trace back into the delimited form
/// the answer post-processing expects.
fn merge_reasoning(content: String, reasoning: Option<String>) -> String {
    match reasoning {
        Some(reasoning) if !reasoning.trim().is_empty() => {
            format!("<think>{}</think>{}", reasoning, content)
        }
        _ => content,
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn provider_name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self, request), fields(provider = %self.name, model = %request.model))]
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(messages = request.messages.len(), "Sending chat completion request");

        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AppError::Generation(format!("Failed to send request to {}: {}", self.name, e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Generation(format!(
                "{} API error ({}): {}",
                self.name, status, error_text
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            AppError::Generation(format!("Failed to parse {} response: {}", self.name, e))
        })?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            AppError::Generation(format!("{} returned no completion choices", self.name))
        })?;

        let usage = completion
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let model = if completion.model.is_empty() {
            request.model.clone()
        } else {
            completion.model
        };

        Ok(LlmResponse {
            content: merge_reasoning(
                choice.message.content.unwrap_or_default(),
                choice.message.reasoning_content,
            ),
            model,
            usage,
        })
    }
}
